// The filters of the analytics views, as carried in a query string.

use crate::tally::store::*;
use crate::tally::*;

/// The filter state of a dashboard, as in `year=2024&cidades=Fortaleza&topN=5`.
///
/// Lists are comma-separated. Regionals are given by id (or by name).
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(rename = "regionais", skip_serializing_if = "Option::is_none")]
    pub regionals: Option<String>,
    #[serde(rename = "cidades", skip_serializing_if = "Option::is_none")]
    pub cities: Option<String>,
    #[serde(rename = "minVotos", skip_serializing_if = "Option::is_none")]
    pub min_votes: Option<u64>,
    #[serde(rename = "topN", skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(rename = "zona", skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(rename = "bairro", skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

pub fn parse_query(query: &str) -> TallyResult<FilterQuery> {
    let trimmed = query.trim().trim_start_matches('?');
    let res: FilterQuery =
        serde_urlencoded::from_str(trimmed).context(InvalidFilterSnafu { query })?;
    debug!("parse_query: {:?} -> {:?}", query, res);
    Ok(res)
}

fn split_list(s: &Option<String>) -> Vec<String> {
    s.as_deref()
        .unwrap_or("")
        .split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
}

/// The years with data for a candidate, from both kinds of rows.
pub fn candidate_years(store: &Store, candidate_id: u32) -> Vec<u32> {
    let mut records = store.neighborhood_records(candidate_id);
    records.extend(store.section_records(candidate_id));
    available_years(&records)
}

impl FilterQuery {
    /// The year shown when none is requested: the configured default, then the
    /// latest year with data.
    pub fn default_year(store: &Store, settings: &Settings, candidate_id: u32) -> Option<u32> {
        settings
            .default_year
            .or_else(|| candidate_years(store, candidate_id).last().cloned())
    }

    /// The regional names of the filter. Numeric entries are ids.
    fn regional_names(&self, store: &Store) -> TallyResult<Vec<String>> {
        let mut res: Vec<String> = Vec::new();
        for r in split_list(&self.regionals) {
            match r.parse::<u32>() {
                Ok(id) => res.push(store.regional(id)?.name.clone()),
                Err(_) => res.push(r),
            }
        }
        Ok(res)
    }

    pub fn to_vote_filter(
        &self,
        store: &Store,
        settings: &Settings,
        candidate_id: u32,
    ) -> TallyResult<VoteFilter> {
        Ok(VoteFilter {
            year: self
                .year
                .or_else(|| FilterQuery::default_year(store, settings, candidate_id)),
            cities: split_list(&self.cities),
            regionals: self.regional_names(store)?,
            neighborhood: non_empty(&self.neighborhood),
            zone: non_empty(&self.zone),
            min_votes: self.min_votes.unwrap_or(0),
            top_n: Some(self.top_n.unwrap_or(settings.default_top_n)),
            query: non_empty(&self.q),
        })
    }

    /// The query string of this filter, without the values that are equal to
    /// their default.
    pub fn normalized(
        &self,
        store: &Store,
        settings: &Settings,
        candidate_id: u32,
    ) -> TallyResult<String> {
        let default_year = FilterQuery::default_year(store, settings, candidate_id);
        let join = |v: Vec<String>| if v.is_empty() { None } else { Some(v.join(",")) };
        let simplified = FilterQuery {
            year: self.year.filter(|y| Some(*y) != default_year),
            regionals: join(split_list(&self.regionals)),
            cities: join(split_list(&self.cities)),
            min_votes: self.min_votes.filter(|m| *m > 0),
            top_n: self.top_n.filter(|n| *n != settings.default_top_n),
            zone: non_empty(&self.zone),
            neighborhood: non_empty(&self.neighborhood),
            q: non_empty(&self.q),
        };
        serde_urlencoded::to_string(&simplified).context(EncodingFilterSnafu {})
    }
}
