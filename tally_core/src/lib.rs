mod config;
pub mod builder;
pub mod manual;

use log::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::{Add, AddAssign},
};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

// Normalized grouping key. Two spellings of the same place ("Centro", " centro ")
// land in the same group.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
struct GroupKey(String);

#[derive(Eq, PartialEq, Debug, Clone)]
struct Group {
    key: GroupKey,
    // First spelling seen, used for display.
    label: String,
    votes: VoteCount,
    detail: Option<String>,
}

/// Removes the accents: the text is decomposed and the combining marks are
/// dropped, so that composed and decomposed spellings fold the same way.
pub fn fold_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// The identity of a free-text name (neighborhood, city, header): accents folded,
/// lowercase, whitespace trimmed and collapsed.
pub fn normalize_key(s: &str) -> String {
    let folded = fold_accents(s.trim_start_matches('\u{feff}'));
    folded
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

fn non_empty(field: &Option<String>) -> Option<String> {
    match field.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => None,
    }
}

fn dimension_value(record: &VoteRecord, dimension: Dimension) -> Option<(String, Option<String>)> {
    match dimension {
        Dimension::Neighborhood => non_empty(&record.neighborhood).map(|n| (n, None)),
        Dimension::Zone => non_empty(&record.zone).map(|z| (z, None)),
        Dimension::Section => match (non_empty(&record.zone), non_empty(&record.section)) {
            (Some(z), Some(s)) => Some((format!("{}-{}", z, s), non_empty(&record.neighborhood))),
            _ => None,
        },
        Dimension::Regional => non_empty(&record.regional).map(|r| (r, None)),
        Dimension::Year => Some((record.year.to_string(), None)),
        Dimension::City => non_empty(&record.city).map(|c| (c, None)),
    }
}

// Groups are returned in order of first appearance.
fn accumulate<'a, I>(records: I, dimension: Dimension) -> Vec<Group>
where
    I: Iterator<Item = &'a VoteRecord>,
{
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut skipped: usize = 0;
    for record in records {
        let (label, detail) = match dimension_value(record, dimension) {
            Some(x) => x,
            None => {
                skipped += 1;
                continue;
            }
        };
        let key = GroupKey(normalize_key(&label));
        if let Some(idx) = index.get(&key) {
            groups[*idx].votes += VoteCount(record.votes);
        } else {
            index.insert(key.clone(), groups.len());
            groups.push(Group {
                key,
                label,
                votes: VoteCount(record.votes),
                detail,
            });
        }
    }
    if skipped > 0 {
        debug!(
            "accumulate: {} records without a value for {}",
            skipped,
            dimension.label()
        );
    }
    groups
}

fn finish_ranking(mut groups: Vec<Group>) -> Vec<RankedEntry> {
    let total: VoteCount = groups.iter().map(|g| g.votes).sum();
    // Non-increasing votes. Ties are broken on the key to keep the output stable.
    groups.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.key.cmp(&b.key)));
    groups
        .into_iter()
        .enumerate()
        .map(|(idx, g)| RankedEntry {
            position: (idx + 1) as u32,
            key: g.label,
            votes: g.votes.0,
            share: percentage(g.votes, total),
            detail: g.detail,
        })
        .collect()
}

fn percentage(part: VoteCount, total: VoteCount) -> f64 {
    if total == VoteCount::EMPTY {
        0.0
    } else {
        100.0 * (part.0 as f64) / (total.0 as f64)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl VoteFilter {
    /// The place criteria: cities, regionals and neighborhood.
    pub fn matches_place(&self, record: &VoteRecord) -> bool {
        if !self.cities.is_empty() {
            let city = record.city.as_deref().map(normalize_key);
            if !self
                .cities
                .iter()
                .any(|c| Some(normalize_key(c)) == city)
            {
                return false;
            }
        }
        if !self.regionals.is_empty() {
            let regional = record.regional.as_deref().map(normalize_key);
            if !self
                .regionals
                .iter()
                .any(|r| Some(normalize_key(r)) == regional)
            {
                return false;
            }
        }
        if let Some(n) = &self.neighborhood {
            if record.neighborhood.as_deref().map(normalize_key) != Some(normalize_key(n)) {
                return false;
            }
        }
        true
    }

    /// All the criteria except the year.
    ///
    /// The zone only restricts the records that have one: neighborhood files
    /// carry no zone and are not affected by it. The quick query looks at the
    /// fields the record has.
    pub fn matches_geography(&self, record: &VoteRecord) -> bool {
        if !self.matches_place(record) {
            return false;
        }
        if let (Some(z), Some(zone)) = (&self.zone, &record.zone) {
            if zone.trim() != z.trim() {
                return false;
            }
        }
        if let Some(q) = &self.query {
            let q = q.trim().to_lowercase();
            if !q.is_empty() {
                let hit = [&record.zone, &record.section, &record.neighborhood]
                    .iter()
                    .filter_map(|f| f.as_deref())
                    .any(|f| f.to_lowercase().contains(&q));
                if !hit {
                    return false;
                }
            }
        }
        true
    }

    pub fn matches(&self, record: &VoteRecord) -> bool {
        if let Some(y) = self.year {
            if record.year != y {
                return false;
            }
        }
        self.matches_geography(record)
    }
}

/// The records selected by the filter. The ranking limits (minimum votes, top-n)
/// do not apply here.
pub fn filter_records<'a>(records: &'a [VoteRecord], filter: &VoteFilter) -> Vec<&'a VoteRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Groups the records by the given dimension, and sorts the groups by decreasing
/// number of votes.
///
/// Records that carry no value for the dimension are left out.
pub fn rank(records: &[VoteRecord], dimension: Dimension) -> Vec<RankedEntry> {
    finish_ranking(accumulate(records.iter(), dimension))
}

fn apply_limits(ranking: Vec<RankedEntry>, filter: &VoteFilter) -> Vec<RankedEntry> {
    let mut res: Vec<RankedEntry> = ranking
        .into_iter()
        .filter(|e| e.votes >= filter.min_votes)
        .collect();
    if let Some(n) = filter.top_n {
        res.truncate(n);
    }
    res
}

/// Ranking with all the criteria of the filter.
///
/// Shares are computed against the whole filtered selection, before the minimum
/// votes and the top-n limits are applied.
pub fn rank_filtered(
    records: &[VoteRecord],
    dimension: Dimension,
    filter: &VoteFilter,
) -> Vec<RankedEntry> {
    let groups = accumulate(records.iter().filter(|r| filter.matches(r)), dimension);
    let res = apply_limits(finish_ranking(groups), filter);
    debug!(
        "rank_filtered: {} {} entries for filter {:?}",
        res.len(),
        dimension.label(),
        filter
    );
    res
}

/// Same as [rank_filtered], but fails if records were selected and none of
/// them has a value for the dimension.
pub fn try_rank(
    records: &[VoteRecord],
    dimension: Dimension,
    filter: &VoteFilter,
) -> Result<Vec<RankedEntry>, TallyErrors> {
    let selected = filter_records(records, filter);
    let groups = accumulate(selected.iter().cloned(), dimension);
    if groups.is_empty() && !selected.is_empty() {
        return Err(TallyErrors::EmptyDimension(dimension));
    }
    Ok(apply_limits(finish_ranking(groups), filter))
}

/// Headline numbers of a dashboard.
///
/// Arguments:
/// * `neighborhoods` the records of the per-neighborhood files
/// * `sections` the records of the per-section files
/// * `filter` only the selection criteria are used, not the ranking limits
pub fn compute_kpis(
    neighborhoods: &[VoteRecord],
    sections: &[VoteRecord],
    filter: &VoteFilter,
) -> Kpis {
    let neigh: Vec<&VoteRecord> = filter_records(neighborhoods, filter);
    let secs: Vec<&VoteRecord> = filter_records(sections, filter);

    let neigh_total: VoteCount = neigh.iter().map(|r| VoteCount(r.votes)).sum();
    let sec_total: VoteCount = secs.iter().map(|r| VoteCount(r.votes)).sum();
    // Both files describe the same election. When one of them is partial, the
    // larger total is the better estimate.
    let total = std::cmp::max(neigh_total, sec_total);

    let ranking = finish_ranking(accumulate(neigh.iter().cloned(), Dimension::Neighborhood));
    let num_neighborhoods = ranking.len();

    let sections_keys: HashSet<(String, String)> = secs
        .iter()
        .filter_map(|r| match (non_empty(&r.zone), non_empty(&r.section)) {
            (Some(z), Some(s)) => Some((z, s)),
            _ => None,
        })
        .collect();
    let sections_with_votes = secs.iter().filter(|r| r.votes > 0).count();

    let cities: HashSet<String> = neigh
        .iter()
        .chain(secs.iter())
        .filter_map(|r| non_empty(&r.city))
        .map(|c| normalize_key(&c))
        .collect();

    let average_per_neighborhood = if num_neighborhoods > 0 {
        (neigh_total.0 as f64) / (num_neighborhoods as f64)
    } else {
        0.0
    };

    // Top 20% of the neighborhoods, rounded up.
    let top_count = (num_neighborhoods * 2 + 9) / 10;
    let top_votes: VoteCount = ranking
        .iter()
        .take(top_count)
        .map(|e| VoteCount(e.votes))
        .sum();

    let kpis = Kpis {
        total_votes: total.0,
        neighborhoods: num_neighborhoods,
        sections: sections_keys.len(),
        cities: cities.len(),
        sections_with_votes,
        top_neighborhood: ranking.first().map(|e| (e.key.clone(), e.votes)),
        average_per_neighborhood,
        concentration: percentage(top_votes, neigh_total),
    };
    info!("compute_kpis: {:?}", kpis);
    kpis
}

/// Cumulative share of the votes along a ranking, rounded to two decimals.
///
/// The last point is 100 unless the ranking was truncated before.
pub fn concentration_curve(ranking: &[RankedEntry]) -> Vec<CurvePoint> {
    let total: VoteCount = ranking.iter().map(|e| VoteCount(e.votes)).sum();
    let mut cumul = VoteCount::EMPTY;
    ranking
        .iter()
        .enumerate()
        .map(|(idx, e)| {
            cumul += VoteCount(e.votes);
            CurvePoint {
                position: (idx + 1) as u32,
                cumulative_share: round2(percentage(cumul, total)),
            }
        })
        .collect()
}

/// Votes per year in increasing year order.
///
/// Only the place criteria of the filter apply: not its year, its zone or its
/// quick query.
pub fn timeline(records: &[VoteRecord], filter: &VoteFilter) -> Vec<TimelinePoint> {
    let mut by_year: BTreeMap<u32, VoteCount> = BTreeMap::new();
    for r in records.iter().filter(|r| filter.matches_place(r)) {
        *by_year.entry(r.year).or_insert(VoteCount::EMPTY) += VoteCount(r.votes);
    }
    by_year
        .into_iter()
        .map(|(year, vc)| TimelinePoint { year, votes: vc.0 })
        .collect()
}

/// The distinct years present in the records, in increasing order.
pub fn available_years(records: &[VoteRecord]) -> Vec<u32> {
    let years: HashSet<u32> = records.iter().map(|r| r.year).collect();
    let mut res: Vec<u32> = years.into_iter().collect();
    res.sort_unstable();
    res
}

/// The distinct values of a dimension, sorted by key, with their first spelling.
pub fn distinct_values<'a, I>(records: I, dimension: Dimension) -> Vec<String>
where
    I: Iterator<Item = &'a VoteRecord>,
{
    let mut groups = accumulate(records, dimension);
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups.into_iter().map(|g| g.label).collect()
}
