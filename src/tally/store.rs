// The persisted tables, kept in one JSON document.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::tally::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: u32,
    pub name: String,
    pub code: String,
    pub number: Option<u32>,
    pub active: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u32,
    pub name: String,
    pub number: Option<u32>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
    #[serde(rename = "partyId")]
    pub party_id: u32,
    pub active: bool,
    #[serde(rename = "usesRegionals")]
    pub uses_regionals: bool,
    #[serde(rename = "userId")]
    pub user_id: Option<u32>,
}

/// The files uploaded for one candidate and one election year.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateYear {
    #[serde(rename = "candidateId")]
    pub candidate_id: u32,
    pub year: u32,
    /// The city the rows were tagged with.
    #[serde(default)]
    pub city: String,
    #[serde(rename = "sectionFile")]
    pub section_file: String,
    #[serde(rename = "neighborhoodFile")]
    pub neighborhood_file: String,
    #[serde(rename = "sectionDigest")]
    pub section_digest: String,
    #[serde(rename = "neighborhoodDigest")]
    pub neighborhood_digest: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SectionVoteRow {
    #[serde(rename = "candidateId")]
    pub candidate_id: u32,
    pub year: u32,
    pub city: String,
    pub zone: String,
    pub section: String,
    #[serde(rename = "aggregatedSections")]
    pub aggregated_sections: String,
    pub votes: u64,
    #[serde(rename = "pollingPlace")]
    pub polling_place: String,
    #[serde(rename = "pollingAddress")]
    pub polling_address: String,
    pub neighborhood: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodVoteRow {
    #[serde(rename = "candidateId")]
    pub candidate_id: u32,
    pub year: u32,
    pub city: String,
    pub neighborhood: String,
    pub votes: u64,
    pub percentage: f64,
    /// Copy of the mapping table, refreshed on upload and on every assignment.
    #[serde(rename = "regionalId")]
    pub regional_id: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Regional {
    pub id: u32,
    pub name: String,
    pub code: Option<String>,
    pub city: String,
    pub active: bool,
}

/// A row of the neighborhood to regional mapping. Neighborhoods are identified
/// by the normalized (city, neighborhood) pair.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RegionalAssignment {
    pub city: String,
    pub neighborhood: String,
    #[serde(rename = "regionalId")]
    pub regional_id: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    President,
    Candidate,
}

impl FromStr for Role {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "admin" | "administrador" => Ok(Role::Admin),
            "president" | "presidente" => Ok(Role::President),
            "candidate" | "candidato" => Ok(Role::Candidate),
            _ => UnknownRoleSnafu { role: s }.fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u32,
    pub login: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateGrant {
    #[serde(rename = "userId")]
    pub user_id: u32,
    #[serde(rename = "candidateId")]
    pub candidate_id: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartyGrant {
    #[serde(rename = "userId")]
    pub user_id: u32,
    #[serde(rename = "partyId")]
    pub party_id: u32,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "nextId", default)]
    pub next_id: u32,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "candidateYears", default)]
    pub candidate_years: Vec<CandidateYear>,
    #[serde(rename = "sectionRows", default)]
    pub section_rows: Vec<SectionVoteRow>,
    #[serde(rename = "neighborhoodRows", default)]
    pub neighborhood_rows: Vec<NeighborhoodVoteRow>,
    #[serde(default)]
    pub regionals: Vec<Regional>,
    #[serde(default)]
    pub assignments: Vec<RegionalAssignment>,
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(rename = "candidateGrants", default)]
    pub candidate_grants: Vec<CandidateGrant>,
    #[serde(rename = "partyGrants", default)]
    pub party_grants: Vec<PartyGrant>,
}

impl Store {
    /// Loads the store. A missing file is an empty store.
    pub fn load(path: &str) -> TallyResult<Store> {
        if !Path::new(path).exists() {
            info!("load: {} does not exist, starting from an empty store", path);
            return Ok(Store::default());
        }
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let store: Store = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        debug!(
            "load: {} parties, {} candidates, {} section rows, {} neighborhood rows",
            store.parties.len(),
            store.candidates.len(),
            store.section_rows.len(),
            store.neighborhood_rows.len()
        );
        Ok(store)
    }

    /// Writes the whole store to a temporary file next to the target, then
    /// renames it over the target.
    pub fn save(&self, path: &str) -> TallyResult<()> {
        let js = serde_json::to_string_pretty(self).context(ParsingJsonSnafu {})?;
        let tmp_path = format!("{}.tmp", path);
        fs::write(&tmp_path, js).context(WritingFileSnafu { path: tmp_path.clone() })?;
        fs::rename(&tmp_path, path).context(WritingFileSnafu { path })?;
        debug!("save: wrote {}", path);
        Ok(())
    }

    /// Ids are shared by all the tables and never reused.
    pub fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn party(&self, id: u32) -> TallyResult<&Party> {
        self.parties
            .iter()
            .find(|p| p.id == id)
            .context(UnknownPartySnafu { id })
    }

    pub fn party_mut(&mut self, id: u32) -> TallyResult<&mut Party> {
        self.parties
            .iter_mut()
            .find(|p| p.id == id)
            .context(UnknownPartySnafu { id })
    }

    pub fn candidate(&self, id: u32) -> TallyResult<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.id == id)
            .context(UnknownCandidateSnafu { id })
    }

    pub fn candidate_mut(&mut self, id: u32) -> TallyResult<&mut Candidate> {
        self.candidates
            .iter_mut()
            .find(|c| c.id == id)
            .context(UnknownCandidateSnafu { id })
    }

    pub fn regional(&self, id: u32) -> TallyResult<&Regional> {
        self.regionals
            .iter()
            .find(|r| r.id == id)
            .context(UnknownRegionalSnafu { id })
    }

    pub fn user(&self, id: u32) -> TallyResult<&UserProfile> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .context(UnknownUserIdSnafu { id })
    }

    pub fn user_mut(&mut self, id: u32) -> TallyResult<&mut UserProfile> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .context(UnknownUserIdSnafu { id })
    }

    /// The regional of a neighborhood, from the mapping table.
    pub fn regional_for(&self, city: &str, neighborhood: &str) -> Option<u32> {
        let city_key = normalize_key(city);
        let neighborhood_key = normalize_key(neighborhood);
        self.assignments
            .iter()
            .find(|a| {
                normalize_key(&a.city) == city_key
                    && normalize_key(&a.neighborhood) == neighborhood_key
            })
            .map(|a| a.regional_id)
    }

    fn regional_name(&self, id: Option<u32>) -> Option<String> {
        id.and_then(|id| self.regionals.iter().find(|r| r.id == id))
            .map(|r| r.name.clone())
    }

    /// Replaces all the vote rows of a candidate and a year.
    ///
    /// Returns the number of (section, neighborhood) rows that were removed.
    pub fn replace_candidate_year_rows(
        &mut self,
        candidate_id: u32,
        year: u32,
        sections: Vec<SectionVoteRow>,
        neighborhoods: Vec<NeighborhoodVoteRow>,
    ) -> (usize, usize) {
        let before_s = self.section_rows.len();
        self.section_rows
            .retain(|r| !(r.candidate_id == candidate_id && r.year == year));
        let before_n = self.neighborhood_rows.len();
        self.neighborhood_rows
            .retain(|r| !(r.candidate_id == candidate_id && r.year == year));
        let removed = (
            before_s - self.section_rows.len(),
            before_n - self.neighborhood_rows.len(),
        );
        self.section_rows.extend(sections);
        self.neighborhood_rows.extend(neighborhoods);
        removed
    }

    /// The section rows of a candidate, in the shape of the aggregation library.
    pub fn section_records(&self, candidate_id: u32) -> Vec<VoteRecord> {
        self.section_rows
            .iter()
            .filter(|r| r.candidate_id == candidate_id)
            .map(|r| {
                let regional = self.regional_name(self.regional_for(&r.city, &r.neighborhood));
                let mut record = VoteRecord::section(r.year, &r.zone, &r.section, r.votes)
                    .in_city(Some(&r.city))
                    .in_regional(regional.as_deref());
                if !r.neighborhood.trim().is_empty() {
                    record = record.in_neighborhood(&r.neighborhood);
                }
                record
            })
            .collect()
    }

    /// The neighborhood rows of a candidate, in the shape of the aggregation library.
    pub fn neighborhood_records(&self, candidate_id: u32) -> Vec<VoteRecord> {
        self.neighborhood_rows
            .iter()
            .filter(|r| r.candidate_id == candidate_id)
            .map(|r| {
                let regional = self.regional_name(r.regional_id);
                VoteRecord::neighborhood(r.year, &r.neighborhood, r.votes)
                    .in_city(Some(&r.city))
                    .in_regional(regional.as_deref())
            })
            .collect()
    }

    pub fn candidate_years_of(&self, candidate_id: u32) -> Vec<u32> {
        let mut years: Vec<u32> = self
            .candidate_years
            .iter()
            .filter(|cy| cy.candidate_id == candidate_id)
            .map(|cy| cy.year)
            .collect();
        years.sort_unstable();
        years
    }

    /// Sum of the votes of a candidate over all the years, from the neighborhood rows.
    pub fn candidate_total_votes(&self, candidate_id: u32) -> u64 {
        self.neighborhood_rows
            .iter()
            .filter(|r| r.candidate_id == candidate_id)
            .map(|r| r.votes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_row(candidate_id: u32, year: u32, zone: &str, votes: u64) -> SectionVoteRow {
        SectionVoteRow {
            candidate_id,
            year,
            city: "Fortaleza".to_string(),
            zone: zone.to_string(),
            section: "1".to_string(),
            aggregated_sections: String::new(),
            votes,
            polling_place: String::new(),
            polling_address: String::new(),
            neighborhood: "Centro".to_string(),
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.json");
        let store = Store::load(path.to_str().unwrap()).unwrap();
        assert_eq!(store, Store::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let path = path.to_str().unwrap();
        let mut store = Store::default();
        let id = store.allocate_id();
        store.parties.push(Party {
            id,
            name: "Partido Exemplo".to_string(),
            code: "PEX".to_string(),
            number: Some(99),
            active: true,
        });
        store.section_rows.push(section_row(1, 2024, "3", 12));
        store.save(path).unwrap();
        assert!(!Path::new(&format!("{}.tmp", path)).exists());

        let loaded = Store::load(path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.party(id).unwrap().code, "PEX");
        assert!(loaded.party(id + 1).is_err());
    }

    #[test]
    fn replace_rows_of_one_year_only() {
        let mut store = Store::default();
        store.section_rows.push(section_row(1, 2020, "1", 5));
        store.section_rows.push(section_row(1, 2024, "1", 7));
        store.section_rows.push(section_row(2, 2024, "1", 9));
        let removed = store.replace_candidate_year_rows(
            1,
            2024,
            vec![section_row(1, 2024, "2", 1), section_row(1, 2024, "3", 2)],
            vec![],
        );
        assert_eq!(removed, (1, 0));
        assert_eq!(store.section_rows.len(), 4);
        let votes_2024: u64 = store
            .section_rows
            .iter()
            .filter(|r| r.candidate_id == 1 && r.year == 2024)
            .map(|r| r.votes)
            .sum();
        assert_eq!(votes_2024, 3);
    }

    #[test]
    fn regional_lookup_is_normalized() {
        let mut store = Store::default();
        store.assignments.push(RegionalAssignment {
            city: "Fortaleza".to_string(),
            neighborhood: "José Bonifácio".to_string(),
            regional_id: 4,
        });
        assert_eq!(store.regional_for("FORTALEZA", " jose  bonifacio"), Some(4));
        assert_eq!(store.regional_for("Recife", "José Bonifácio"), None);
    }

    #[test]
    fn role_names() {
        assert_eq!("Presidente".parse::<Role>().unwrap(), Role::President);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
    }
}
