use std::collections::HashSet;

use crate::tally::io_common::*;
use crate::tally::store::*;
use crate::tally::*;

/// One uploaded file: its name, its content as a table and the digest of
/// the raw bytes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UploadSource {
    pub name: String,
    pub digest: String,
    pub table: Table,
}

impl UploadSource {
    /// Reads a CSV file, or the first worksheet of an .xlsx workbook.
    pub fn from_path(path: &str) -> TallyResult<UploadSource> {
        let bytes = fs::read(path).context(OpeningFileSnafu { path })?;
        let digest = sha256::digest(bytes.as_slice());
        let table = if path.to_lowercase().ends_with(".xlsx") {
            io_excel::read_excel_file(path)?
        } else {
            io_csv::read_csv_table(bytes.as_slice(), path)?
        };
        Ok(UploadSource {
            name: simplify_file_name(path),
            digest,
            table,
        })
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct UploadReport {
    #[serde(rename = "candidateId")]
    pub candidate_id: u32,
    pub year: u32,
    pub city: String,
    /// The files are the same as the previous upload: nothing was replaced.
    pub unchanged: bool,
    #[serde(rename = "sectionRows")]
    pub section_rows: usize,
    #[serde(rename = "neighborhoodRows")]
    pub neighborhood_rows: usize,
    #[serde(rename = "replacedSectionRows")]
    pub replaced_section_rows: usize,
    #[serde(rename = "replacedNeighborhoodRows")]
    pub replaced_neighborhood_rows: usize,
    pub zones: usize,
    pub sections: usize,
    #[serde(rename = "totalVotes")]
    pub total_votes: u64,
    pub warnings: Vec<FieldWarning>,
}

/// Replaces the vote rows of a candidate for one year with the content of the
/// two files.
///
/// Every data row of the files becomes one stored row, tagged with the
/// candidate, the year and the city. Neighborhood rows take their regional from
/// the mapping table.
pub fn upload_candidate_year(
    store: &mut Store,
    candidate_id: u32,
    year: u32,
    sections: &UploadSource,
    neighborhoods: &UploadSource,
    city: &str,
    force: bool,
) -> TallyResult<UploadReport> {
    let candidate = store.candidate(candidate_id)?;
    ensure_whatever!(!city.trim().is_empty(), "The city of the upload is empty");
    let city = city.trim().to_string();
    info!(
        "upload_candidate_year: candidate {} ({}) year {} city {}",
        candidate.id, candidate.name, year, city
    );

    let previous = store
        .candidate_years
        .iter()
        .position(|cy| cy.candidate_id == candidate_id && cy.year == year);
    if let Some(idx) = previous {
        let cy = &store.candidate_years[idx];
        if !force
            && cy.city == city
            && cy.section_digest == sections.digest
            && cy.neighborhood_digest == neighborhoods.digest
        {
            info!("upload_candidate_year: files and city unchanged since the last upload, skipping");
            return Ok(UploadReport {
                candidate_id,
                year,
                city,
                unchanged: true,
                section_rows: 0,
                neighborhood_rows: 0,
                replaced_section_rows: 0,
                replaced_neighborhood_rows: 0,
                zones: 0,
                sections: 0,
                total_votes: 0,
                warnings: vec![],
            });
        }
    }

    // Both files are parsed before anything is replaced.
    let (parsed_sections, mut warnings) = section_rows(&sections.table)?;
    let (parsed_neighborhoods, neighborhood_warnings) = neighborhood_rows(&neighborhoods.table)?;
    warnings.extend(neighborhood_warnings);
    for w in warnings.iter() {
        warn!(
            "upload_candidate_year: {} line {}: could not read {:?} in column {}, using 0",
            w.file, w.lineno, w.raw, w.column
        );
    }

    let zones: HashSet<&str> = parsed_sections.iter().map(|s| s.zone.as_str()).collect();
    let section_keys: HashSet<(&str, &str)> = parsed_sections
        .iter()
        .map(|s| (s.zone.as_str(), s.section.as_str()))
        .collect();
    let num_zones = zones.len();
    let num_sections = section_keys.len();
    let section_total: u64 = parsed_sections.iter().map(|s| s.votes).sum();
    let neighborhood_total: u64 = parsed_neighborhoods.iter().map(|n| n.votes).sum();

    let new_sections: Vec<SectionVoteRow> = parsed_sections
        .into_iter()
        .map(|s| SectionVoteRow {
            candidate_id,
            year,
            city: city.clone(),
            zone: s.zone,
            section: s.section,
            aggregated_sections: s.aggregated_sections,
            votes: s.votes,
            polling_place: s.polling_place,
            polling_address: s.polling_address,
            neighborhood: s.neighborhood,
        })
        .collect();
    let new_neighborhoods: Vec<NeighborhoodVoteRow> = parsed_neighborhoods
        .into_iter()
        .map(|n| NeighborhoodVoteRow {
            candidate_id,
            year,
            city: city.clone(),
            regional_id: store.regional_for(&city, &n.neighborhood),
            neighborhood: n.neighborhood,
            votes: n.votes,
            percentage: n.percentage,
        })
        .collect();
    let num_section_rows = new_sections.len();
    let num_neighborhood_rows = new_neighborhoods.len();

    let candidate_year = CandidateYear {
        candidate_id,
        year,
        city: city.clone(),
        section_file: sections.name.clone(),
        neighborhood_file: neighborhoods.name.clone(),
        section_digest: sections.digest.clone(),
        neighborhood_digest: neighborhoods.digest.clone(),
    };
    match previous {
        Some(idx) => store.candidate_years[idx] = candidate_year,
        None => store.candidate_years.push(candidate_year),
    }
    let (replaced_s, replaced_n) =
        store.replace_candidate_year_rows(candidate_id, year, new_sections, new_neighborhoods);

    let report = UploadReport {
        candidate_id,
        year,
        city,
        unchanged: false,
        section_rows: num_section_rows,
        neighborhood_rows: num_neighborhood_rows,
        replaced_section_rows: replaced_s,
        replaced_neighborhood_rows: replaced_n,
        zones: num_zones,
        sections: num_sections,
        total_votes: std::cmp::max(section_total, neighborhood_total),
        warnings,
    };
    info!(
        "upload_candidate_year: {} section rows, {} neighborhood rows, {} warnings",
        report.section_rows,
        report.neighborhood_rows,
        report.warnings.len()
    );
    Ok(report)
}

/// The upload command: reads both files and uploads them.
pub fn upload_files(
    store: &mut Store,
    settings: &Settings,
    upload: &UploadArgs,
) -> TallyResult<UploadReport> {
    let city = match upload.city.as_ref().or(settings.default_city.as_ref()) {
        Some(c) => c.clone(),
        None => {
            whatever!("The city of the upload is required (--city, or defaultCity in the configuration)")
        }
    };
    let sections = UploadSource::from_path(&upload.sections)?;
    let neighborhoods = UploadSource::from_path(&upload.neighborhoods)?;
    upload_candidate_year(
        store,
        upload.candidate,
        upload.year,
        &sections,
        &neighborhoods,
        &city,
        upload.force,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONS: &str = "Zona,Seção,Seções Agregadas,Votos,Local de Votação,Endereço do Local de Votação,Bairro
1,10,,40,Escola A,Rua 1,Centro
1,11,,x,Escola A,Rua 1,Centro
2,7,,60,Escola B,Rua 2,Meireles
";

    const NEIGHBORHOODS: &str = "Bairro,Votos,% Votos Obtidos
Centro,40,\"1,2\"
Meireles,60,1.8%
";

    fn source(name: &str, data: &str) -> UploadSource {
        UploadSource {
            name: name.to_string(),
            digest: sha256::digest(data),
            table: io_csv::read_csv_table(data.as_bytes(), name).unwrap(),
        }
    }

    fn test_store() -> Store {
        let mut store = Store::default();
        store.candidates.push(Candidate {
            id: 3,
            name: "Maria".to_string(),
            number: Some(12345),
            photo_url: None,
            party_id: 1,
            active: true,
            uses_regionals: true,
            user_id: None,
        });
        store.assignments.push(RegionalAssignment {
            city: "Fortaleza".to_string(),
            neighborhood: "MEIRELES".to_string(),
            regional_id: 8,
        });
        store
    }

    #[test]
    fn every_row_is_stored_and_tagged() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut store = test_store();
        let report = upload_candidate_year(
            &mut store,
            3,
            2024,
            &source("secoes.csv", SECTIONS),
            &source("bairros.csv", NEIGHBORHOODS),
            "Fortaleza",
            false,
        )
        .unwrap();
        assert_eq!(report.section_rows, 3);
        assert_eq!(report.neighborhood_rows, 2);
        assert_eq!(report.zones, 2);
        assert_eq!(report.sections, 3);
        assert_eq!(report.total_votes, 100);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].lineno, 3);

        assert_eq!(store.section_rows.len(), 3);
        assert!(store
            .section_rows
            .iter()
            .all(|r| r.candidate_id == 3 && r.year == 2024 && r.city == "Fortaleza"));
        let meireles = store
            .neighborhood_rows
            .iter()
            .find(|r| r.neighborhood == "Meireles")
            .unwrap();
        assert_eq!(meireles.regional_id, Some(8));
        assert_eq!(meireles.percentage, 1.8);
        assert_eq!(store.candidate_years.len(), 1);
        assert_eq!(store.candidate_years[0].section_file, "secoes.csv");
    }

    #[test]
    fn reupload_replaces_rows() {
        let mut store = test_store();
        let neighborhoods = source("bairros.csv", NEIGHBORHOODS);
        upload_candidate_year(
            &mut store,
            3,
            2024,
            &source("secoes.csv", SECTIONS),
            &neighborhoods,
            "Fortaleza",
            false,
        )
        .unwrap();
        let smaller = "Zona,Seção,Votos\n5,1,9\n";
        let report = upload_candidate_year(
            &mut store,
            3,
            2024,
            &source("secoes_v2.csv", smaller),
            &neighborhoods,
            "Fortaleza",
            false,
        )
        .unwrap();
        assert_eq!(report.replaced_section_rows, 3);
        assert_eq!(report.replaced_neighborhood_rows, 2);
        assert_eq!(store.section_rows.len(), 1);
        assert_eq!(store.section_rows[0].zone, "5");
        assert_eq!(store.neighborhood_rows.len(), 2);
        assert_eq!(store.candidate_years.len(), 1);
        assert_eq!(store.candidate_years[0].section_file, "secoes_v2.csv");
    }

    #[test]
    fn unchanged_files_are_skipped() {
        let mut store = test_store();
        let sections = source("secoes.csv", SECTIONS);
        let neighborhoods = source("bairros.csv", NEIGHBORHOODS);
        upload_candidate_year(&mut store, 3, 2024, &sections, &neighborhoods, "Fortaleza", false)
            .unwrap();
        let report =
            upload_candidate_year(&mut store, 3, 2024, &sections, &neighborhoods, "Fortaleza", false)
                .unwrap();
        assert!(report.unchanged);
        let report =
            upload_candidate_year(&mut store, 3, 2024, &sections, &neighborhoods, "Fortaleza", true)
                .unwrap();
        assert!(!report.unchanged);
        assert_eq!(report.replaced_section_rows, 3);
        assert_eq!(store.section_rows.len(), 3);
    }

    #[test]
    fn new_city_with_same_files_replaces_rows() {
        let mut store = test_store();
        let sections = source("secoes.csv", SECTIONS);
        let neighborhoods = source("bairros.csv", NEIGHBORHOODS);
        upload_candidate_year(&mut store, 3, 2024, &sections, &neighborhoods, "Fortaleza", false)
            .unwrap();
        let report =
            upload_candidate_year(&mut store, 3, 2024, &sections, &neighborhoods, "Caucaia", false)
                .unwrap();
        assert!(!report.unchanged);
        assert_eq!(report.city, "Caucaia");
        assert_eq!(store.candidate_years[0].city, "Caucaia");
        assert!(store.section_rows.iter().all(|r| r.city == "Caucaia"));
        assert!(store.neighborhood_rows.iter().all(|r| r.city == "Caucaia"));
        // The mapping of Meireles belongs to Fortaleza.
        assert!(store.neighborhood_rows.iter().all(|r| r.regional_id.is_none()));
        assert_eq!(store.section_rows.len(), 3);
    }

    #[test]
    fn decomposed_headers_are_recognized() {
        let mut store = test_store();
        let sections = "Zona,Sec\u{0327}a\u{0303}o,Votos,Bairro\n1,10,40,Centro\n";
        let report = upload_candidate_year(
            &mut store,
            3,
            2024,
            &source("secoes.csv", sections),
            &source("bairros.csv", NEIGHBORHOODS),
            "Fortaleza",
            false,
        )
        .unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(store.section_rows[0].section, "10");
    }

    #[test]
    fn unknown_candidate() {
        let mut store = test_store();
        let res = upload_candidate_year(
            &mut store,
            4,
            2024,
            &source("secoes.csv", SECTIONS),
            &source("bairros.csv", NEIGHBORHOODS),
            "Fortaleza",
            false,
        );
        assert!(matches!(res, Err(TallyError::UnknownCandidate { id: 4 })));
    }

    #[test]
    fn upload_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let sections_p = dir.path().join("secoes.csv");
        let neighborhoods_p = dir.path().join("bairros.csv");
        fs::write(&sections_p, SECTIONS).unwrap();
        fs::write(&neighborhoods_p, NEIGHBORHOODS).unwrap();
        let settings = Settings {
            data_file: "unused.json".to_string(),
            email_domain: "example.com".to_string(),
            default_top_n: 10,
            default_year: None,
            default_city: Some("Fortaleza".to_string()),
        };
        let upload = UploadArgs {
            candidate: 3,
            year: 2020,
            sections: sections_p.to_str().unwrap().to_string(),
            neighborhoods: neighborhoods_p.to_str().unwrap().to_string(),
            city: None,
            force: false,
        };
        let mut store = test_store();
        let report = upload_files(&mut store, &settings, &upload).unwrap();
        assert_eq!(report.city, "Fortaleza");
        assert_eq!(store.candidate_years[0].section_digest, sha256::digest(SECTIONS));
    }

    #[test]
    fn missing_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nothing.csv");
        let res = UploadSource::from_path(path.to_str().unwrap());
        assert!(matches!(res, Err(TallyError::OpeningFile { .. })));
    }
}
