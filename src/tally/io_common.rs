// Mapping of the raw tables to vote rows, common to the CSV and Excel readers.

use std::path::Path;

use crate::tally::*;

/// A table as read from a file: the header, then the data rows with their
/// line number (1-based, the header being line 1).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    pub source: String,
    pub header: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
}

/// A field that could not be read and was replaced by zero.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct FieldWarning {
    pub file: String,
    pub lineno: usize,
    pub column: String,
    pub raw: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum SectionColumn {
    Zone,
    Section,
    AggregatedSections,
    Votes,
    PollingPlace,
    PollingAddress,
    Neighborhood,
}

impl SectionColumn {
    fn from_header(h: &str) -> Option<SectionColumn> {
        match normalize_key(h).as_str() {
            "zona" => Some(SectionColumn::Zone),
            "secao" => Some(SectionColumn::Section),
            "secoes agregadas" => Some(SectionColumn::AggregatedSections),
            "votos" => Some(SectionColumn::Votes),
            "local de votacao" => Some(SectionColumn::PollingPlace),
            "endereco do local de votacao" | "endereco" => Some(SectionColumn::PollingAddress),
            "bairro" => Some(SectionColumn::Neighborhood),
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum NeighborhoodColumn {
    Neighborhood,
    Votes,
    Percentage,
}

impl NeighborhoodColumn {
    fn from_header(h: &str) -> Option<NeighborhoodColumn> {
        match normalize_key(h).as_str() {
            "bairro" => Some(NeighborhoodColumn::Neighborhood),
            "votos" => Some(NeighborhoodColumn::Votes),
            "% votos obtidos" | "percentual votos" | "percentual" => {
                Some(NeighborhoodColumn::Percentage)
            }
            _ => None,
        }
    }
}

/// A row of a per-section file, before it is tagged with the candidate, the
/// year and the city.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedSection {
    pub zone: String,
    pub section: String,
    pub aggregated_sections: String,
    pub votes: u64,
    pub polling_place: String,
    pub polling_address: String,
    pub neighborhood: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ParsedNeighborhood {
    pub neighborhood: String,
    pub votes: u64,
    pub percentage: f64,
}

/// Reads a vote count the way spreadsheets export them: the leading integer
/// part is kept ("12abc" is 12). The flag is false when the cell was not a
/// plain integer.
pub fn parse_votes(raw: &str) -> (u64, bool) {
    let s = raw.trim();
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u64>() {
        Ok(v) => (v, digits.len() == s.len()),
        Err(_) => (0, false),
    }
}

/// Reads a percentage: "12,5", "12.5" and "12.5%" are all 12.5.
pub fn parse_percentage(raw: &str) -> (f64, bool) {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim().replace(',', ".");
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() => (x, true),
        _ => (0.0, false),
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

// The index of each known column. Unknown columns are dropped.
fn column_indices<C, F>(table: &Table, from_header: F) -> TallyResult<Vec<(usize, C)>>
where
    F: Fn(&str) -> Option<C>,
{
    let res: Vec<(usize, C)> = table
        .header
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| from_header(h).map(|c| (idx, c)))
        .collect();
    if res.is_empty() {
        return UnknownHeaderSnafu {
            path: table.source.clone(),
            header: table.header.join(","),
        }
        .fail();
    }
    debug!("column_indices: {}: {} known columns", table.source, res.len());
    Ok(res)
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

pub fn section_rows(table: &Table) -> TallyResult<(Vec<ParsedSection>, Vec<FieldWarning>)> {
    let columns = column_indices(table, SectionColumn::from_header)?;
    let mut res: Vec<ParsedSection> = Vec::new();
    let mut warnings: Vec<FieldWarning> = Vec::new();
    for (lineno, row) in table.rows.iter() {
        if is_blank(row) {
            continue;
        }
        let mut parsed = ParsedSection {
            zone: String::new(),
            section: String::new(),
            aggregated_sections: String::new(),
            votes: 0,
            polling_place: String::new(),
            polling_address: String::new(),
            neighborhood: String::new(),
        };
        for (idx, column) in columns.iter() {
            let raw = cell(row, *idx);
            match column {
                SectionColumn::Zone => parsed.zone = raw.to_string(),
                SectionColumn::Section => parsed.section = raw.to_string(),
                SectionColumn::AggregatedSections => parsed.aggregated_sections = raw.to_string(),
                SectionColumn::Votes => {
                    let (votes, clean) = parse_votes(raw);
                    if !clean {
                        warnings.push(FieldWarning {
                            file: table.source.clone(),
                            lineno: *lineno,
                            column: table.header[*idx].clone(),
                            raw: raw.to_string(),
                        });
                    }
                    parsed.votes = votes;
                }
                SectionColumn::PollingPlace => parsed.polling_place = raw.to_string(),
                SectionColumn::PollingAddress => parsed.polling_address = raw.to_string(),
                SectionColumn::Neighborhood => parsed.neighborhood = raw.to_string(),
            }
        }
        if parsed.zone.is_empty() {
            parsed.zone = "0".to_string();
        }
        if parsed.section.is_empty() {
            parsed.section = "0".to_string();
        }
        res.push(parsed);
    }
    Ok((res, warnings))
}

pub fn neighborhood_rows(
    table: &Table,
) -> TallyResult<(Vec<ParsedNeighborhood>, Vec<FieldWarning>)> {
    let columns = column_indices(table, NeighborhoodColumn::from_header)?;
    let mut res: Vec<ParsedNeighborhood> = Vec::new();
    let mut warnings: Vec<FieldWarning> = Vec::new();
    for (lineno, row) in table.rows.iter() {
        if is_blank(row) {
            continue;
        }
        let mut parsed = ParsedNeighborhood {
            neighborhood: String::new(),
            votes: 0,
            percentage: 0.0,
        };
        for (idx, column) in columns.iter() {
            let raw = cell(row, *idx);
            let clean = match column {
                NeighborhoodColumn::Neighborhood => {
                    parsed.neighborhood = raw.to_string();
                    true
                }
                NeighborhoodColumn::Votes => {
                    let (votes, clean) = parse_votes(raw);
                    parsed.votes = votes;
                    clean
                }
                NeighborhoodColumn::Percentage => {
                    let (pct, clean) = parse_percentage(raw);
                    parsed.percentage = pct;
                    clean
                }
            };
            if !clean {
                warnings.push(FieldWarning {
                    file: table.source.clone(),
                    lineno: *lineno,
                    column: table.header[*idx].clone(),
                    raw: raw.to_string(),
                });
            }
        }
        res.push(parsed);
    }
    Ok((res, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            source: "test.csv".to_string(),
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(idx, r)| (idx + 2, r.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    #[test]
    fn votes_like_spreadsheets() {
        assert_eq!(parse_votes(" 42 "), (42, true));
        assert_eq!(parse_votes("12abc"), (12, false));
        assert_eq!(parse_votes("1.234"), (1, false));
        assert_eq!(parse_votes("abc"), (0, false));
        assert_eq!(parse_votes(""), (0, false));
        assert_eq!(parse_votes("-3"), (0, false));
    }

    #[test]
    fn percentages_with_comma() {
        assert_eq!(parse_percentage("12,5"), (12.5, true));
        assert_eq!(parse_percentage("12.5 %"), (12.5, true));
        assert_eq!(parse_percentage("n/a"), (0.0, false));
        assert_eq!(parse_percentage("NaN"), (0.0, false));
    }

    #[test]
    fn header_variants_map_identically() {
        let accents = table(
            &["Zona", "Seção", "Seções Agregadas", "Votos", "Local de Votação", "Endereço do Local de Votação", "Bairro"],
            &[&["1", "10", "11;12", "35", "Escola A", "Rua B, 1", "Centro"]],
        );
        let plain = table(
            &[" ZONA", "secao", "Secoes Agregadas", "VOTOS", "local de votacao", "Endereco do Local de Votacao", "bairro "],
            &[&["1", "10", "11;12", "35", "Escola A", "Rua B, 1", "Centro"]],
        );
        let (a, wa) = section_rows(&accents).unwrap();
        let (b, wb) = section_rows(&plain).unwrap();
        assert_eq!(a, b);
        assert!(wa.is_empty() && wb.is_empty());
        assert_eq!(a[0].polling_address, "Rua B, 1");
        assert_eq!(a[0].aggregated_sections, "11;12");
    }

    #[test]
    fn decomposed_header_variants() {
        let composed = table(
            &["Zona", "Seção", "Seções Agregadas", "Votos", "Local de Votação", "Endereço", "Bairro"],
            &[&["3", "10", "", "12", "Escola", "Rua", "Icaraí"]],
        );
        let decomposed = table(
            &[
                "Zona",
                "Sec\u{0327}a\u{0303}o",
                "Sec\u{0327}o\u{0303}es Agregadas",
                "Votos",
                "Local de Votac\u{0327}a\u{0303}o",
                "Enderec\u{0327}o",
                "Bairro",
            ],
            &[&["3", "10", "", "12", "Escola", "Rua", "Icaraí"]],
        );
        let (a, _) = section_rows(&composed).unwrap();
        let (b, warnings) = section_rows(&decomposed).unwrap();
        assert_eq!(a, b);
        assert!(warnings.is_empty());
        assert_eq!(b[0].section, "10");
        assert_eq!(b[0].polling_address, "Rua");
    }

    #[test]
    fn sections_default_to_zero() {
        let t = table(
            &["Zona", "Seção", "Votos", "Bairro", "Extra"],
            &[&["", "", "x", "Centro", "ignored"], &["", "", "", "", ""], &["2"]],
        );
        let (rows, warnings) = section_rows(&t).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].zone, "0");
        assert_eq!(rows[0].section, "0");
        assert_eq!(rows[0].votes, 0);
        assert_eq!(rows[1].zone, "2");
        assert_eq!(rows[1].neighborhood, "");
        // One for "x" on line 2, one for the missing cell on line 4.
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].lineno, 2);
        assert_eq!(warnings[0].column, "Votos");
        assert_eq!(warnings[0].raw, "x");
        assert_eq!(warnings[1].lineno, 4);
    }

    #[test]
    fn neighborhood_percentages() {
        let t = table(
            &["Bairro", "Votos", "% Votos Obtidos"],
            &[&["Centro", "120", "12,5%"], &["Aldeota", "80", ""]],
        );
        let (rows, warnings) = neighborhood_rows(&t).unwrap();
        assert_eq!(rows[0].percentage, 12.5);
        assert_eq!(rows[1].votes, 80);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].column, "% Votos Obtidos");

        let t = table(&["Bairro", "Percentual Votos"], &[&["Centro", "1.5"]]);
        let (rows, _) = neighborhood_rows(&t).unwrap();
        assert_eq!(rows[0].percentage, 1.5);
    }

    #[test]
    fn unknown_header_is_an_error() {
        let t = table(&["name", "count"], &[&["a", "1"]]);
        assert!(matches!(
            neighborhood_rows(&t),
            Err(TallyError::UnknownHeader { .. })
        ));
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/tmp/data/secoes_2024.csv"), "secoes_2024.csv");
    }
}
