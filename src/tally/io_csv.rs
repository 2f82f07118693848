// Primitives for reading CSV files.

use std::io::Read;

use crate::tally::io_common::Table;
use crate::tally::*;

/// Reads a comma-separated table. The first non-empty line is the header.
pub fn read_csv_table<R: Read>(rdr: R, source: &str) -> TallyResult<Table> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr);
    let mut records = reader.into_records();

    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1usize })?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => return MissingHeaderSnafu { path: source }.fail(),
    };
    debug!("read_csv_table: {}: header {:?}", source, header);

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let fallback_lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            lineno: fallback_lineno,
        })?;
        // Empty lines are skipped by the reader, the position keeps the real line.
        let lineno = line
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_lineno);
        rows.push((lineno, line.iter().map(|s| s.to_string()).collect()));
    }
    info!("read_csv_table: {}: {} rows", source, rows.len());
    Ok(Table {
        source: source.to_string(),
        header,
        rows,
    })
}
