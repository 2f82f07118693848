// Reads the first worksheet of an Excel workbook as a table.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::tally::io_common::Table;
use crate::tally::*;

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        // Integral floats are how spreadsheets store counts: 35.0 is "35".
        DataType::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => String::new(),
        other => {
            warn!("cell_to_string: unsupported cell {:?}", other);
            String::new()
        }
    }
}

pub fn read_excel_file(path: &str) -> TallyResult<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range_at(0)
        .context(EmptyExcelSnafu { path })?
        .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let header: Vec<String> = match iter.next() {
        Some(row) => row.iter().map(cell_to_string).collect(),
        None => return MissingHeaderSnafu { path }.fail(),
    };
    debug!("read_excel_file: {}: header {:?}", path, header);

    // Line numbers as displayed by the spreadsheet, the header being line 1.
    let rows: Vec<(usize, Vec<String>)> = iter
        .enumerate()
        .map(|(idx, row)| (idx + 2, row.iter().map(cell_to_string).collect()))
        .collect();
    info!("read_excel_file: {}: {} rows", path, rows.len());
    Ok(Table {
        source: path.to_string(),
        header,
        rows,
    })
}
