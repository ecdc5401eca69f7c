//! CSV ingest into a [`Table`].
//!
//! Every header becomes a column; every non-empty cell becomes a value
//! (`Num` when it parses as `f64`, `Text` otherwise). Empty cells are left out
//! of the record, so numeric accessors report them as missing.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::{Record, Table, Value};
use crate::error::AppError;

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Read a CSV table from any reader.
pub fn read_table<R: Read>(reader: R) -> Result<Table, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::invalid(format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();
    if let Some(dup) = headers
        .iter()
        .enumerate()
        .find(|(i, h)| headers[..*i].contains(h))
        .map(|(_, h)| h)
    {
        return Err(AppError::invalid(format!("duplicate CSV column '{dup}'")));
    }

    let mut table = Table::new(headers.clone());
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        let row = result.map_err(|e| AppError::invalid(format!("line {line}: {e}")))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(h, cell)| (h.clone(), Value::parse(cell)))
            .collect();
        table.push(record);
    }

    tracing::debug!(rows = table.len(), columns = table.columns().len(), "read CSV table");
    Ok(table)
}

/// Read a CSV table from `path`.
pub fn read_table_csv(path: &Path) -> Result<Table, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("failed to open CSV '{}': {e}", path.display())))?;
    read_table(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_typed_and_blanks_dropped() {
        let csv = "\u{feff}model, wer ,len\nbase,0.12,10\nbase,,4\n";
        let table = read_table(csv.as_bytes()).unwrap();
        assert_eq!(table.columns(), &["model", "wer", "len"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0]["wer"], Value::Num(0.12));
        assert_eq!(table.records()[0]["model"], Value::Text("base".into()));
        assert!(!table.records()[1].contains_key("wer"));
    }

    #[test]
    fn ragged_rows_are_rejected_with_line_number() {
        let err = read_table("a,b\n1,2\n3\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        assert!(read_table("a,a\n1,2\n".as_bytes()).is_err());
    }

    #[test]
    fn missing_file_maps_to_io_exit_code() {
        let err = read_table_csv(Path::new("/nonexistent/wer.csv")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
