//! Exports for downstream plotting: tables as CSV, reports as CSV or JSON.
//!
//! The output format is picked from the file extension (`.json` or anything
//! else for CSV).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{FitReport, Table};
use crate::error::AppError;

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path)
        .map_err(|e| AppError::io(format!("failed to create '{}': {e}", path.display())))
}

fn csv_error(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::io(format!("failed to write CSV '{}': {e}", path.display()))
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, value)
        .map_err(|e| AppError::io(format!("failed to write JSON '{}': {e}", path.display())))?;
    writeln!(file).map_err(|e| AppError::io(format!("failed to write JSON '{}': {e}", path.display())))
}

/// Write `table` as CSV; missing cells are empty.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    writer.write_record(table.columns()).map_err(|e| csv_error(path, e))?;
    for record in table.records() {
        let row: Vec<String> = table
            .columns()
            .iter()
            .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| csv_error(path, e))
}

pub fn write_table(path: &Path, table: &Table) -> Result<(), AppError> {
    if is_json(path) {
        write_json(path, table)
    } else {
        write_table_csv(path, table)
    }
}

/// One CSV row per coefficient.
pub fn write_report_csv(path: &Path, report: &FitReport) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    writer
        .write_record(["name", "estimate", "std_err", "bias", "ci_low", "ci_high"])
        .map_err(|e| csv_error(path, e))?;
    for coef in &report.coefficients {
        let mut row = vec![coef.name.clone(), coef.estimate.to_string()];
        match &coef.uncertainty {
            Some(u) => row.extend([u.std_err, u.bias, u.ci_low, u.ci_high].map(|v| v.to_string())),
            None => row.extend(std::iter::repeat_n(String::new(), 4)),
        }
        writer.write_record(&row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| csv_error(path, e))
}

pub fn write_report(path: &Path, report: &FitReport) -> Result<(), AppError> {
    if is_json(path) {
        write_json(path, report)
    } else {
        write_report_csv(path, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Uncertainty, record};

    #[test]
    fn report_csv_leaves_blank_uncertainty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.csv");
        let mut report = FitReport::point_estimates("t", &["k".into(), "c".into()], &[-1.0, 0.5]);
        report.coefficients[1].uncertainty = Some(Uncertainty {
            std_err: 0.1,
            bias: 0.0,
            ci_low: 0.3,
            ci_high: 0.7,
        });
        write_report(&path, &report).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name,estimate,std_err,bias,ci_low,ci_high");
        assert_eq!(lines[1], "k,-1,,,,");
        assert_eq!(lines[2], "c,0.5,0.1,0,0.3,0.7");
    }

    #[test]
    fn json_extension_selects_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.JSON");
        let table = Table::from_records(vec![record([("x", 1.0.into())])]);
        write_table(&path, &table).unwrap();
        let back: Table = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, table);
    }
}
