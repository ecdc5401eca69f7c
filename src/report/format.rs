//! Formatted terminal output.
//!
//! Formatting lives in one place so the numeric code stays free of
//! presentation concerns and output changes stay localized.

use crate::data::BinAssignment;
use crate::domain::{FitReport, Table};
use crate::fit::{StructuredFit, Type2Result};

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_else(|| "-".to_string())
}

/// Coefficient table with optional bootstrap columns.
pub fn format_fit_report(report: &FitReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", report.title));
    if let Some(q) = &report.quality {
        out.push_str(&format!("n={} | SSE={:.6e} | RMSE={:.6}\n", q.n, q.sse, q.rmse));
    }
    if let (Some(level), Some(b)) = (report.level, report.replicates) {
        out.push_str(&format!(
            "wild bootstrap: B={b} | {:.1}% bias-corrected intervals\n",
            level * 100.0
        ));
    }

    let width = report
        .coefficients
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(4)
        .max(4);
    out.push_str(&format!(
        "\n{:<width$}  {:>12}  {:>12}  {:>12}  {:>12}  {:>12}\n",
        "name", "estimate", "std_err", "bias", "ci_low", "ci_high"
    ));
    for c in &report.coefficients {
        let u = c.uncertainty.as_ref();
        out.push_str(&format!(
            "{:<width$}  {:>12.6}  {:>12}  {:>12}  {:>12}  {:>12}\n",
            c.name,
            c.estimate,
            fmt_opt(u.map(|u| u.std_err)),
            fmt_opt(u.map(|u| u.bias)),
            fmt_opt(u.map(|u| u.ci_low)),
            fmt_opt(u.map(|u| u.ci_high)),
        ));
    }
    out
}

/// Per-bin exponents followed by the full coefficient report.
pub fn format_structured(fit: &StructuredFit, report: &FitReport) -> String {
    let mut out = String::new();
    let width = fit
        .exponents
        .iter()
        .map(|e| e.level.len())
        .max()
        .unwrap_or(3)
        .max(3);
    out.push_str(&format!("{:<width$}  {:>12}\n", "bin", "k"));
    for e in &fit.exponents {
        out.push_str(&format!("{:<width$}  {:>12.6}\n", e.level, e.k));
    }
    if !fit.missing_levels().is_empty() {
        out.push_str(&format!(
            "missing levels (omitted): {}\n",
            fit.missing_levels().join(", ")
        ));
    }
    out.push('\n');
    out.push_str(&format_fit_report(report));
    out
}

pub fn format_type2(res: &Type2Result) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== type-II regression ({}) ===\n", res.method.display_name()));
    out.push_str(&format!("n={}\n", res.predictions.len()));
    out.push_str(&format!("slope      {:>12.6}  se {}\n", res.slope, fmt_opt(res.std_slope)));
    out.push_str(&format!(
        "intercept  {:>12.6}  se {}\n",
        res.intercept,
        fmt_opt(res.std_intercept)
    ));
    out.push_str(&format!("r          {:>12.6}\n", res.r));
    out
}

pub fn format_bins(bins: &BinAssignment) -> String {
    let trimmed = bins.assignments.iter().filter(|a| a.is_none()).count();
    let width = bins.bins.iter().map(|b| b.label.len()).max().unwrap_or(5).max(5);
    let mut out = format!("{:<width$}  {:>8}\n", "label", "count");
    for b in &bins.bins {
        out.push_str(&format!("{:<width$}  {:>8}\n", b.label, b.count));
    }
    if trimmed > 0 {
        out.push_str(&format!("trimmed: {trimmed}\n"));
    }
    out
}

/// Column-aligned dump of a table; at most `max_rows` rows.
pub fn format_table(table: &Table, max_rows: usize) -> String {
    let cells: Vec<Vec<String>> = table
        .records()
        .iter()
        .take(max_rows)
        .map(|r| {
            table
                .columns()
                .iter()
                .map(|c| r.get(c).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(j, c)| cells.iter().map(|row| row[j].len()).fold(c.len(), usize::max))
        .collect();

    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(table.columns());
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.as_slice()));
        out.push('\n');
    }
    if table.len() > max_rows {
        out.push_str(&format!("... {} more rows\n", table.len() - max_rows));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Value, record};

    #[test]
    fn table_columns_are_aligned() {
        let table = Table::from_records(vec![
            record([("key", Value::from("a")), ("wer", Value::Num(0.25))]),
            record([("key", Value::from("long")), ("wer", Value::Num(1.0))]),
        ]);
        let text = format_table(&table, 10);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "key   wer");
        assert_eq!(lines[1], "a     0.25");
        assert_eq!(lines[2], "long  1");
    }

    #[test]
    fn point_estimates_show_dashes() {
        let report = FitReport::point_estimates("Boothroyd", &["k".into()], &[-1.0]);
        let text = format_fit_report(&report);
        assert!(text.contains("=== Boothroyd ==="));
        assert!(text.lines().any(|l| l.starts_with("k ") && l.trim_end().ends_with('-')));
    }
}
