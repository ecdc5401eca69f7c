use std::fs;

use wer_curves::data::{AggregateSpec, weighted_group_means};
use wer_curves::domain::{FitReport, Value};
use wer_curves::io::{read_table_csv, write_report, write_table};

#[test]
fn aggregated_table_survives_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("utts.csv");
    fs::write(
        &input,
        "system,snr,wer,length\n\
         base,clean,0.10,10\n\
         base,clean,0.20,30\n\
         base,noisy,0.40,20\n\
         big,clean,0.05,5\n",
    )
    .unwrap();

    let table = read_table_csv(&input).unwrap();
    let spec = AggregateSpec {
        weight: "length".into(),
        values: vec!["wer".into(), "length".into()],
        keys: vec!["system".into(), "snr".into()],
    };
    let agg = weighted_group_means(&table, &spec).unwrap();
    assert_eq!(agg.len(), 3);

    let output = dir.path().join("agg.csv");
    write_table(&output, &agg).unwrap();
    let back = read_table_csv(&output).unwrap();

    assert_eq!(back.columns(), agg.columns());
    assert_eq!(back.category_column("system").unwrap(), vec!["base", "base", "big"]);
    let wer = back.numeric_column("wer").unwrap();
    assert!((wer[0] - 0.175).abs() < 1e-12);
    assert!((wer[1] - 0.40).abs() < 1e-12);
    assert_eq!(back.numeric_column("length").unwrap(), vec![40.0, 20.0, 5.0]);
    assert_eq!(back.records()[2]["snr"], Value::Text("clean".into()));
}

#[test]
fn report_json_round_trips_through_serde() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let report = FitReport::point_estimates("Zhang", &["A".into(), "B".into(), "C".into()], &[1.2, -4.0, 0.9]);
    write_report(&path, &report).unwrap();
    let back: FitReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back.title, "Zhang");
    assert_eq!(back.coefficients.len(), 3);
    assert_eq!(back.coefficient("B").unwrap().estimate, -4.0);
}

#[test]
fn unreadable_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_table_csv(&dir.path().join("missing.csv")).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
