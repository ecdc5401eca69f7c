//! Length-weighted aggregation of per-observation metrics.
//!
//! Per-utterance WER averaged naively over-weights short utterances; the
//! corpus-level figure is the reference-length weighted mean. For every distinct
//! key combination we emit one record with
//!
//! ```text
//! out[v] = Σ in[v] * in[w] / Σ in[w]
//! ```
//!
//! The weight column itself, if requested as a value, is emitted as the plain
//! group total. A group whose weights sum to zero yields NaN for its weighted
//! values.

use std::collections::HashMap;

use crate::domain::{Record, Table, Value};
use crate::error::AppError;

/// Which columns to aggregate and how to group them.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    pub weight: String,
    pub values: Vec<String>,
    pub keys: Vec<String>,
}

struct Group {
    key: Vec<Value>,
    weight_total: f64,
    weighted_sums: Vec<f64>,
}

/// Weighted group means, one output record per key, in first-seen key order.
pub fn weighted_group_means(table: &Table, spec: &AggregateSpec) -> Result<Table, AppError> {
    if spec.values.is_empty() {
        return Err(AppError::config("aggregation needs at least one value column"));
    }
    if spec.keys.is_empty() {
        return Err(AppError::config("aggregation needs at least one key column"));
    }

    let weights = table.numeric_column(&spec.weight)?;
    let value_columns: Vec<Vec<f64>> = spec
        .values
        .iter()
        .map(|v| table.numeric_column(v))
        .collect::<Result<_, _>>()?;
    let key_columns: Vec<Vec<String>> = spec
        .keys
        .iter()
        .map(|k| table.category_column(k))
        .collect::<Result<_, _>>()?;

    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for (row, record) in table.records().iter().enumerate() {
        let key_text: Vec<String> = key_columns.iter().map(|c| c[row].clone()).collect();
        let slot = match index.get(&key_text) {
            Some(&slot) => slot,
            None => {
                let key = spec
                    .keys
                    .iter()
                    .map(|k| record.get(k).cloned().unwrap_or(Value::Text(String::new())))
                    .collect();
                groups.push(Group {
                    key,
                    weight_total: 0.0,
                    weighted_sums: vec![0.0; spec.values.len()],
                });
                index.insert(key_text, groups.len() - 1);
                groups.len() - 1
            }
        };

        let w = weights[row];
        let group = &mut groups[slot];
        group.weight_total += w;
        for (j, column) in value_columns.iter().enumerate() {
            group.weighted_sums[j] += column[row] * w;
        }
    }

    let mut out = Table::new(spec.keys.iter().chain(&spec.values).cloned().collect());
    for group in groups {
        if group.weight_total == 0.0 {
            tracing::warn!(key = ?group.key, "group has zero total weight; weighted means are NaN");
        }
        let mut rec = Record::new();
        for (k, v) in spec.keys.iter().zip(group.key) {
            rec.insert(k.clone(), v);
        }
        for (j, name) in spec.values.iter().enumerate() {
            let value = if *name == spec.weight {
                group.weight_total
            } else if group.weight_total == 0.0 {
                f64::NAN
            } else {
                group.weighted_sums[j] / group.weight_total
            };
            rec.insert(name.clone(), Value::Num(value));
        }
        out.push(rec);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record;

    fn utterances() -> Table {
        Table::from_records(vec![
            record([("model", "lm1".into()), ("wer", 0.1.into()), ("len", 10.0.into())]),
            record([("model", "lm2".into()), ("wer", 0.5.into()), ("len", 4.0.into())]),
            record([("model", "lm1".into()), ("wer", 0.4.into()), ("len", 30.0.into())]),
        ])
    }

    fn spec(values: &[&str]) -> AggregateSpec {
        AggregateSpec {
            weight: "len".into(),
            values: values.iter().map(|s| s.to_string()).collect(),
            keys: vec!["model".into()],
        }
    }

    #[test]
    fn weights_by_length_and_keeps_first_seen_order() {
        let out = weighted_group_means(&utterances(), &spec(&["wer"])).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.category_column("model").unwrap(), vec!["lm1", "lm2"]);
        let wer = out.numeric_column("wer").unwrap();
        assert!((wer[0] - (0.1 * 10.0 + 0.4 * 30.0) / 40.0).abs() < 1e-12);
        assert!((wer[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn weight_column_is_summed_not_averaged() {
        let out = weighted_group_means(&utterances(), &spec(&["wer", "len"])).unwrap();
        assert_eq!(out.numeric_column("len").unwrap(), vec![40.0, 4.0]);
    }

    #[test]
    fn zero_weight_group_is_nan() {
        let table = Table::from_records(vec![record([
            ("model", "lm1".into()),
            ("wer", 0.3.into()),
            ("len", 0.0.into()),
        ])]);
        let out = weighted_group_means(&table, &spec(&["wer"])).unwrap();
        assert!(out.numeric_column("wer").unwrap()[0].is_nan());
    }
}
