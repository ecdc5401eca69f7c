//! Explicit design-matrix builder for categorical interaction models.
//!
//! Terms are added in column order:
//! - `Intercept` (a column of ones)
//! - indicator columns `name[level]` for a categorical variable
//! - interaction columns `name[level]:label`, i.e. an indicator multiplied by a
//!   continuous column
//!
//! Indicator sets are reference-coded (first level dropped) when an intercept
//! is present, so the design stays full rank. Interaction terms always keep
//! every level. A declared level with no rows is left out of the matrix and
//! reported through [`DesignMatrix::missing_levels`].

use nalgebra::DMatrix;

use crate::error::{AppError, ensure_finite, ensure_same_len};

/// Distinct values in order of first appearance.
pub fn levels_in_order(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Factor {
    name: String,
    values: Vec<String>,
    levels: Vec<String>,
}

#[derive(Debug, Clone)]
enum Term {
    Indicators(Factor),
    Interaction {
        factor: Factor,
        label: String,
        continuous: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub matrix: DMatrix<f64>,
    pub names: Vec<String>,
    /// `name[level]` for every declared level without observations.
    pub missing_levels: Vec<String>,
}

impl DesignMatrix {
    pub fn ncols(&self) -> usize {
        self.names.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[derive(Debug, Clone)]
pub struct DesignBuilder {
    rows: usize,
    intercept: bool,
    terms: Vec<Term>,
}

impl DesignBuilder {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            intercept: false,
            terms: Vec::new(),
        }
    }

    pub fn intercept(mut self, on: bool) -> Self {
        self.intercept = on;
        self
    }

    fn factor(
        &self,
        name: &str,
        values: &[String],
        levels: Option<&[String]>,
    ) -> Result<Factor, AppError> {
        ensure_same_len("design rows", self.rows, name, values.len())?;
        let levels = match levels {
            Some(l) => l.to_vec(),
            None => levels_in_order(values),
        };
        let duplicate = levels
            .iter()
            .enumerate()
            .find(|(i, l)| levels[..*i].contains(l));
        if let Some((_, dup)) = duplicate {
            return Err(AppError::invalid(format!(
                "{name} level '{dup}' is declared more than once"
            )));
        }
        if let Some(v) = values.iter().find(|v| !levels.contains(v)) {
            return Err(AppError::invalid(format!(
                "{name} value '{v}' is not a declared level"
            )));
        }
        Ok(Factor {
            name: name.to_string(),
            values: values.to_vec(),
            levels,
        })
    }

    /// Indicator columns for a categorical variable.
    pub fn indicators(
        mut self,
        name: &str,
        values: &[String],
        levels: Option<&[String]>,
    ) -> Result<Self, AppError> {
        let factor = self.factor(name, values, levels)?;
        self.terms.push(Term::Indicators(factor));
        Ok(self)
    }

    /// One `name[level]:label` column per level of the categorical variable.
    pub fn interaction(
        mut self,
        name: &str,
        values: &[String],
        levels: Option<&[String]>,
        label: &str,
        continuous: &[f64],
    ) -> Result<Self, AppError> {
        ensure_same_len("design rows", self.rows, label, continuous.len())?;
        ensure_finite(label, continuous)?;
        let factor = self.factor(name, values, levels)?;
        self.terms.push(Term::Interaction {
            factor,
            label: label.to_string(),
            continuous: continuous.to_vec(),
        });
        Ok(self)
    }

    pub fn build(self) -> Result<DesignMatrix, AppError> {
        let mut names: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        let mut missing_levels: Vec<String> = Vec::new();

        if self.intercept {
            names.push("Intercept".to_string());
            columns.push(vec![1.0; self.rows]);
        }

        for term in &self.terms {
            let (factor, scale, suffix) = match term {
                Term::Indicators(f) => (f, None, String::new()),
                Term::Interaction {
                    factor,
                    label,
                    continuous,
                } => (factor, Some(continuous), format!(":{label}")),
            };
            let observed: Vec<&String> = factor
                .levels
                .iter()
                .filter(|l| {
                    let present = factor.values.contains(l);
                    if !present {
                        missing_levels.push(format!("{}[{l}]", factor.name));
                    }
                    present
                })
                .collect();
            let skip = usize::from(self.intercept && scale.is_none());
            for level in observed.into_iter().skip(skip) {
                names.push(format!("{}[{level}]{suffix}", factor.name));
                columns.push(
                    factor
                        .values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| match (v == level, scale) {
                            (false, _) => 0.0,
                            (true, None) => 1.0,
                            (true, Some(c)) => c[i],
                        })
                        .collect(),
                );
            }
        }

        if columns.is_empty() {
            return Err(AppError::invalid("design matrix has no columns"));
        }
        if self.rows < columns.len() {
            return Err(AppError::invalid(format!(
                "{} rows cannot identify {} design columns",
                self.rows,
                columns.len()
            )));
        }
        for level in &missing_levels {
            tracing::warn!(level = %level, "declared level has no observations; omitted from design");
        }

        let matrix = DMatrix::from_fn(self.rows, columns.len(), |i, j| columns[j][i]);
        Ok(DesignMatrix {
            matrix,
            names,
            missing_levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reference_coding_drops_first_level_with_intercept() {
        let quality = strings(&["clean", "noisy", "clean", "other"]);
        let d = DesignBuilder::new(4)
            .intercept(true)
            .indicators("snr", &quality, None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(d.names, vec!["Intercept", "snr[noisy]", "snr[other]"]);
        assert_eq!(d.matrix[(1, 1)], 1.0);
        assert_eq!(d.matrix[(2, 1)], 0.0);
        assert_eq!(d.matrix[(3, 2)], 1.0);
    }

    #[test]
    fn full_indicator_set_without_intercept() {
        let quality = strings(&["a", "b"]);
        let d = DesignBuilder::new(2)
            .indicators("q", &quality, None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(d.names, vec!["q[a]", "q[b]"]);
    }

    #[test]
    fn interaction_crosses_indicator_with_continuous() {
        let bins = strings(&["lo", "hi", "lo"]);
        let d = DesignBuilder::new(3)
            .intercept(true)
            .interaction("bin", &bins, None, "log(x)", &[0.5, 2.0, 1.5])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(d.names, vec!["Intercept", "bin[lo]:log(x)", "bin[hi]:log(x)"]);
        assert_eq!(d.matrix[(0, 1)], 0.5);
        assert_eq!(d.matrix[(1, 1)], 0.0);
        assert_eq!(d.matrix[(1, 2)], 2.0);
        assert_eq!(d.matrix[(2, 1)], 1.5);
    }

    #[test]
    fn unobserved_level_is_reported_not_fatal() {
        let bins = strings(&["a", "a", "c"]);
        let levels = strings(&["a", "b", "c"]);
        let d = DesignBuilder::new(3)
            .interaction("bin", &bins, Some(&levels), "x", &[1.0, 2.0, 3.0])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(d.names, vec!["bin[a]:x", "bin[c]:x"]);
        assert_eq!(d.missing_levels, vec!["bin[b]"]);
    }

    #[test]
    fn undeclared_value_is_rejected() {
        let bins = strings(&["a", "z"]);
        let levels = strings(&["a"]);
        assert!(
            DesignBuilder::new(2)
                .interaction("bin", &bins, Some(&levels), "x", &[1.0, 2.0])
                .is_err()
        );
    }

    #[test]
    fn duplicate_declared_level_is_rejected() {
        let bins = strings(&["a", "b", "a"]);
        let levels = strings(&["a", "a", "b"]);
        let err = DesignBuilder::new(3)
            .interaction("bin", &bins, Some(&levels), "x", &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("'a'"), "{err}");
    }

    #[test]
    fn more_columns_than_rows_is_rejected() {
        let bins = strings(&["a", "b"]);
        let err = DesignBuilder::new(2)
            .intercept(true)
            .interaction("bin", &bins, None, "x", &[1.0, 2.0])
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
