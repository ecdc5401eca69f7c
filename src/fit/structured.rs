//! Structured Boothroyd fit: one power-law exponent per predictor bin.
//!
//! The model is
//!
//! ```text
//! log y = [Intercept] + [quality indicators] + Σ_b 1{bin = b} · k_b · log x
//! ```
//!
//! so each bin gets its own exponent `k_b` while sharing the intercept and
//! quality offsets. Two solve modes:
//! - log-linear: OLS of `log y` on the design
//! - exponential: LM on `y - exp(X w)`, seeded with the log-linear solution

use nalgebra::DMatrix;

use crate::domain::{FitQuality, FitReport, ModelKind, StructuredMode, Table};
use crate::error::AppError;
use crate::fit::bootstrap::Refit;
use crate::fit::design::{DesignBuilder, DesignMatrix, levels_in_order};
use crate::math::{Bounds, LmOptions, levenberg_marquardt, ols};

#[derive(Debug, Clone)]
pub struct StructuredFitOptions {
    pub outcome: String,
    pub predictor: String,
    pub bin: String,
    /// Optional signal-quality column, encoded as indicators.
    pub quality: Option<String>,
    /// Ordered bin domain; first appearance in the table when absent.
    pub bin_levels: Option<Vec<String>>,
    pub intercept: bool,
    pub mode: StructuredMode,
    pub lm: LmOptions,
}

impl StructuredFitOptions {
    /// Defaults for a power-law model; the intercept follows the model convention.
    pub fn for_model(
        model: ModelKind,
        outcome: &str,
        predictor: &str,
        bin: &str,
    ) -> Result<Self, AppError> {
        if model == ModelKind::Zhang {
            return Err(AppError::config(
                "structured fits are defined for power-law models only",
            ));
        }
        Ok(Self {
            outcome: outcome.to_string(),
            predictor: predictor.to_string(),
            bin: bin.to_string(),
            quality: None,
            bin_levels: None,
            intercept: model.default_intercept(),
            mode: StructuredMode::LogLinear,
            lm: LmOptions::default(),
        })
    }
}

/// Estimated exponent for one bin level.
#[derive(Debug, Clone, PartialEq)]
pub struct BinExponent {
    pub level: String,
    pub k: f64,
}

#[derive(Debug, Clone)]
pub struct StructuredFit {
    pub mode: StructuredMode,
    pub design: DesignMatrix,
    pub params: Vec<f64>,
    pub exponents: Vec<BinExponent>,
    pub quality: FitQuality,
    /// Fit-domain outcome (`log y` or `y`).
    pub target: Vec<f64>,
}

impl StructuredFit {
    pub fn missing_levels(&self) -> &[String] {
        &self.design.missing_levels
    }

    pub fn report(&self) -> FitReport {
        let title = match self.mode {
            StructuredMode::LogLinear => "structured Boothroyd (log-linear)",
            StructuredMode::Exponential => "structured Boothroyd (exponential)",
        };
        let mut report = FitReport::point_estimates(title, &self.design.names, &self.params);
        report.quality = Some(self.quality);
        report
    }

    pub fn estimator(&self, lm: LmOptions) -> DesignEstimator {
        DesignEstimator {
            matrix: self.design.matrix.clone(),
            mode: self.mode,
            lm,
        }
    }
}

/// A fixed design matrix with its solve mode.
#[derive(Debug, Clone)]
pub struct DesignEstimator {
    matrix: DMatrix<f64>,
    mode: StructuredMode,
    lm: LmOptions,
}

impl DesignEstimator {
    fn linear_predictor(&self, params: &[f64]) -> Vec<f64> {
        (0..self.matrix.nrows())
            .map(|i| {
                self.matrix
                    .row(i)
                    .iter()
                    .zip(params)
                    .map(|(x, w)| x * w)
                    .sum()
            })
            .collect()
    }
}

impl Refit for DesignEstimator {
    fn predict(&self, params: &[f64]) -> Vec<f64> {
        let eta = self.linear_predictor(params);
        match self.mode {
            StructuredMode::LogLinear => eta,
            StructuredMode::Exponential => eta.into_iter().map(f64::exp).collect(),
        }
    }

    fn refit(&self, target: &[f64], init: &[f64]) -> Result<Vec<f64>, AppError> {
        match self.mode {
            StructuredMode::LogLinear => ols(&self.matrix, target),
            StructuredMode::Exponential => {
                let res = levenberg_marquardt(
                    |w| {
                        self.predict(w)
                            .iter()
                            .zip(target)
                            .map(|(f, y)| y - f)
                            .collect()
                    },
                    init,
                    &Bounds::unbounded(init.len()),
                    &self.lm,
                )?;
                Ok(res.params)
            }
        }
    }
}

fn require_positive(name: &str, values: &[f64]) -> Result<(), AppError> {
    if let Some(i) = values.iter().position(|v| !v.is_finite() || *v <= 0.0) {
        return Err(AppError::invalid(format!(
            "column '{name}' must be positive and finite (row {i}: {})",
            values[i]
        )));
    }
    Ok(())
}

/// Fit per-bin exponents from `table`.
pub fn fit_structured(table: &Table, opts: &StructuredFitOptions) -> Result<StructuredFit, AppError> {
    let y = table.numeric_column(&opts.outcome)?;
    let x = table.numeric_column(&opts.predictor)?;
    let bins = table.category_column(&opts.bin)?;
    require_positive(&opts.outcome, &y)?;
    require_positive(&opts.predictor, &x)?;

    let log_x: Vec<f64> = x.iter().map(|v| v.ln()).collect();
    let log_y: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let levels = match &opts.bin_levels {
        Some(l) => l.clone(),
        None => levels_in_order(&bins),
    };

    let mut builder = DesignBuilder::new(table.len()).intercept(opts.intercept);
    if let Some(q) = &opts.quality {
        let quality = table.category_column(q)?;
        builder = builder.indicators(q, &quality, None)?;
    }
    let label = format!("log({})", opts.predictor);
    let design = builder
        .interaction(&opts.bin, &bins, Some(&levels), &label, &log_x)?
        .build()?;

    let observed: Vec<(String, usize)> = levels
        .iter()
        .filter_map(|l| {
            design
                .column_index(&format!("{}[{l}]:{label}", opts.bin))
                .map(|j| (l.clone(), j))
        })
        .collect();
    if observed.is_empty() {
        return Err(AppError::invalid(format!(
            "no observed levels in bin column '{}'",
            opts.bin
        )));
    }

    let mut estimator = DesignEstimator {
        matrix: design.matrix.clone(),
        mode: StructuredMode::LogLinear,
        lm: opts.lm,
    };
    let mut params = ols(&design.matrix, &log_y)?;
    let target = match opts.mode {
        StructuredMode::LogLinear => log_y,
        StructuredMode::Exponential => {
            estimator.mode = StructuredMode::Exponential;
            params = estimator.refit(&y, &params)?;
            y
        }
    };

    let fitted = estimator.predict(&params);
    let residuals: Vec<f64> = target.iter().zip(&fitted).map(|(t, f)| t - f).collect();
    let exponents = observed
        .into_iter()
        .map(|(level, j)| BinExponent { level, k: params[j] })
        .collect();

    tracing::debug!(
        columns = design.ncols(),
        rows = table.len(),
        mode = ?opts.mode,
        "structured fit complete"
    );

    Ok(StructuredFit {
        mode: opts.mode,
        quality: FitQuality::from_residuals(&residuals),
        design,
        params,
        exponents,
        target,
    })
}
