//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - selected from the command line (`clap::ValueEnum`)
//! - used in-memory during fitting
//! - exported to JSON/CSV for downstream plotting

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Named curve family relating a predictor (entropy, perplexity, ...) to WER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Power law `y = c * x^k`.
    Boothroyd,
    /// Same family as Boothroyd, fit with an intercept by default.
    Klakow,
    /// Saturating exponential `y = 1 / (exp(-(x+B)/C) + A)`.
    Zhang,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Boothroyd => "Boothroyd",
            ModelKind::Klakow => "Klakow",
            ModelKind::Zhang => "Zhang",
        }
    }

    /// Whether the structured fit includes a global intercept unless told otherwise.
    pub fn default_intercept(self) -> bool {
        matches!(self, ModelKind::Klakow)
    }
}

/// Domain in which squared residuals are minimised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitDomain {
    Direct,
    /// Residuals of `log(y)`; error rates span orders of magnitude.
    Log,
}

/// How the structured (per-bin) power-law fit is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StructuredMode {
    /// Closed-form OLS of `log(y)` on the design matrix.
    LogLinear,
    /// Nonlinear refinement of `y = exp(X w)` seeded by the log-linear solution.
    Exponential,
}

/// Within-direction regression used by the Type-II engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WithinMethod {
    /// Ordinary least squares.
    Ols,
    /// Weighted least squares with caller-supplied weights.
    Wls,
    /// Huber M-estimator via IRLS.
    Rlm,
}

/// How the two directional regressions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CombineMethod {
    ReducedMajorAxis,
    MajorAxis,
    ArithmeticMean,
}

impl CombineMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            CombineMethod::ReducedMajorAxis => "reduced major axis",
            CombineMethod::MajorAxis => "major axis",
            CombineMethod::ArithmeticMean => "arithmetic mean",
        }
    }
}

/// Fit quality diagnostics, measured in the fit domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
}

impl FitQuality {
    pub fn from_residuals(residuals: &[f64]) -> Self {
        let n = residuals.len();
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let rmse = if n > 0 { (sse / n as f64).sqrt() } else { f64::NAN };
        Self { sse, rmse, n }
    }
}

/// Bootstrap summary for a single coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub std_err: f64,
    pub bias: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

/// One reported coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    pub name: String,
    pub estimate: f64,
    #[serde(flatten)]
    pub uncertainty: Option<Uncertainty>,
}

/// One record per fitted coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub title: String,
    pub coefficients: Vec<CoefficientEstimate>,
    pub quality: Option<FitQuality>,
    /// Confidence level of the intervals, when a bootstrap ran.
    pub level: Option<f64>,
    pub replicates: Option<usize>,
}

impl FitReport {
    /// A report with point estimates only.
    pub fn point_estimates(title: impl Into<String>, names: &[String], estimates: &[f64]) -> Self {
        Self {
            title: title.into(),
            coefficients: names
                .iter()
                .zip(estimates)
                .map(|(name, &estimate)| CoefficientEstimate {
                    name: name.clone(),
                    estimate,
                    uncertainty: None,
                })
                .collect(),
            quality: None,
            level: None,
            replicates: None,
        }
    }

    pub fn coefficient(&self, name: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}
