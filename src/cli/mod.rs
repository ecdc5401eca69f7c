//! Command-line parsing for the WER curve fitter.
//!
//! Argument parsing and command dispatch stay separate from the modeling and
//! math code: every subcommand's arguments convert into the plain option
//! structs the library consumes.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::{BinEdges, BinOptions};
use crate::domain::{CombineMethod, FitDomain, ModelKind, StructuredMode, WithinMethod};
use crate::fit::BootstrapOptions;
use crate::math::LmOptions;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "wercurve", version, about = "WER-vs-predictor curve fitting with bootstrap inference")]
pub struct Cli {
    /// Log solver and bootstrap progress to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one curve family to two numeric columns.
    Fit(FitArgs),
    /// Fit one power-law exponent per predictor bin.
    Structured(StructuredArgs),
    /// Bin a numeric column and print (or export) the labelled table.
    Bin(BinArgs),
    /// Length-weighted group means.
    Aggregate(AggregateArgs),
    /// Errors-in-both-variables linear regression.
    Type2(Type2Args),
}

/// Wild-bootstrap options shared by the fitting subcommands.
#[derive(Debug, Args, Clone)]
pub struct BootstrapArgs {
    /// Number of bootstrap replicates (0 disables the bootstrap).
    #[arg(long, default_value_t = 0)]
    pub bootstrap: usize,

    /// Two-sided confidence level of the intervals.
    #[arg(long, default_value_t = 0.95)]
    pub level: f64,

    /// Base seed for the replicate RNGs.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl BootstrapArgs {
    pub fn options(&self) -> Option<BootstrapOptions> {
        (self.bootstrap > 0).then_some(BootstrapOptions {
            replicates: self.bootstrap,
            level: self.level,
            seed: self.seed,
        })
    }
}

/// Levenberg–Marquardt limits.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    #[arg(long, default_value_t = 500)]
    pub max_iter: usize,

    /// Relative cost / step / gradient tolerance.
    #[arg(long, default_value_t = 1e-12)]
    pub tol: f64,
}

impl SolverArgs {
    pub fn options(&self) -> LmOptions {
        LmOptions {
            max_iter: self.max_iter,
            ftol: self.tol,
            xtol: self.tol,
            gtol: self.tol,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Input CSV.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Predictor column (entropy, perplexity, ...).
    #[arg(short = 'x', long, default_value = "entropy")]
    pub x: String,

    /// Error-rate column.
    #[arg(short = 'y', long, default_value = "wer")]
    pub y: String,

    #[arg(short, long, value_enum, default_value_t = ModelKind::Boothroyd)]
    pub model: ModelKind,

    #[arg(long, value_enum, default_value_t = FitDomain::Log)]
    pub domain: FitDomain,

    /// Initial parameters, comma separated (model order).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub init: Option<Vec<f64>>,

    /// Spline-resample onto this many evenly spaced points before fitting.
    #[arg(long)]
    pub resample: Option<usize>,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    /// Export the fit report (CSV, or JSON by extension).
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct StructuredArgs {
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Boothroyd or Klakow; selects the intercept default.
    #[arg(short, long, value_enum, default_value_t = ModelKind::Boothroyd)]
    pub model: ModelKind,

    #[arg(long, default_value = "wer")]
    pub outcome: String,

    #[arg(long, default_value = "entropy")]
    pub predictor: String,

    /// Existing categorical bin column. Without it the predictor is binned
    /// with `--bins` into a column named `<predictor>_bin`.
    #[arg(long)]
    pub bin: Option<String>,

    /// Bin count used when `--bin` is absent.
    #[arg(long, default_value_t = 4)]
    pub bins: usize,

    /// Bin on ranks (approximately equal-count bins).
    #[arg(long)]
    pub by_rank: bool,

    /// Signal-quality column encoded as indicators.
    #[arg(long)]
    pub quality: Option<String>,

    /// Declared bin levels, comma separated, in order.
    #[arg(long, value_delimiter = ',')]
    pub levels: Option<Vec<String>>,

    #[arg(long, conflicts_with = "no_intercept")]
    pub intercept: bool,

    #[arg(long)]
    pub no_intercept: bool,

    #[arg(long, value_enum, default_value_t = StructuredMode::LogLinear)]
    pub mode: StructuredMode,

    #[command(flatten)]
    pub solver: SolverArgs,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl StructuredArgs {
    pub fn intercept_override(&self) -> Option<bool> {
        match (self.intercept, self.no_intercept) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct BinArgs {
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Numeric column to bin.
    #[arg(short, long)]
    pub column: String,

    /// Equal-width bin count.
    #[arg(long, default_value_t = 4, conflicts_with = "boundaries")]
    pub bins: usize,

    /// Explicit edges, comma separated (rank space with `--by-rank`).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub boundaries: Option<Vec<f64>>,

    #[arg(long)]
    pub by_rank: bool,

    #[arg(long)]
    pub lower_quantile: Option<f64>,

    #[arg(long)]
    pub upper_quantile: Option<f64>,

    /// Digits after the decimal point in labels.
    #[arg(long)]
    pub precision: Option<usize>,

    /// Name of the label column; defaults to `<column>_bin`.
    #[arg(long)]
    pub label_column: Option<String>,

    /// Export the labelled table (CSV, or JSON by extension).
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl BinArgs {
    pub fn options(&self) -> BinOptions {
        BinOptions {
            edges: match &self.boundaries {
                Some(b) => BinEdges::Boundaries(b.clone()),
                None => BinEdges::Count(self.bins),
            },
            by_rank: self.by_rank,
            lower_quantile: self.lower_quantile,
            upper_quantile: self.upper_quantile,
            precision: self.precision,
        }
    }

    pub fn label_column(&self) -> String {
        self.label_column
            .clone()
            .unwrap_or_else(|| format!("{}_bin", self.column))
    }
}

#[derive(Debug, Args, Clone)]
pub struct AggregateArgs {
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Weight column (e.g. reference length).
    #[arg(short, long, default_value = "length")]
    pub weight: String,

    /// Value columns, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub values: Vec<String>,

    /// Grouping key columns, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub keys: Vec<String>,

    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct Type2Args {
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[arg(short = 'x', long)]
    pub x: String,

    #[arg(short = 'y', long)]
    pub y: String,

    #[arg(long, value_enum, default_value_t = WithinMethod::Ols)]
    pub within: WithinMethod,

    #[arg(long, value_enum, default_value_t = CombineMethod::ReducedMajorAxis)]
    pub combine: CombineMethod,

    #[arg(long)]
    pub no_intercept: bool,

    /// Weight column for the y-on-x regression (WLS).
    #[arg(long)]
    pub weights_y: Option<String>,

    /// Weight column for the x-on-y regression (WLS); defaults to `--weights-y`.
    #[arg(long)]
    pub weights_x: Option<String>,

    /// Export the result as JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_args_parse_negative_init() {
        let cli = Cli::parse_from([
            "wercurve", "fit", "-i", "a.csv", "--init", "-1,1", "--bootstrap", "100",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.init, Some(vec![-1.0, 1.0]));
        assert_eq!(args.bootstrap.options().unwrap().replicates, 100);
    }

    #[test]
    fn bootstrap_is_off_by_default() {
        let cli = Cli::parse_from(["wercurve", "fit", "-i", "a.csv"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.bootstrap.options().is_none());
    }

    #[test]
    fn structured_intercept_flags() {
        let cli = Cli::parse_from(["wercurve", "structured", "-i", "a.csv", "--no-intercept"]);
        let Command::Structured(args) = cli.command else {
            panic!("expected structured");
        };
        assert_eq!(args.intercept_override(), Some(false));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
