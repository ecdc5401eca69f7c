//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs the log subscriber
//! - reads the input table
//! - runs one analysis per subcommand (plus the optional bootstrap)
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AggregateArgs, BinArgs, Cli, Command, FitArgs, StructuredArgs, Type2Args};
use crate::data::{AggregateSpec, BinOptions, bin_series, weighted_group_means};
use crate::domain::{Table, Value};
use crate::error::AppError;
use crate::fit::{
    CurveFitOptions, StructuredFitOptions, Type2Strategy, fit_curve, fit_structured, wild_bootstrap,
};
use crate::io::{read_table_csv, write_json, write_report, write_table};
use crate::report::{format_bins, format_fit_report, format_structured, format_table, format_type2};

const PREVIEW_ROWS: usize = 50;

/// Entry point for the `wercurve` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Structured(args) => handle_structured(args),
        Command::Bin(args) => handle_bin(args),
        Command::Aggregate(args) => handle_aggregate(args),
        Command::Type2(args) => handle_type2(args),
    }
}

/// Stderr subscriber; `RUST_LOG` wins over the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let table = read_table_csv(&args.input)?;
    let x = table.numeric_column(&args.x)?;
    let y = table.numeric_column(&args.y)?;

    let opts = CurveFitOptions {
        domain: args.domain,
        init: args.init.clone(),
        resample: args.resample,
        lm: args.solver.options(),
    };
    let fit = fit_curve(args.model, &x, &y, &opts)?;
    let mut report = fit.report();

    if let Some(boot) = args.bootstrap.options() {
        let summary = wild_bootstrap(&fit.estimator(opts.lm), &fit.params, &fit.target, &boot)?;
        summary.attach_to(&mut report);
    }

    println!("{}", format_fit_report(&report));
    if let Some(path) = &args.export {
        write_report(path, &report)?;
    }
    Ok(())
}

fn handle_structured(args: StructuredArgs) -> Result<(), AppError> {
    let mut table = read_table_csv(&args.input)?;

    let (bin_column, bin_levels) = match &args.bin {
        Some(col) => (col.clone(), args.levels.clone()),
        None => {
            let col = format!("{}_bin", args.predictor);
            let opts = BinOptions {
                by_rank: args.by_rank,
                ..BinOptions::count(args.bins)
            };
            let (labelled, levels) = label_bins(&table, &args.predictor, &col, &opts)?;
            table = labelled.drop_missing(&col);
            (col, Some(args.levels.clone().unwrap_or(levels)))
        }
    };

    let mut opts = StructuredFitOptions::for_model(args.model, &args.outcome, &args.predictor, &bin_column)?;
    opts.quality = args.quality.clone();
    opts.bin_levels = bin_levels;
    opts.mode = args.mode;
    opts.lm = args.solver.options();
    if let Some(intercept) = args.intercept_override() {
        opts.intercept = intercept;
    }

    let fit = fit_structured(&table, &opts)?;
    let mut report = fit.report();
    if let Some(boot) = args.bootstrap.options() {
        let summary = wild_bootstrap(&fit.estimator(opts.lm), &fit.params, &fit.target, &boot)?;
        summary.attach_to(&mut report);
    }

    println!("{}", format_structured(&fit, &report));
    if let Some(path) = &args.export {
        write_report(path, &report)?;
    }
    Ok(())
}

/// Bin `column` into a new label column; returns the table and ordered levels.
fn label_bins(
    table: &Table,
    column: &str,
    label_column: &str,
    opts: &BinOptions,
) -> Result<(Table, Vec<String>), AppError> {
    let series = table.numeric_column(column)?;
    let bins = bin_series(&series, opts)?;
    let labels = bins
        .labels()
        .into_iter()
        .map(|l| l.map(Value::from))
        .collect();
    Ok((table.with_column(label_column, labels)?, bins.levels()))
}

fn handle_bin(args: BinArgs) -> Result<(), AppError> {
    let table = read_table_csv(&args.input)?;
    let series = table.numeric_column(&args.column)?;
    let bins = bin_series(&series, &args.options())?;
    println!("{}", format_bins(&bins));

    if let Some(path) = &args.export {
        let labels = bins
            .labels()
            .into_iter()
            .map(|l| l.map(Value::from))
            .collect();
        let labelled = table.with_column(&args.label_column(), labels)?;
        write_table(path, &labelled)?;
    }
    Ok(())
}

fn handle_aggregate(args: AggregateArgs) -> Result<(), AppError> {
    let table = read_table_csv(&args.input)?;
    let spec = AggregateSpec {
        weight: args.weight.clone(),
        values: args.values.clone(),
        keys: args.keys.clone(),
    };
    let out = weighted_group_means(&table, &spec)?;
    println!("{}", format_table(&out, PREVIEW_ROWS));
    if let Some(path) = &args.export {
        write_table(path, &out)?;
    }
    Ok(())
}

fn handle_type2(args: Type2Args) -> Result<(), AppError> {
    let table = read_table_csv(&args.input)?;
    let x = table.numeric_column(&args.x)?;
    let y = table.numeric_column(&args.y)?;

    let mut strategy = Type2Strategy::new(args.within, args.combine, !args.no_intercept)?;
    if let Some(wy) = &args.weights_y {
        let w_yx = table.numeric_column(wy)?;
        let w_xy = match &args.weights_x {
            Some(wx) => table.numeric_column(wx)?,
            None => w_yx.clone(),
        };
        strategy = strategy.with_weights(w_yx, w_xy);
    }

    let res = strategy.fit(&x, &y)?;
    println!("{}", format_type2(&res));
    if let Some(path) = &args.export {
        write_json(path, &res)?;
    }
    Ok(())
}
