//! Quantile / rank binning of a numeric series into ordered labelled intervals.
//!
//! Steps:
//! 1. optionally trim to the closed `[q_lower, q_upper]` quantile range
//! 2. optionally replace values by their rank `1..n` (ties broken by position),
//!    which yields approximately equal-count bins
//! 3. cut the (possibly ranked) values into equal-width intervals over their
//!    range, or into caller-supplied boundaries
//! 4. compute display bounds from the raw values that landed in each bin
//!
//! Intervals are right-closed `(lo, hi]`; the first interval also includes its
//! lower edge. Display bounds are labels only and are never used to re-bin.
//! Labels must be distinct: ties spread over several rank bins can give two
//! bins the same raw bounds, and that is reported as an error.

use crate::error::{AppError, ensure_finite};
use crate::math::stats::{quantile, sort_floats};

/// How the cut edges are chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum BinEdges {
    /// Equal-width intervals over the range of the binned values.
    Count(usize),
    /// Explicit, strictly increasing edges in the binned space (ranks when
    /// `by_rank` is set, raw values otherwise).
    Boundaries(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinOptions {
    pub edges: BinEdges,
    pub by_rank: bool,
    pub lower_quantile: Option<f64>,
    pub upper_quantile: Option<f64>,
    /// Digits after the decimal point in labels; `None` prints the shortest form.
    pub precision: Option<usize>,
}

impl BinOptions {
    pub fn count(bins: usize) -> Self {
        Self {
            edges: BinEdges::Count(bins),
            by_rank: false,
            lower_quantile: None,
            upper_quantile: None,
            precision: None,
        }
    }
}

/// Display information for one bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinAssignment {
    /// Bin index per input element; `None` for elements removed by trimming.
    pub assignments: Vec<Option<usize>>,
    /// Cut edges in the binned space, strictly increasing, `bins.len() + 1` long.
    pub edges: Vec<f64>,
    pub bins: Vec<Bin>,
}

impl BinAssignment {
    /// Label per input element.
    pub fn labels(&self) -> Vec<Option<&str>> {
        self.assignments
            .iter()
            .map(|a| a.map(|i| self.bins[i].label.as_str()))
            .collect()
    }

    /// Ordered label domain.
    pub fn levels(&self) -> Vec<String> {
        self.bins.iter().map(|b| b.label.clone()).collect()
    }
}

fn format_bound(v: f64, precision: Option<usize>) -> String {
    match precision {
        Some(p) => format!("{v:.p$}"),
        None => format!("{v}"),
    }
}

fn validate_fraction(name: &str, q: f64) -> Result<f64, AppError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(AppError::config(format!("{name} quantile {q} is outside [0, 1]")));
    }
    Ok(q)
}

/// Ranks `1..n` of `values`, ties broken by position.
fn ordinal_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut ranks = vec![0.0; values.len()];
    for (r, &i) in order.iter().enumerate() {
        ranks[i] = (r + 1) as f64;
    }
    ranks
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sort_floats(&mut sorted);
    sorted.dedup();
    sorted.len()
}

fn equal_width_edges(space: &[f64], k: usize) -> Result<Vec<f64>, AppError> {
    let lo = space.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = space.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let edges = if lo == hi {
        let adj = if lo == 0.0 { 1e-3 } else { 1e-3 * lo.abs() };
        vec![lo - adj, hi + adj]
    } else {
        let width = (hi - lo) / k as f64;
        let mut edges: Vec<f64> = (0..k).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        edges
    };
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(AppError::numerical(format!(
            "range [{lo}, {hi}] is too narrow for {k} distinct equal-width edges"
        )));
    }
    Ok(edges)
}

/// Assign every value of `series` to a bin.
pub fn bin_series(series: &[f64], opts: &BinOptions) -> Result<BinAssignment, AppError> {
    if series.is_empty() {
        return Err(AppError::invalid("cannot bin an empty series"));
    }
    ensure_finite("series", series)?;

    let q_lo = validate_fraction("lower", opts.lower_quantile.unwrap_or(0.0))?;
    let q_hi = validate_fraction("upper", opts.upper_quantile.unwrap_or(1.0))?;
    if q_lo > q_hi {
        return Err(AppError::config(format!(
            "lower quantile {q_lo} exceeds upper quantile {q_hi}"
        )));
    }
    let lo_cut = quantile(series, q_lo);
    let hi_cut = quantile(series, q_hi);

    let retained: Vec<usize> = (0..series.len())
        .filter(|&i| series[i] >= lo_cut && series[i] <= hi_cut)
        .collect();
    let raw: Vec<f64> = retained.iter().map(|&i| series[i]).collect();
    let space = if opts.by_rank { ordinal_ranks(&raw) } else { raw.clone() };

    let distinct = distinct_count(&raw);
    let edges = match &opts.edges {
        BinEdges::Count(k) => {
            if *k == 0 {
                return Err(AppError::config("bin count must be at least 1"));
            }
            if *k > distinct {
                return Err(AppError::invalid(format!(
                    "{k} bins requested but only {distinct} distinct values remain"
                )));
            }
            equal_width_edges(&space, *k)?
        }
        BinEdges::Boundaries(b) => {
            if b.len() < 2 {
                return Err(AppError::config("explicit boundaries need at least 2 edges"));
            }
            ensure_finite("boundaries", b)?;
            if b.windows(2).any(|w| w[1] <= w[0]) {
                return Err(AppError::config("explicit boundaries must be strictly increasing"));
            }
            if b.len() - 1 > distinct {
                return Err(AppError::invalid(format!(
                    "{} bins requested but only {distinct} distinct values remain",
                    b.len() - 1
                )));
            }
            let (first, last) = (b[0], b[b.len() - 1]);
            if let Some(v) = space.iter().find(|&&v| v < first || v > last) {
                return Err(AppError::invalid(format!(
                    "value {v} lies outside the boundaries [{first}, {last}]"
                )));
            }
            b.clone()
        }
    };
    let k = edges.len() - 1;
    let interior = &edges[1..k];

    let mut assignments = vec![None; series.len()];
    let mut members: Vec<Vec<f64>> = vec![Vec::new(); k];
    for (j, &i) in retained.iter().enumerate() {
        let bin = interior.partition_point(|&e| e < space[j]);
        assignments[i] = Some(bin);
        members[bin].push(raw[j]);
    }

    let global_min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let global_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bins = members
        .iter()
        .enumerate()
        .map(|(b, m)| {
            let (mut lower, mut upper) = if m.is_empty() {
                (edges[b], edges[b + 1])
            } else {
                (
                    m.iter().copied().fold(f64::INFINITY, f64::min),
                    m.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                )
            };
            if b == 0 {
                lower = global_min;
            }
            if b == k - 1 {
                upper = global_max;
            }
            let label = format!(
                "({},{}]",
                format_bound(lower, opts.precision),
                format_bound(upper, opts.precision)
            );
            Bin {
                lower,
                upper,
                label,
                count: m.len(),
            }
        })
        .collect::<Vec<Bin>>();

    // Labels are the categorical domain downstream, so they must be distinct.
    for (i, bin) in bins.iter().enumerate() {
        if let Some(j) = bins[..i].iter().position(|b| b.label == bin.label) {
            return Err(AppError::invalid(format!(
                "bins {} and {} would both be labelled {}; use fewer bins or a higher label precision",
                j + 1,
                i + 1,
                bin.label
            )));
        }
    }

    Ok(BinAssignment {
        assignments,
        edges,
        bins,
    })
}
