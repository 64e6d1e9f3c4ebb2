//! Component selection by regional goodness.
//!
//! The grid is split into `regions × regions` blocks. A component's
//! goodness is the mean within-block variance of its weight values divided
//! by its overall variance: low values mean the component changes between
//! regions rather than inside them. Lower is better.

use crate::algo::stats;
use crate::error::{Error, Result};
use crate::som::Som;
use std::fmt;

/// Which component lines survive selection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Selection {
    /// Keep every component.
    #[default]
    All,
    /// Keep the `n` best components.
    TargetCount(usize),
    /// Keep components whose goodness is at most this fraction of the worst.
    Threshold(f64),
}

impl Selection {
    /// Reject counts of zero and thresholds outside `(0, 1]`.
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::TargetCount(0) => Err(Error::InvalidMode(
                "selection target count must be positive".to_string(),
            )),
            Self::Threshold(t) if !(t > 0.0 && t <= 1.0) => Err(Error::InvalidMode(format!(
                "selection threshold {t} is outside (0, 1]"
            ))),
            other => Ok(other),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::TargetCount(n) => write!(f, "count={n}"),
            Self::Threshold(t) => write!(f, "threshold={t}"),
        }
    }
}

/// Goodness of every weight component for a `regions × regions` split.
#[must_use]
pub fn component_goodness(som: &Som, regions: usize) -> Vec<f64> {
    let regions = regions.max(1);
    let block = |v: usize, size: usize| (v * regions / size).min(regions - 1);
    (0..som.dim())
        .map(|c| {
            let all: Vec<f64> = (0..som.unit_count()).map(|u| som.weight_at(u)[c]).collect();
            let total = stats::variance(&all);
            if total.is_nan() || total <= 0.0 {
                return 0.0;
            }
            let mut blocks = vec![Vec::new(); regions * regions];
            for u in 0..som.unit_count() {
                let (x, y) = som.coords(u);
                blocks[block(y, som.y_size()) * regions + block(x, som.x_size())].push(all[u]);
            }
            let within: Vec<f64> = blocks
                .iter()
                .filter(|b| !b.is_empty())
                .map(|b| stats::variance(b))
                .collect();
            stats::mean(&within) / total
        })
        .collect()
}

/// Indices of the selected components, in component order.
pub fn select_components(goodness: &[f64], selection: Selection) -> Result<Vec<usize>> {
    match selection.validate()? {
        Selection::All => Ok((0..goodness.len()).collect()),
        Selection::TargetCount(n) => {
            let mut ranked: Vec<usize> = (0..goodness.len()).collect();
            ranked.sort_by(|&a, &b| goodness[a].total_cmp(&goodness[b]).then(a.cmp(&b)));
            ranked.truncate(n);
            ranked.sort_unstable();
            Ok(ranked)
        }
        Selection::Threshold(t) => {
            let worst = goodness.iter().copied().fold(0.0, f64::max);
            Ok((0..goodness.len())
                .filter(|&c| goodness[c] <= t * worst)
                .collect())
        }
    }
}
