//! Pareto radius search.
//!
//! The Pareto radius is the distance percentile at which a hypersphere
//! around a typical data point holds about 20.13% of the data (Ultsch's
//! information-optimal set size). The search starts at the 18th percentile
//! and rescales the percentile by `target / observed` until the step drops
//! to one percentile or a bound is hit.

use crate::algo::stats;
use crate::error::{Error, Result};
use crate::som::inputs::DistanceMatrix;
use log::{debug, info};

/// Fraction of the data a Pareto sphere should contain.
pub const PARETO_TARGET: f64 = 0.2013;
/// Initial distance percentile.
pub const START_PERCENTILE: f64 = 18.0;
/// Smallest percentile considered.
pub const MIN_PERCENTILE: f64 = 2.0;
/// Largest percentile considered.
pub const MAX_PERCENTILE: f64 = 50.0;
/// Iteration cap.
pub const MAX_ITERATIONS: usize = 10;

/// Result of a radius search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParetoRadius {
    /// Selected distance percentile.
    pub percentile: f64,
    /// Distance at that percentile.
    pub radius: f64,
    /// Median fraction of points inside the sphere at that radius.
    pub fraction: f64,
    /// Number of candidate percentiles evaluated.
    pub iterations: usize,
}

/// Median over all points of the fraction of points within `radius`.
#[must_use]
pub fn sphere_fraction(dist: &DistanceMatrix, radius: f64) -> f64 {
    let n = dist.len();
    let fractions: Vec<f64> = (0..n)
        .map(|i| dist.row(i).iter().filter(|&&d| d <= radius).count() as f64 / n as f64)
        .collect();
    stats::median(&fractions)
}

/// Search the Pareto radius of the points described by `dist`.
///
/// # Errors
///
/// Returns [`Error::EmptyData`] when fewer than two points are given.
pub fn pareto_radius(dist: &DistanceMatrix) -> Result<ParetoRadius> {
    let n = dist.len();
    if n < 2 {
        return Err(Error::EmptyData);
    }
    let mut pairwise = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        pairwise.extend_from_slice(&dist.row(i)[i + 1..]);
    }
    let sorted = stats::sorted(&pairwise);

    let evaluate = |pct: f64| {
        let radius = stats::percentile_sorted(&sorted, pct);
        (radius, sphere_fraction(dist, radius))
    };

    let mut pct = START_PERCENTILE;
    let (mut radius, mut fraction) = evaluate(pct);
    let mut iterations = 1;
    let mut previous: Option<(f64, f64, f64)> = None;

    while iterations < MAX_ITERATIONS {
        let next = if fraction > 0.0 {
            (pct * PARETO_TARGET / fraction)
                .round()
                .clamp(MIN_PERCENTILE, MAX_PERCENTILE)
        } else {
            (pct * 2.0).clamp(MIN_PERCENTILE, MAX_PERCENTILE)
        };
        debug!("pareto search: percentile {pct} gives fraction {fraction:.4}, next {next}");
        if (next - pct).abs() <= 1.0 {
            break;
        }
        previous = Some((pct, radius, fraction));
        pct = next;
        (radius, fraction) = evaluate(pct);
        iterations += 1;
        if pct <= MIN_PERCENTILE || pct >= MAX_PERCENTILE {
            break;
        }
    }

    // Keep whichever of the last two candidates lies closer to the target.
    if let Some((p, r, f)) = previous {
        if (f - PARETO_TARGET).abs() < (fraction - PARETO_TARGET).abs() {
            pct = p;
            radius = r;
            fraction = f;
        }
    }

    info!("pareto radius {radius:.4} at percentile {pct} ({iterations} iterations, fraction {fraction:.4})");
    Ok(ParetoRadius {
        percentile: pct,
        radius,
        fraction,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::inputs::InputData;
    use crate::som::metric::Metric;

    fn line_points(n: usize) -> DistanceMatrix {
        let data = InputData::new(1, (0..n).map(|i| i as f64).collect(), None).unwrap();
        DistanceMatrix::compute(&data, Metric::Euclidean).unwrap()
    }

    fn lcg_points(n: usize, dim: usize, seed: u64) -> DistanceMatrix {
        let mut s = seed;
        let data: Vec<f64> = (0..n * dim)
            .map(|_| {
                s = s.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                (s >> 33) as f64 / (1u64 << 31) as f64
            })
            .collect();
        let data = InputData::new(dim, data, None).unwrap();
        DistanceMatrix::compute(&data, Metric::Euclidean).unwrap()
    }

    #[test]
    fn test_radius_within_bounds_and_iteration_cap() {
        for dm in [line_points(60), lcg_points(80, 3, 7), lcg_points(50, 8, 99)] {
            let r = pareto_radius(&dm).unwrap();
            assert!((MIN_PERCENTILE..=MAX_PERCENTILE).contains(&r.percentile));
            assert!(r.iterations <= 10);
            assert!(r.radius > 0.0);
        }
    }

    #[test]
    fn test_fraction_near_target_on_uniform_line() {
        let r = pareto_radius(&line_points(200)).unwrap();
        assert!((r.fraction - PARETO_TARGET).abs() < 0.05, "fraction {}", r.fraction);
    }

    #[test]
    fn test_requires_two_points() {
        let dm = DistanceMatrix::new(1, vec![0.0]).unwrap();
        assert!(pareto_radius(&dm).is_err());
    }

    #[test]
    fn test_sphere_fraction_monotone() {
        let dm = line_points(20);
        assert!(sphere_fraction(&dm, 1.0) <= sphere_fraction(&dm, 5.0));
        assert!((sphere_fraction(&dm, 100.0) - 1.0).abs() < f64::EPSILON);
    }
}
