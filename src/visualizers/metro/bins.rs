//! Component lines from binned weight values.
//!
//! The values of one weight component over all units are split into
//! `bins` equal-width bins; the centroid of the units in each bin, in grid
//! coordinates, is that bin's centre. Empty bins are filled by linear
//! interpolation between the closest non-empty bins, or copy the nearest
//! one at either end.

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::som::Som;

/// Polyline through the bin centres of one or more components.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentLine {
    /// Weight components the line stands for.
    pub components: Vec<usize>,
    /// Bin centres in grid coordinates, lowest bin first.
    pub points: Vec<Point>,
}

impl ComponentLine {
    /// Line of a single component.
    #[must_use]
    pub fn new(component: usize, points: Vec<Point>) -> Self {
        Self {
            components: vec![component],
            points,
        }
    }

    /// Number of bin centres.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True without points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Centre of every bin of `component`, `None` where no unit falls in.
pub fn bin_centres(som: &Som, component: usize, bins: usize) -> Result<Vec<Option<Point>>> {
    if bins == 0 {
        return Err(Error::InvalidMode("metro map needs at least one bin".to_string()));
    }
    if component >= som.dim() {
        return Err(Error::DataLengthMismatch {
            expected: som.dim(),
            actual: component + 1,
        });
    }
    let values: Vec<f64> = (0..som.unit_count())
        .map(|u| som.weight_at(u)[component])
        .collect();
    let (lo, hi) = crate::algo::stats::min_max(&values).unwrap_or((0.0, 0.0));
    let span = hi - lo;

    let mut sums = vec![(0.0, 0.0, 0usize); bins];
    for (unit, v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let bin = if span > 0.0 {
            (((v - lo) / span * bins as f64) as usize).min(bins - 1)
        } else {
            0
        };
        let (x, y) = som.coords(unit);
        sums[bin].0 += x as f64;
        sums[bin].1 += y as f64;
        sums[bin].2 += 1;
    }
    Ok(sums
        .into_iter()
        .map(|(sx, sy, n)| (n > 0).then(|| Point::new(sx / n as f64, sy / n as f64)))
        .collect())
}

/// Replace empty bins by interpolated positions.
#[must_use]
pub fn fill_empty_bins(centres: &[Option<Point>]) -> Vec<Point> {
    let known: Vec<(usize, Point)> = centres
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.map(|p| (i, p)))
        .collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return Vec::new();
    };
    (0..centres.len())
        .map(|i| {
            if let Some(p) = centres[i] {
                return p;
            }
            if i < first.0 {
                return first.1;
            }
            if i > last.0 {
                return last.1;
            }
            let after = known.partition_point(|(k, _)| *k < i);
            let (i0, p0) = known[after - 1];
            let (i1, p1) = known[after];
            p0.lerp(p1, (i - i0) as f64 / (i1 - i0) as f64)
        })
        .collect()
}

/// One line per weight component.
pub fn component_lines(som: &Som, bins: usize) -> Result<Vec<ComponentLine>> {
    (0..som.dim())
        .map(|c| Ok(ComponentLine::new(c, fill_empty_bins(&bin_centres(som, c, bins)?))))
        .collect()
}
