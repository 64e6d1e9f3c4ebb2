//! Aggregation of similar component lines by Ward clustering.

use super::bins::ComponentLine;
use crate::algo::ward::{ward, Dendrogram};
use crate::error::{Error, Result};
use crate::geometry::Point;
use std::fmt;

/// Distance between two lines with the same number of bin centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineDistance {
    /// Root of summed squared distances of corresponding centres.
    #[default]
    Euclidean,
    /// Summed city-block distances of corresponding centres.
    Manhattan,
    /// Symmetric Hausdorff distance of the centre sets.
    Hausdorff,
}

impl LineDistance {
    /// Every distance, in menu order.
    pub const ALL: [Self; 3] = [Self::Euclidean, Self::Manhattan, Self::Hausdorff];

    /// Distance between `a` and `b`.
    #[must_use]
    pub fn distance(self, a: &[Point], b: &[Point]) -> f64 {
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(p, q)| (p.x - q.x).powi(2) + (p.y - q.y).powi(2))
                .sum::<f64>()
                .sqrt(),
            Self::Manhattan => a
                .iter()
                .zip(b)
                .map(|(p, q)| (p.x - q.x).abs() + (p.y - q.y).abs())
                .sum(),
            Self::Hausdorff => directed_hausdorff(a, b).max(directed_hausdorff(b, a)),
        }
    }
}

fn directed_hausdorff(a: &[Point], b: &[Point]) -> f64 {
    a.iter()
        .map(|p| b.iter().map(|q| p.distance(*q)).fold(f64::INFINITY, f64::min))
        .fold(0.0, f64::max)
}

impl fmt::Display for LineDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Hausdorff => "hausdorff",
        })
    }
}

/// How many aggregated lines remain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Aggregation {
    /// Draw every line.
    #[default]
    None,
    /// Cut the dendrogram into this many clusters.
    TargetCount(usize),
    /// Undo merges costlier than this fraction of the final merge.
    Threshold(f64),
}

impl Aggregation {
    /// Reject counts of zero and thresholds outside `[0, 1]`.
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::TargetCount(0) => Err(Error::InvalidMode(
                "aggregation target count must be positive".to_string(),
            )),
            Self::Threshold(t) if !(0.0..=1.0).contains(&t) => Err(Error::InvalidMode(format!(
                "aggregation threshold {t} is outside [0, 1]"
            ))),
            other => Ok(other),
        }
    }

    /// Cluster count this mode selects from `dendrogram`.
    #[must_use]
    pub fn cluster_count(self, dendrogram: &Dendrogram) -> usize {
        let n = dendrogram.leaves();
        match self {
            Self::None => n,
            Self::TargetCount(k) => k.min(n),
            Self::Threshold(t) => {
                let last = dendrogram.merges().last().map_or(0.0, |m| m.distance);
                1 + dendrogram
                    .merges()
                    .iter()
                    .filter(|m| m.distance > t * last)
                    .count()
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::TargetCount(k) => write!(f, "count={k}"),
            Self::Threshold(t) => write!(f, "threshold={t}"),
        }
    }
}

/// Ward dendrogram of `lines` under `distance`.
pub fn cluster_lines(lines: &[ComponentLine], distance: LineDistance, workers: usize) -> Result<Dendrogram> {
    let n = lines.len();
    let mut squared = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance.distance(&lines[i].points, &lines[j].points);
            squared[i * n + j] = d * d;
            squared[j * n + i] = d * d;
        }
    }
    ward(&squared, n, workers)
}

/// Mean line of every cluster; the members' components are merged.
#[must_use]
pub fn merge_clusters(lines: &[ComponentLine], labels: &[usize]) -> Vec<ComponentLine> {
    let clusters = labels.iter().copied().max().map_or(0, |m| m + 1);
    (0..clusters)
        .filter_map(|c| {
            let members: Vec<&ComponentLine> = lines
                .iter()
                .zip(labels)
                .filter(|(_, l)| **l == c)
                .map(|(line, _)| line)
                .collect();
            let first = members.first()?;
            let scale = 1.0 / members.len() as f64;
            let points = (0..first.points.len())
                .map(|i| {
                    members
                        .iter()
                        .fold(Point::ORIGIN, |acc, m| acc + m.points[i])
                        * scale
                })
                .collect();
            let mut components: Vec<usize> = members.iter().flat_map(|m| m.components.iter().copied()).collect();
            components.sort_unstable();
            Some(ComponentLine { components, points })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(component: usize, pts: &[(f64, f64)]) -> ComponentLine {
        ComponentLine::new(component, pts.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn test_line_distances() {
        let a = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let b = [Point::new(0.0, 3.0), Point::new(1.0, 4.0)];
        assert_relative_eq!(LineDistance::Euclidean.distance(&a, &b), 5.0);
        assert_relative_eq!(LineDistance::Manhattan.distance(&a, &b), 7.0);
        assert_relative_eq!(LineDistance::Hausdorff.distance(&a, &b), 4.0);
    }

    #[test]
    fn test_aggregate_two_bundles() {
        let lines = vec![
            line(0, &[(0.0, 0.0), (3.0, 0.0)]),
            line(1, &[(0.0, 0.2), (3.0, 0.2)]),
            line(2, &[(0.0, 5.0), (0.0, 9.0)]),
        ];
        let dendrogram = cluster_lines(&lines, LineDistance::Euclidean, 1).unwrap();
        let k = Aggregation::TargetCount(2).cluster_count(&dendrogram);
        let merged = merge_clusters(&lines, &dendrogram.cut(k));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].components, vec![0, 1]);
        assert_relative_eq!(merged[0].points[1].y, 0.1);
        assert_eq!(merged[1].components, vec![2]);
    }

    #[test]
    fn test_threshold_cluster_count() {
        let lines = vec![
            line(0, &[(0.0, 0.0)]),
            line(1, &[(0.0, 0.1)]),
            line(2, &[(0.0, 10.0)]),
        ];
        let dendrogram = cluster_lines(&lines, LineDistance::Manhattan, 1).unwrap();
        assert_eq!(Aggregation::Threshold(0.5).cluster_count(&dendrogram), 2);
        assert_eq!(Aggregation::Threshold(1.0).cluster_count(&dendrogram), 1);
        assert_eq!(Aggregation::None.cluster_count(&dendrogram), 3);
    }

    #[test]
    fn test_invalid_aggregation() {
        assert!(Aggregation::TargetCount(0).validate().is_err());
        assert!(Aggregation::Threshold(-0.1).validate().is_err());
        assert!(Aggregation::Threshold(0.4).validate().is_ok());
    }
}
