//! Agglomerative Ward clustering.
//!
//! Works on a full matrix of squared distances and updates it with the
//! Lance–Williams recurrence
//! `d(k, i∪j) = ((n_i + n_k) d(k,i) + (n_j + n_k) d(k,j) - n_k d(i,j)) / (n_i + n_j + n_k)`.
//! With the `parallel` feature the closest-pair search of each merge step
//! runs on a dedicated rayon pool.

use crate::error::{Error, Result};
use log::{info, warn};
use std::cmp::Ordering;

/// One merge step. Leaves are `0..n`; the cluster created by step `s` is `n + s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First merged cluster.
    pub left: usize,
    /// Second merged cluster.
    pub right: usize,
    /// Ward merge cost (squared-distance scale).
    pub distance: f64,
    /// Number of leaves in the new cluster.
    pub size: usize,
}

/// Full merge history of `n` leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    leaves: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Number of clustered items.
    #[must_use]
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Merge steps in order.
    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Cluster label in `0..k` for every leaf after undoing the last `k - 1`
    /// merges. Labels follow first appearance in leaf order.
    #[must_use]
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let n = self.leaves;
        let k = k.clamp(1, n.max(1));
        let mut parent: Vec<usize> = (0..2 * n).collect();
        for (step, m) in self.merges.iter().take(n - k).enumerate() {
            parent[m.left] = n + step;
            parent[m.right] = n + step;
        }
        let root = |mut c: usize| {
            while parent[c] != c {
                c = parent[c];
            }
            c
        };
        let mut labels_of_roots: Vec<(usize, usize)> = Vec::new();
        (0..n)
            .map(|leaf| {
                let r = root(leaf);
                match labels_of_roots.iter().find(|(root, _)| *root == r) {
                    Some((_, label)) => *label,
                    None => {
                        let label = labels_of_roots.len();
                        labels_of_roots.push((r, label));
                        label
                    }
                }
            })
            .collect()
    }
}

/// Worker threads for a machine with `cpus` cores: all of them up to two,
/// then leave one (four cores) or two (more) free.
#[must_use]
pub fn worker_count(cpus: usize) -> usize {
    match cpus {
        0 | 1 => 1,
        2 | 3 => 2,
        4 => 3,
        n => n - 2,
    }
}

/// Cluster `n` items given their row-major `n × n` squared distances.
///
/// # Errors
///
/// Returns [`Error::EmptyData`] for no items and
/// [`Error::DataLengthMismatch`] when the matrix is not `n × n`.
pub fn ward(squared: &[f64], n: usize, workers: usize) -> Result<Dendrogram> {
    if n == 0 {
        return Err(Error::EmptyData);
    }
    if squared.len() != n * n {
        return Err(Error::DataLengthMismatch {
            expected: n * n,
            actual: squared.len(),
        });
    }
    info!("ward clustering of {n} items on {workers} worker(s)");

    let search = PairSearch::new(workers);
    let mut d = squared.to_vec();
    let mut size = vec![1usize; n];
    let mut id: Vec<usize> = (0..n).collect();
    let mut active: Vec<usize> = (0..n).collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    while active.len() > 1 {
        let Some((dist, a, b)) = search.closest(&d, n, &active) else {
            break;
        };
        let (i, j) = (active[a], active[b]);
        let (ni, nj) = (size[i] as f64, size[j] as f64);
        for &k in &active {
            if k == i || k == j {
                continue;
            }
            let nk = size[k] as f64;
            let updated = ((ni + nk) * d[k * n + i] + (nj + nk) * d[k * n + j] - nk * dist)
                / (ni + nj + nk);
            d[k * n + i] = updated;
            d[i * n + k] = updated;
        }
        merges.push(Merge {
            left: id[i],
            right: id[j],
            distance: dist,
            size: size[i] + size[j],
        });
        size[i] += size[j];
        id[i] = n + merges.len() - 1;
        active.remove(b);
    }

    Ok(Dendrogram { leaves: n, merges })
}

fn compare(x: &(f64, usize, usize), y: &(f64, usize, usize)) -> Ordering {
    x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2))
}

/// Closest remaining pair in row `a` (positions into `active`, `a < b`).
fn row_minimum(d: &[f64], n: usize, active: &[usize], a: usize) -> Option<(f64, usize, usize)> {
    let i = active[a];
    (a + 1..active.len())
        .map(|b| (d[i * n + active[b]], a, b))
        .min_by(compare)
}

enum PairSearch {
    Sequential,
    #[cfg(feature = "parallel")]
    Pool(rayon::ThreadPool),
}

impl PairSearch {
    #[cfg(feature = "parallel")]
    fn new(workers: usize) -> Self {
        if workers <= 1 {
            return Self::Sequential;
        }
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => Self::Pool(pool),
            Err(e) => {
                warn!("could not start {workers} ward workers, clustering sequentially: {e}");
                Self::Sequential
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn new(workers: usize) -> Self {
        if workers > 1 {
            warn!("built without the parallel feature; ignoring {workers} ward workers");
        }
        Self::Sequential
    }

    fn closest(&self, d: &[f64], n: usize, active: &[usize]) -> Option<(f64, usize, usize)> {
        match self {
            Self::Sequential => (0..active.len())
                .filter_map(|a| row_minimum(d, n, active, a))
                .min_by(compare),
            #[cfg(feature = "parallel")]
            Self::Pool(pool) => {
                use rayon::prelude::*;
                pool.install(|| {
                    (0..active.len())
                        .into_par_iter()
                        .filter_map(|a| row_minimum(d, n, active, a))
                        .min_by(compare)
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn squared_1d(points: &[f64]) -> Vec<f64> {
        let n = points.len();
        let mut d = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                d[i * n + j] = (points[i] - points[j]).powi(2);
            }
        }
        d
    }

    #[test]
    fn test_two_obvious_clusters() {
        let pts = [0.0, 0.1, 0.2, 10.0, 10.1];
        let dendro = ward(&squared_1d(&pts), pts.len(), 1).unwrap();
        assert_eq!(dendro.merges().len(), 4);
        assert_eq!(dendro.cut(2), vec![0, 0, 0, 1, 1]);
        assert_eq!(dendro.cut(1), vec![0; 5]);
        assert_eq!(dendro.cut(5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_first_merge_is_closest_pair() {
        let pts = [0.0, 5.0, 5.5, 20.0];
        let dendro = ward(&squared_1d(&pts), 4, 1).unwrap();
        let first = dendro.merges()[0];
        assert_eq!((first.left, first.right), (1, 2));
        assert_relative_eq!(first.distance, 0.25);
        assert_eq!(first.size, 2);
    }

    #[test]
    fn test_merge_heights_monotone() {
        let pts = [0.3, 1.7, 2.2, 4.0, 9.5, 9.9, 12.0];
        let dendro = ward(&squared_1d(&pts), pts.len(), 1).unwrap();
        for w in dendro.merges().windows(2) {
            assert!(w[0].distance <= w[1].distance + 1e-12);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pts: Vec<f64> = (0..40).map(|i| ((i * 37) % 23) as f64 * 0.7).collect();
        let d = squared_1d(&pts);
        let seq = ward(&d, pts.len(), 1).unwrap();
        let par = ward(&d, pts.len(), 3).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(2), 2);
        assert_eq!(worker_count(3), 2);
        assert_eq!(worker_count(4), 3);
        assert_eq!(worker_count(8), 6);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ward(&[], 0, 1).is_err());
        assert!(ward(&[0.0; 3], 2, 1).is_err());
    }
}
