//! Neighbour queries over a distance matrix.

use crate::som::inputs::DistanceMatrix;

/// The `k` inputs closest to input `i`, excluding `i`; ties broken by index.
#[must_use]
pub fn k_nearest(dist: &DistanceMatrix, i: usize, k: usize) -> Vec<usize> {
    let row = dist.row(i);
    let mut others: Vec<usize> = (0..dist.len()).filter(|&j| j != i).collect();
    others.sort_by(|&a, &b| row[a].total_cmp(&row[b]).then(a.cmp(&b)));
    others.truncate(k);
    others
}

/// All inputs within `radius` of input `i`, excluding `i`, in index order.
#[must_use]
pub fn within_radius(dist: &DistanceMatrix, i: usize, radius: f64) -> Vec<usize> {
    dist.row(i)
        .iter()
        .enumerate()
        .filter(|&(j, &d)| j != i && d <= radius)
        .map(|(j, _)| j)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::inputs::InputData;
    use crate::som::metric::Metric;

    fn dm() -> DistanceMatrix {
        let data = InputData::new(1, vec![0.0, 1.0, 3.0, 3.5, 10.0], None).unwrap();
        DistanceMatrix::compute(&data, Metric::Euclidean).unwrap()
    }

    #[test]
    fn test_k_nearest() {
        assert_eq!(k_nearest(&dm(), 2, 2), vec![3, 1]);
        assert_eq!(k_nearest(&dm(), 0, 10), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_within_radius() {
        assert_eq!(within_radius(&dm(), 2, 2.0), vec![1, 3]);
        assert!(within_radius(&dm(), 4, 1.0).is_empty());
    }
}
