//! Small statistics helpers on `f64` slices.
//!
//! NaN values are ignored everywhere; an empty (or all-NaN) input yields NaN
//! or `None`.

/// Finite (non-NaN) values, sorted ascending.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Median; the mean of the two middle values for even counts.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    let v = sorted(values);
    let n = v.len();
    match n {
        0 => f64::NAN,
        _ if n % 2 == 1 => v[n / 2],
        _ => (v[n / 2 - 1] + v[n / 2]) / 2.0,
    }
}

/// Percentile `pct ∈ [0, 100]` of an ascending slice, linearly interpolated.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Percentile of unsorted values.
#[must_use]
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    percentile_sorted(&sorted(values), pct)
}

/// Arithmetic mean.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|x| !x.is_nan())
        .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population variance.
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|x| (x - m).powi(2)).collect::<Vec<_>>())
}

/// Minimum and maximum.
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|x| !x.is_nan())
        .fold(None, |acc, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}

/// Min-max normalization into `[0, 1]`; a constant input maps to zeros.
#[must_use]
pub fn normalize(values: &[f64]) -> Vec<f64> {
    match min_max(values) {
        Some((lo, hi)) if hi > lo => values.iter().map(|x| (x - lo) / (hi - lo)).collect(),
        _ => values.iter().map(|x| if x.is_nan() { *x } else { 0.0 }).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_relative_eq!(median(&[f64::NAN, 5.0]), 5.0);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_percentile() {
        let v = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&v, 0.0), 0.0);
        assert_relative_eq!(percentile(&v, 50.0), 20.0);
        assert_relative_eq!(percentile(&v, 100.0), 40.0);
        assert_relative_eq!(percentile(&v, 12.5), 5.0);
    }

    #[test]
    fn test_mean_variance() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(variance(&[1.0, 3.0]), 1.0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize(&[7.0, 7.0]), vec![0.0, 0.0]);
        assert_eq!(min_max(&[]), None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Normalizing twice equals normalizing once.
        #[test]
        fn prop_normalize_idempotent(v in prop::collection::vec(-1e6f64..1e6, 1..100)) {
            let once = normalize(&v);
            let twice = normalize(&once);
            for (a, b) in once.iter().zip(&twice) {
                prop_assert!((a - b).abs() < 1e-9);
            }
            prop_assert!(once.iter().all(|x| (0.0..=1.0).contains(x)));
        }

        /// The median lies between min and max.
        #[test]
        fn prop_median_bounded(v in prop::collection::vec(-1e6f64..1e6, 1..100)) {
            let (lo, hi) = min_max(&v).unwrap();
            let m = median(&v);
            prop_assert!(m >= lo && m <= hi);
        }
    }
}
