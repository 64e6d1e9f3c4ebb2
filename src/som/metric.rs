//! Distance metrics between weight and input vectors.
//!
//! Components where either side is NaN are skipped. A metric that cannot be
//! evaluated returns [`Error::Metric`] instead of panicking.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Vector distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    /// Euclidean (L2) distance.
    #[default]
    Euclidean,
    /// Squared Euclidean distance.
    SqEuclidean,
    /// Manhattan (L1) distance.
    Manhattan,
    /// Fraction of binarized components (threshold 0.5) that disagree.
    Tanimoto,
}

impl Metric {
    /// All metrics, for lookups.
    pub const ALL: [Self; 4] = [Self::Euclidean, Self::SqEuclidean, Self::Manhattan, Self::Tanimoto];

    /// Lower-case name used in configuration and cache keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SqEuclidean => "sqeuclidean",
            Self::Manhattan => "manhattan",
            Self::Tanimoto => "tanimoto",
        }
    }

    /// Distance between two vectors of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metric`] for vectors of different length, and for
    /// Tanimoto when no component is comparable.
    pub fn distance(self, from: &[f64], to: &[f64]) -> Result<f64> {
        if from.len() != to.len() {
            return Err(Error::Metric(format!(
                "{} distance between vectors of length {} and {}",
                self.name(),
                from.len(),
                to.len()
            )));
        }
        let pairs = from
            .iter()
            .zip(to)
            .filter(|(a, b)| !a.is_nan() && !b.is_nan());

        let d = match self {
            Self::SqEuclidean => pairs.map(|(a, b)| (a - b).powi(2)).sum(),
            Self::Euclidean => pairs.map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt(),
            Self::Manhattan => pairs.map(|(a, b)| (a - b).abs()).sum(),
            Self::Tanimoto => {
                let mut counter = 0usize;
                let mut differing = 0usize;
                for (a, b) in pairs {
                    counter += 1;
                    if (*a >= 0.5) != (*b >= 0.5) {
                        differing += 1;
                    }
                }
                if counter == 0 {
                    return Err(Error::Metric(
                        "tanimoto distance with no comparable components".to_string(),
                    ));
                }
                differing as f64 / counter as f64
            }
        };
        Ok(d)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Metric(format!(
                    "not a metric: '{s}', must be one of euclidean|sqeuclidean|manhattan|tanimoto"
                ))
            })
    }
}
