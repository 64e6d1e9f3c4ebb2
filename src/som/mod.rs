//! The trained map read by every visualizer.
//!
//! A [`Som`] is an `x_size × y_size` grid of units stored row-major
//! (`index = y * x_size + x`). Each unit carries a weight vector of length
//! `dim` and the indices of the input vectors mapped onto it. Three
//! dimensional maps are handed to the visualizers one z-slice at a time.
//!
//! The [identity hash](Som::identity_hash) covers dimensions, metric,
//! weights, mapping and attached input objects, and is recomputed by every
//! builder method.

pub mod inputs;
pub mod metric;

pub use inputs::{
    ClassInfo, DistanceMatrix, InputData, InputObjectKind, SharedInputObjects, TemplateVector,
};
pub use metric::Metric;

use crate::error::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Immutable trained map.
#[derive(Debug, Clone)]
pub struct Som {
    x_size: usize,
    y_size: usize,
    dim: usize,
    metric: Metric,
    weights: Vec<f64>,
    mapped: Vec<Vec<usize>>,
    mnemonic: bool,
    inputs: SharedInputObjects,
    identity: u64,
}

impl Som {
    /// Create a map from flat row-major weights (`x_size * y_size * dim` values).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyData`] for a zero-sized grid or dimension and
    /// [`Error::DataLengthMismatch`] when the weight count is wrong.
    pub fn new(x_size: usize, y_size: usize, dim: usize, weights: Vec<f64>) -> Result<Self> {
        if x_size == 0 || y_size == 0 || dim == 0 {
            return Err(Error::EmptyData);
        }
        let expected = x_size * y_size * dim;
        if weights.len() != expected {
            return Err(Error::DataLengthMismatch {
                expected,
                actual: weights.len(),
            });
        }
        let mut som = Self {
            x_size,
            y_size,
            dim,
            metric: Metric::default(),
            weights,
            mapped: vec![Vec::new(); x_size * y_size],
            mnemonic: false,
            inputs: SharedInputObjects::default(),
            identity: 0,
        };
        som.rehash();
        Ok(som)
    }

    /// Create a map from a closure producing each unit's weight vector.
    pub fn from_fn(
        x_size: usize,
        y_size: usize,
        dim: usize,
        mut f: impl FnMut(usize, usize) -> Vec<f64>,
    ) -> Result<Self> {
        let mut weights = Vec::with_capacity(x_size * y_size * dim);
        for y in 0..y_size {
            for x in 0..x_size {
                let w = f(x, y);
                if w.len() != dim {
                    return Err(Error::DataLengthMismatch {
                        expected: dim,
                        actual: w.len(),
                    });
                }
                weights.extend(w);
            }
        }
        Self::new(x_size, y_size, dim, weights)
    }

    /// Use `metric` for all unit and input distances.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self.rehash();
        self
    }

    /// Mark the map as mnemonic (units without hits are blanked).
    #[must_use]
    pub fn with_mnemonic(mut self, mnemonic: bool) -> Self {
        self.mnemonic = mnemonic;
        self.rehash();
        self
    }

    /// Set the mapped input indices per unit.
    pub fn with_mapping(mut self, mapped: Vec<Vec<usize>>) -> Result<Self> {
        if mapped.len() != self.unit_count() {
            return Err(Error::DataLengthMismatch {
                expected: self.unit_count(),
                actual: mapped.len(),
            });
        }
        check_links(&mapped, &self.inputs)?;
        self.mapped = mapped;
        self.rehash();
        Ok(self)
    }

    /// Attach shared input objects.
    ///
    /// # Errors
    ///
    /// Fails when the input data dimension differs from the weight dimension,
    /// a template vector has the wrong length, a distance matrix does not
    /// cover exactly the input vectors, or the current mapping refers to
    /// inputs that do not exist.
    pub fn with_inputs(mut self, inputs: SharedInputObjects) -> Result<Self> {
        if let Some(data) = &inputs.input_data {
            if data.dim() != self.dim {
                return Err(Error::DataLengthMismatch {
                    expected: self.dim,
                    actual: data.dim(),
                });
            }
        }
        if let Some(template) = &inputs.template_vector {
            if template.len() != self.dim {
                return Err(Error::DataLengthMismatch {
                    expected: self.dim,
                    actual: template.len(),
                });
            }
        }
        check_links(&self.mapped, &inputs)?;
        self.inputs = inputs;
        self.rehash();
        Ok(self)
    }

    /// Map every attached input vector onto its best-matching unit.
    pub fn map_inputs(mut self) -> Result<Self> {
        let Some(data) = self.inputs.input_data.clone() else {
            return Err(Error::MissingInputObjects {
                visualizer: "SOM mapping".to_string(),
                missing: vec![InputObjectKind::InputData.name().to_string()],
            });
        };
        let mut mapped = vec![Vec::new(); self.unit_count()];
        for (i, v) in data.iter().enumerate() {
            let (unit, _) = self.best_matching_unit(v)?;
            mapped[unit].push(i);
        }
        self.mapped = mapped;
        self.rehash();
        Ok(self)
    }

    fn rehash(&mut self) {
        let mut h = DefaultHasher::new();
        self.x_size.hash(&mut h);
        self.y_size.hash(&mut h);
        self.dim.hash(&mut h);
        self.metric.hash(&mut h);
        for w in &self.weights {
            w.to_bits().hash(&mut h);
        }
        self.mapped.hash(&mut h);
        self.mnemonic.hash(&mut h);
        self.inputs.hash_into(&mut h);
        self.identity = h.finish();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Grid width.
    #[must_use]
    pub fn x_size(&self) -> usize {
        self.x_size
    }

    /// Grid height.
    #[must_use]
    pub fn y_size(&self) -> usize {
        self.y_size
    }

    /// Weight vector dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.x_size * self.y_size
    }

    /// Distance metric.
    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Whether empty units are to be blanked.
    #[must_use]
    pub fn is_mnemonic(&self) -> bool {
        self.mnemonic
    }

    /// Identity hash used in cache keys.
    #[must_use]
    pub fn identity_hash(&self) -> u64 {
        self.identity
    }

    /// Attached shared input objects.
    #[must_use]
    pub fn inputs(&self) -> &SharedInputObjects {
        &self.inputs
    }

    /// Row-major unit index.
    #[must_use]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.x_size + x
    }

    /// Grid coordinates of a unit index.
    #[must_use]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.x_size, index / self.x_size)
    }

    /// All weights, row-major.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weight vector of unit `(x, y)`.
    #[must_use]
    pub fn weight(&self, x: usize, y: usize) -> &[f64] {
        self.weight_at(self.index(x, y))
    }

    /// Weight vector of unit `index`.
    #[must_use]
    pub fn weight_at(&self, index: usize) -> &[f64] {
        &self.weights[index * self.dim..(index + 1) * self.dim]
    }

    /// Input indices mapped onto unit `(x, y)`.
    #[must_use]
    pub fn mapped_inputs(&self, x: usize, y: usize) -> &[usize] {
        &self.mapped[self.index(x, y)]
    }

    /// Number of inputs mapped onto unit `(x, y)`.
    #[must_use]
    pub fn hits(&self, x: usize, y: usize) -> usize {
        self.mapped_inputs(x, y).len()
    }

    /// Largest hit count of any unit.
    #[must_use]
    pub fn max_hits(&self) -> usize {
        self.mapped.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Total number of mapped inputs.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        self.mapped.iter().map(Vec::len).sum()
    }

    /// Winning unit of every mapped input, indexed by input number.
    #[must_use]
    pub fn input_winners(&self) -> Vec<Option<usize>> {
        let n = self
            .inputs
            .input_data
            .as_ref()
            .map(|d| d.len())
            .unwrap_or(0)
            .max(
                self.mapped
                    .iter()
                    .flatten()
                    .map(|i| i + 1)
                    .max()
                    .unwrap_or(0),
            );
        let mut winners = vec![None; n];
        for (unit, inputs) in self.mapped.iter().enumerate() {
            for &i in inputs {
                winners[i] = Some(unit);
            }
        }
        winners
    }

    /// 4-neighbourhood of unit `(x, y)`.
    pub fn neighbours4(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (xs, ys) = (self.x_size as isize, self.y_size as isize);
        let (x, y) = (x as isize, y as isize);
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < xs && ny < ys)
            .map(|(nx, ny)| (nx as usize, ny as usize))
    }

    /// 8-neighbourhood of unit `(x, y)`.
    pub fn neighbours8(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (xs, ys) = (self.x_size as isize, self.y_size as isize);
        let (x, y) = (x as isize, y as isize);
        (-1isize..=1)
            .flat_map(|dy| (-1isize..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < xs && ny < ys)
            .map(|(nx, ny)| (nx as usize, ny as usize))
    }

    // ========================================================================
    // Distances
    // ========================================================================

    /// Distance between the weight vectors of units `a` and `b`.
    pub fn unit_distance(&self, a: usize, b: usize) -> Result<f64> {
        self.metric.distance(self.weight_at(a), self.weight_at(b))
    }

    /// Distance between the weight vectors of two grid positions.
    pub fn unit_distance_xy(&self, a: (usize, usize), b: (usize, usize)) -> Result<f64> {
        self.unit_distance(self.index(a.0, a.1), self.index(b.0, b.1))
    }

    /// The `n` units closest to `v`, ascending by distance.
    pub fn best_matching_units(&self, v: &[f64], n: usize) -> Result<Vec<(usize, f64)>> {
        let mut all = (0..self.unit_count())
            .map(|u| Ok((u, self.metric.distance(v, self.weight_at(u))?)))
            .collect::<Result<Vec<_>>>()?;
        all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        all.truncate(n);
        Ok(all)
    }

    /// The unit closest to `v`.
    pub fn best_matching_unit(&self, v: &[f64]) -> Result<(usize, f64)> {
        let mut best = (0, f64::INFINITY);
        for u in 0..self.unit_count() {
            let d = self.metric.distance(v, self.weight_at(u))?;
            if d < best.1 {
                best = (u, d);
            }
        }
        Ok(best)
    }
}

/// Mapping indices and the distance matrix must agree with the input data.
fn check_links(mapped: &[Vec<usize>], inputs: &SharedInputObjects) -> Result<()> {
    let Some(data) = inputs.input_data.as_deref() else {
        return Ok(());
    };
    if let Some(matrix) = inputs.distance_matrix.as_deref() {
        if matrix.len() != data.len() {
            return Err(Error::DataLengthMismatch {
                expected: data.len(),
                actual: matrix.len(),
            });
        }
    }
    match mapped.iter().flatten().find(|&&i| i >= data.len()) {
        Some(&index) => Err(Error::InputIndex {
            index,
            count: data.len(),
        }),
        None => Ok(()),
    }
}
