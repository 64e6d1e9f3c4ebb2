//! Auxiliary objects shared between a SOM and its visualizers.

use crate::error::{Error, Result};
use crate::som::metric::Metric;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Kinds of shared input objects a visualizer may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputObjectKind {
    /// The training vectors.
    InputData,
    /// Pairwise distances between input vectors.
    DistanceMatrix,
    /// Class labels of the input vectors.
    ClassInfo,
    /// Names of the vector components.
    TemplateVector,
}

impl InputObjectKind {
    /// Human-readable name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InputData => "input data",
            Self::DistanceMatrix => "distance matrix",
            Self::ClassInfo => "class info",
            Self::TemplateVector => "template vector",
        }
    }
}

impl fmt::Display for InputObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input vectors in row-major storage, optionally labelled.
#[derive(Debug, Clone, PartialEq)]
pub struct InputData {
    dim: usize,
    data: Vec<f64>,
    labels: Vec<String>,
}

impl InputData {
    /// Create from flat row-major data.
    ///
    /// # Errors
    ///
    /// Fails for `dim == 0`, empty data, data not divisible by `dim`, or a
    /// label list of the wrong length.
    pub fn new(dim: usize, data: Vec<f64>, labels: Option<Vec<String>>) -> Result<Self> {
        if dim == 0 || data.is_empty() {
            return Err(Error::EmptyData);
        }
        if data.len() % dim != 0 {
            return Err(Error::DataLengthMismatch {
                expected: (data.len() / dim + 1) * dim,
                actual: data.len(),
            });
        }
        let n = data.len() / dim;
        let labels = match labels {
            Some(l) if l.len() != n => {
                return Err(Error::DataLengthMismatch {
                    expected: n,
                    actual: l.len(),
                })
            }
            Some(l) => l,
            None => (0..n).map(|i| format!("#{i}")).collect(),
        };
        Ok(Self { dim, data, labels })
    }

    /// Create from one vector per row.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(Error::DataLengthMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Self::new(dim, rows.concat(), None)
    }

    /// Number of vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Always false; construction rejects empty data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vector dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Vector `i`.
    #[must_use]
    pub fn vector(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// All vectors in order.
    pub fn iter(&self) -> std::slice::Chunks<'_, f64> {
        self.data.chunks(self.dim)
    }

    /// Label of vector `i`.
    #[must_use]
    pub fn label(&self, i: usize) -> &str {
        &self.labels[i]
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.dim.hash(state);
        for v in &self.data {
            v.to_bits().hash(state);
        }
        self.labels.hash(state);
    }
}

/// Symmetric `n × n` matrix of pairwise input distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Wrap a full row-major `n × n` distance table.
    pub fn new(n: usize, values: Vec<f64>) -> Result<Self> {
        if n == 0 {
            return Err(Error::EmptyData);
        }
        if values.len() != n * n {
            return Err(Error::DataLengthMismatch {
                expected: n * n,
                actual: values.len(),
            });
        }
        Ok(Self { n, values })
    }

    /// Compute all pairwise distances of `data`.
    pub fn compute(data: &InputData, metric: Metric) -> Result<Self> {
        let n = data.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = metric.distance(data.vector(i), data.vector(j))?;
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self::new(n, values)
    }

    /// Number of inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between inputs `i` and `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Row `i`: distances from input `i` to every input.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.n.hash(state);
        for v in &self.values {
            v.to_bits().hash(state);
        }
    }
}

/// Class membership of input vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    class_names: Vec<String>,
    assignment: Vec<Option<usize>>,
}

impl ClassInfo {
    /// `assignment[i]` is the class index of input `i`, or `None` if unlabelled.
    pub fn new(class_names: Vec<String>, assignment: Vec<Option<usize>>) -> Result<Self> {
        if class_names.is_empty() {
            return Err(Error::EmptyData);
        }
        if let Some(bad) = assignment.iter().flatten().find(|c| **c >= class_names.len()) {
            return Err(Error::DataLengthMismatch {
                expected: class_names.len(),
                actual: bad + 1,
            });
        }
        Ok(Self {
            class_names,
            assignment,
        })
    }

    /// Build from a label per input; class indices follow first appearance.
    #[must_use]
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut class_names: Vec<String> = Vec::new();
        let assignment = labels
            .iter()
            .map(|l| {
                let l = l.as_ref();
                let idx = class_names.iter().position(|c| c == l).unwrap_or_else(|| {
                    class_names.push(l.to_string());
                    class_names.len() - 1
                });
                Some(idx)
            })
            .collect();
        Self {
            class_names,
            assignment,
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }

    /// Class of input `i`.
    #[must_use]
    pub fn class_of(&self, input: usize) -> Option<usize> {
        self.assignment.get(input).copied().flatten()
    }

    /// Name of class `c`.
    #[must_use]
    pub fn class_name(&self, class: usize) -> &str {
        &self.class_names[class]
    }

    /// Per-class counts for a set of inputs.
    #[must_use]
    pub fn class_histogram(&self, inputs: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.class_count()];
        for c in inputs.iter().filter_map(|i| self.class_of(*i)) {
            counts[c] += 1;
        }
        counts
    }
}

/// Names of the vector components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateVector {
    labels: Vec<String>,
}

impl TemplateVector {
    /// Create from component labels.
    #[must_use]
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if there are no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of component `i`.
    #[must_use]
    pub fn label(&self, i: usize) -> Option<&str> {
        self.labels.get(i).map(String::as_str)
    }
}

/// The auxiliary objects attached to a SOM.
#[derive(Debug, Clone, Default)]
pub struct SharedInputObjects {
    /// Training vectors.
    pub input_data: Option<Arc<InputData>>,
    /// Pairwise input distances.
    pub distance_matrix: Option<Arc<DistanceMatrix>>,
    /// Class labels.
    pub class_info: Option<Arc<ClassInfo>>,
    /// Component names.
    pub template_vector: Option<Arc<TemplateVector>>,
}

impl SharedInputObjects {
    /// No objects attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach input data.
    #[must_use]
    pub fn with_input_data(mut self, data: InputData) -> Self {
        self.input_data = Some(Arc::new(data));
        self
    }

    /// Attach a distance matrix.
    #[must_use]
    pub fn with_distance_matrix(mut self, matrix: DistanceMatrix) -> Self {
        self.distance_matrix = Some(Arc::new(matrix));
        self
    }

    /// Attach class info.
    #[must_use]
    pub fn with_class_info(mut self, info: ClassInfo) -> Self {
        self.class_info = Some(Arc::new(info));
        self
    }

    /// Attach a template vector.
    #[must_use]
    pub fn with_template_vector(mut self, template: TemplateVector) -> Self {
        self.template_vector = Some(Arc::new(template));
        self
    }

    /// Whether an object of `kind` is attached.
    #[must_use]
    pub fn has(&self, kind: InputObjectKind) -> bool {
        match kind {
            InputObjectKind::InputData => self.input_data.is_some(),
            InputObjectKind::DistanceMatrix => self.distance_matrix.is_some(),
            InputObjectKind::ClassInfo => self.class_info.is_some(),
            InputObjectKind::TemplateVector => self.template_vector.is_some(),
        }
    }

    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        match &self.input_data {
            Some(d) => {
                1u8.hash(state);
                d.hash_into(state);
            }
            None => 0u8.hash(state),
        }
        match &self.distance_matrix {
            Some(m) => {
                1u8.hash(state);
                m.hash_into(state);
            }
            None => 0u8.hash(state),
        }
        self.class_info.as_deref().hash(state);
        self.template_vector.as_deref().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_input_data_rows() {
        let data = InputData::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.vector(1), &[3.0, 4.0]);
        assert_eq!(data.label(0), "#0");
        assert_eq!(data.iter().count(), 2);
    }

    #[test]
    fn test_input_data_rejects_ragged() {
        assert!(InputData::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(InputData::new(2, vec![1.0, 2.0, 3.0], None).is_err());
        assert!(InputData::new(1, vec![1.0], Some(vec![])).is_err());
    }

    #[test]
    fn test_distance_matrix_compute() {
        let data = InputData::from_rows(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![0.0, 1.0]]).unwrap();
        let dm = DistanceMatrix::compute(&data, Metric::Euclidean).unwrap();
        assert_relative_eq!(dm.get(0, 1), 5.0);
        assert_relative_eq!(dm.get(1, 0), 5.0);
        assert_relative_eq!(dm.get(2, 2), 0.0);
        assert_eq!(dm.row(0).len(), 3);
    }

    #[test]
    fn test_class_info_from_labels() {
        let info = ClassInfo::from_labels(&["a", "b", "a", "c"]);
        assert_eq!(info.class_count(), 3);
        assert_eq!(info.class_of(2), Some(0));
        assert_eq!(info.class_name(2), "c");
        assert_eq!(info.class_histogram(&[0, 1, 2]), vec![2, 1, 0]);
        assert_eq!(info.class_of(99), None);
    }

    #[test]
    fn test_class_info_rejects_bad_index() {
        assert!(ClassInfo::new(vec!["x".into()], vec![Some(1)]).is_err());
    }

    #[test]
    fn test_has() {
        let objs = SharedInputObjects::new()
            .with_template_vector(TemplateVector::new(vec!["a".into()]));
        assert!(objs.has(InputObjectKind::TemplateVector));
        assert!(!objs.has(InputObjectKind::InputData));
    }
}
