//! Neighbourhood graph overlay.
//!
//! Connects the winning units of every input and each of its neighbours in
//! input space, found either as the `k` nearest inputs or all inputs within
//! a radius. Pairs are undirected and drawn once; self pairs are dropped.

use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::knn::{k_nearest, within_radius};
use crate::cache::{ImageCache, KeySection};
use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::geometry::GridLayout;
use crate::image::RasterImage;
use crate::render::draw_thick_line;
use crate::som::{DistanceMatrix, InputObjectKind, Som};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// How neighbours of an input are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeighbourhoodMode {
    /// The `k` nearest inputs.
    KNearest(usize),
    /// Every input within the radius.
    Radius(f64),
}

impl fmt::Display for NeighbourhoodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KNearest(k) => write!(f, "knn={k}"),
            Self::Radius(r) => write!(f, "radius={r}"),
        }
    }
}

/// Lines between units whose inputs are neighbours.
#[derive(Debug)]
pub struct NeighbourhoodGraph {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    mode: NeighbourhoodMode,
    line_width: f64,
    colour: Rgba,
    distances: Mutex<HashMap<u64, Arc<DistanceMatrix>>>,
    edges: Mutex<HashMap<(u64, String), Arc<Vec<(usize, usize)>>>>,
}

impl NeighbourhoodGraph {
    /// Graph over the 1 nearest neighbour.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Neighbourhood Graph",
                "NeighbourhoodGraph",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "Neighbourhood Graph",
                    "graph",
                    "Links between units of neighbouring inputs",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            mode: NeighbourhoodMode::KNearest(1),
            line_width: 1.5,
            colour: Rgba::BLACK,
            distances: Mutex::new(HashMap::new()),
            edges: Mutex::new(HashMap::new()),
        }
    }

    /// Neighbour selection.
    #[must_use]
    pub fn mode(&self) -> NeighbourhoodMode {
        self.mode
    }

    /// Change the neighbour selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMode`] for `k == 0` or a negative or NaN radius.
    pub fn set_mode(&mut self, mode: NeighbourhoodMode) -> Result<()> {
        match mode {
            NeighbourhoodMode::KNearest(0) => {
                return Err(Error::InvalidMode("k must be at least 1".to_string()))
            }
            NeighbourhoodMode::Radius(r) if r.is_nan() || r < 0.0 => {
                return Err(Error::InvalidMode(format!("radius {r} is not a distance")))
            }
            _ => {}
        }
        self.mode = mode;
        Ok(())
    }

    /// Stroke width in pixels.
    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(1.0);
    }

    fn distance_matrix(&self, som: &Som) -> Result<Arc<DistanceMatrix>> {
        if let Some(d) = &som.inputs().distance_matrix {
            return Ok(Arc::clone(d));
        }
        let mut distances = self.distances.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(d) = distances.get(&som.identity_hash()) {
            return Ok(Arc::clone(d));
        }
        let data = som.inputs().input_data.as_deref().ok_or_else(|| Error::MissingInputObjects {
            visualizer: self.info.name.clone(),
            missing: vec![InputObjectKind::InputData.name().to_string()],
        })?;
        let d = Arc::new(DistanceMatrix::compute(data, som.metric())?);
        distances.insert(som.identity_hash(), Arc::clone(&d));
        Ok(d)
    }

    /// Deduplicated unit pairs `(a, b)` with `a < b` for the current mode.
    pub fn unit_edges(&self, som: &Som) -> Result<Arc<Vec<(usize, usize)>>> {
        let key = (som.identity_hash(), self.mode.to_string());
        if let Some(e) = self.edges.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(Arc::clone(e));
        }
        let dist = self.distance_matrix(som)?;
        let mut winners = som.input_winners();
        if winners.len() < dist.len() || winners.iter().take(dist.len()).any(Option::is_none) {
            winners = self.winners_by_search(som, dist.len())?;
        }
        if winners.len() < dist.len() {
            return Err(Error::DataLengthMismatch {
                expected: dist.len(),
                actual: winners.len(),
            });
        }

        let mut pairs = BTreeSet::new();
        for i in 0..dist.len() {
            let neighbours = match self.mode {
                NeighbourhoodMode::KNearest(k) => k_nearest(&dist, i, k),
                NeighbourhoodMode::Radius(r) => within_radius(&dist, i, r),
            };
            for j in neighbours {
                if let (Some(a), Some(b)) = (winners[i], winners[j]) {
                    if a != b {
                        pairs.insert((a.min(b), a.max(b)));
                    }
                }
            }
        }
        let edges = Arc::new(pairs.into_iter().collect::<Vec<_>>());
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&edges));
        Ok(edges)
    }

    fn winners_by_search(&self, som: &Som, n: usize) -> Result<Vec<Option<usize>>> {
        let data = som.inputs().input_data.as_deref().ok_or_else(|| Error::MissingInputObjects {
            visualizer: self.info.name.clone(),
            missing: vec![InputObjectKind::InputData.name().to_string()],
        })?;
        (0..n.min(data.len()))
            .map(|i| Ok(Some(som.best_matching_unit(data.vector(i))?.0)))
            .collect()
    }
}

impl Visualizer for NeighbourhoodGraph {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.distances.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.edges.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[InputObjectKind::InputData]
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![KeySection::new()
            .with("mode", self.mode)
            .with("lw", self.line_width)
            .with("colour", self.colour)]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        let edges = self.unit_edges(som)?;
        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let mut image = RasterImage::new(width, height)?;
        for &(a, b) in edges.iter() {
            let (ax, ay) = som.coords(a);
            let (bx, by) = som.coords(b);
            draw_thick_line(
                &mut image,
                layout.unit_centre(ax, ay),
                layout.unit_centre(bx, by),
                self.line_width,
                self.colour,
                &[],
            );
        }
        Ok(image)
    }
}
