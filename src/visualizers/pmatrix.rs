//! P-Matrix and U*-Matrix.
//!
//! The P-Matrix height of a unit is the number of input vectors within the
//! Pareto radius of its weight vector. The U*-Matrix scales the normalized
//! mean-distance U-heights by `(p - mean_p) / (mean_p - max_p) + 1`, which
//! lowers walls inside dense regions and keeps them at cluster borders.
//!
//! Both the radius search and the density matrix are O(inputs²) and
//! O(units × inputs) respectively, so results are kept per SOM and radius.

use super::matrix::{Matrix, MatrixCore, MatrixSettings};
use super::umatrix::{d_matrix, NeighbourAggregate};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::pareto::{pareto_radius, ParetoRadius};
use crate::algo::stats;
use crate::cache::{ImageCache, KeySection};
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::{DistanceMatrix, InputObjectKind, Som};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Number of input vectors within `radius` of every unit's weight vector.
pub fn p_matrix(som: &Som, radius: f64) -> Result<Matrix> {
    let data = som
        .inputs()
        .input_data
        .as_ref()
        .ok_or_else(|| Error::MissingInputObjects {
            visualizer: "P-Matrix".to_string(),
            missing: vec![InputObjectKind::InputData.name().to_string()],
        })?;
    Matrix::from_units(som, |x, y| {
        let w = som.weight(x, y);
        let mut count = 0usize;
        for v in data.iter() {
            if som.metric().distance(w, v)? <= radius {
                count += 1;
            }
        }
        Ok(count as f64)
    })
}

/// U*-Matrix from a mean-distance D-Matrix and a P-Matrix of the same grid.
#[must_use]
pub fn u_star_matrix(u_heights: &Matrix, p_heights: &Matrix) -> Matrix {
    let u = u_heights.normalized();
    let mean_p = stats::mean(p_heights.values());
    let max_p = p_heights.min_max().map_or(mean_p, |r| r.1);
    let mut out = u.clone();
    for r in 0..u.rows() {
        for c in 0..u.cols() {
            let scale = if max_p > mean_p {
                (p_heights.get(r, c) - mean_p) / (mean_p - max_p) + 1.0
            } else {
                1.0
            };
            out.set(r, c, u.get(r, c) * scale);
        }
    }
    out
}

/// Pareto radius and density matrices, memoized per SOM and radius.
#[derive(Debug, Default)]
pub struct ParetoDensity {
    radius: Option<f64>,
    radii: Mutex<HashMap<u64, ParetoRadius>>,
    densities: Mutex<HashMap<(u64, u64), Arc<Matrix>>>,
}

impl ParetoDensity {
    /// Fixed radius, or `None` for the Pareto search.
    #[must_use]
    pub fn radius_override(&self) -> Option<f64> {
        self.radius
    }

    /// Use a fixed radius instead of searching.
    pub fn set_radius_override(&mut self, radius: Option<f64>) {
        self.radius = radius;
    }

    /// Pareto radius search result for `som`'s inputs.
    pub fn pareto(&self, som: &Som) -> Result<ParetoRadius> {
        let key = som.identity_hash();
        if let Some(r) = self.radii.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(*r);
        }
        let computed;
        let dist = match &som.inputs().distance_matrix {
            Some(d) => d.as_ref(),
            None => {
                let data = som.inputs().input_data.as_ref().ok_or_else(|| {
                    Error::MissingInputObjects {
                        visualizer: "P-Matrix".to_string(),
                        missing: vec![InputObjectKind::InputData.name().to_string()],
                    }
                })?;
                computed = DistanceMatrix::compute(data, som.metric())?;
                &computed
            }
        };
        let result = pareto_radius(dist)?;
        self.radii
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result);
        Ok(result)
    }

    /// Radius in effect for `som`.
    pub fn radius(&self, som: &Som) -> Result<f64> {
        match self.radius {
            Some(r) => Ok(r),
            None => Ok(self.pareto(som)?.radius),
        }
    }

    /// Density matrix of `som` at the radius in effect.
    pub fn densities(&self, som: &Som) -> Result<Arc<Matrix>> {
        let radius = self.radius(som)?;
        let key = (som.identity_hash(), radius.to_bits());
        if let Some(m) = self
            .densities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(m));
        }
        info!("computing P-Matrix densities at radius {radius:.4}");
        let matrix = Arc::new(p_matrix(som, radius)?);
        self.densities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&matrix));
        Ok(matrix)
    }

    /// Forget every memoized radius and density matrix.
    pub fn clear(&self) {
        self.radii.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.densities.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn key_section(&self) -> KeySection {
        let radius = self
            .radius
            .map_or_else(|| "pareto".to_string(), |r| r.to_string());
        KeySection::new().with("radius", radius)
    }
}

const NEEDS: &[InputObjectKind] = &[InputObjectKind::InputData];

// ============================================================================
// Visualizers
// ============================================================================

/// P-Matrix visualizer.
#[derive(Debug)]
pub struct PMatrix {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
    density: ParetoDensity,
}

impl PMatrix {
    /// P-Matrix with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// P-Matrix with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "P-Matrix",
                "PMatrix",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "P-Matrix",
                    "pmatrix",
                    "Data density within the Pareto radius",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            core: MatrixCore::new(settings),
            density: ParetoDensity::default(),
        }
    }

    /// Matrix settings and value range.
    #[must_use]
    pub fn core(&self) -> &MatrixCore {
        &self.core
    }

    /// Mutable matrix settings.
    pub fn settings_mut(&mut self) -> &mut MatrixSettings {
        self.core.settings_mut()
    }

    /// Radius search and density store.
    #[must_use]
    pub fn density(&self) -> &ParetoDensity {
        &self.density
    }

    /// Mutable radius settings.
    pub fn density_mut(&mut self) -> &mut ParetoDensity {
        &mut self.density
    }
}

impl Visualizer for PMatrix {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.density.clear();
    }

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        NEEDS
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section(), self.density.key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        let matrix = self.density.densities(som)?;
        self.core.render(&matrix, som, width, height)
    }
}

/// U*-Matrix visualizer.
#[derive(Debug)]
pub struct UStarMatrix {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
    density: ParetoDensity,
}

impl UStarMatrix {
    /// U*-Matrix with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// U*-Matrix with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "U*-Matrix",
                "UStarMatrix",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "U*-Matrix",
                    "ustar",
                    "U-heights scaled by local data density",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            core: MatrixCore::new(settings),
            density: ParetoDensity::default(),
        }
    }

    /// Matrix settings and value range.
    #[must_use]
    pub fn core(&self) -> &MatrixCore {
        &self.core
    }

    /// Mutable radius settings.
    pub fn density_mut(&mut self) -> &mut ParetoDensity {
        &mut self.density
    }
}

impl Visualizer for UStarMatrix {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.density.clear();
    }

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        NEEDS
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section(), self.density.key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        let p = self.density.densities(som)?;
        let u = d_matrix(som, NeighbourAggregate::Mean)?;
        self.core.render(&u_star_matrix(&u, &p), som, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::GradientFactory;
    use crate::som::{InputData, SharedInputObjects};
    use approx::assert_relative_eq;

    fn som_with_inputs() -> Som {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 4) as f64 + (i as f64) * 0.01]).collect();
        Som::from_fn(4, 1, 1, |x, _| vec![x as f64])
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_input_data(InputData::from_rows(&rows).unwrap()))
            .unwrap()
    }

    #[test]
    fn test_p_matrix_counts_within_radius() {
        let data = InputData::from_rows(&[vec![0.0], vec![0.4], vec![2.0]]).unwrap();
        let som = Som::from_fn(2, 1, 1, |x, _| vec![x as f64 * 2.0])
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_input_data(data))
            .unwrap();
        let m = p_matrix(&som, 0.5).unwrap();
        assert_eq!(m.values(), &[2.0, 1.0]);
    }

    #[test]
    fn test_u_star_scaling() {
        let u = Matrix::from_vec(1, 3, vec![0.0, 1.0, 2.0]).unwrap();
        let p = Matrix::from_vec(1, 3, vec![1.0, 1.0, 4.0]).unwrap();
        let s = u_star_matrix(&u, &p);
        // mean_p = 2, max_p = 4: scales 1.5, 1.5, 0.
        assert_relative_eq!(s.get(0, 1), 0.5 * 1.5);
        assert_relative_eq!(s.get(0, 2), 0.0);
    }

    #[test]
    fn test_u_star_constant_density_keeps_heights() {
        let u = Matrix::from_vec(1, 2, vec![0.0, 3.0]).unwrap();
        let p = Matrix::from_vec(1, 2, vec![5.0, 5.0]).unwrap();
        assert_eq!(u_star_matrix(&u, &p).values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_density_memoized_per_radius() {
        let mut density = ParetoDensity::default();
        let som = som_with_inputs();
        let auto = density.densities(&som).unwrap();
        assert!(Arc::ptr_eq(&auto, &density.densities(&som).unwrap()));
        density.set_radius_override(Some(0.3));
        let fixed = density.densities(&som).unwrap();
        assert!(!Arc::ptr_eq(&auto, &fixed));
        assert_eq!(density.densities.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_invalidate_forgets_densities() {
        let palette = Arc::new(GradientFactory::palette("grey", 16).unwrap());
        let vis = PMatrix::new(ImageCache::shared(1 << 20), palette);
        let som = som_with_inputs();
        vis.get_visualization(0, &som, 8, 8).unwrap();
        assert_eq!(vis.density.densities.lock().unwrap().len(), 1);
        assert_eq!(vis.invalidate(), 1);
        assert!(vis.density.radii.lock().unwrap().is_empty());
        assert!(vis.density.densities.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pmatrix_requires_input_data() {
        let palette = Arc::new(GradientFactory::palette("grey", 16).unwrap());
        let vis = PMatrix::new(ImageCache::shared(1 << 20), palette);
        let som = Som::new(2, 2, 1, vec![0.0; 4]).unwrap();
        let err = vis.get_visualization(0, &som, 10, 10).unwrap_err();
        assert!(err.to_string().contains("input data"), "{err}");
    }

    #[test]
    fn test_radius_in_cache_key() {
        let palette = Arc::new(GradientFactory::palette("grey", 16).unwrap());
        let mut vis = UStarMatrix::new(ImageCache::shared(1 << 20), palette);
        let som = som_with_inputs();
        let a = vis.cache_key(0, &som, 8, 8).to_string();
        vis.density_mut().set_radius_override(Some(1.5));
        let b = vis.cache_key(0, &som, 8, 8).to_string();
        assert_ne!(a, b);
        let img = vis.get_visualization(0, &som, 8, 8).unwrap();
        assert_eq!(img.width(), 8);
    }
}
