//! Hit histogram and component planes.

use super::matrix::{hit_histogram, Matrix, MatrixCore, MatrixSettings};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::cache::{ImageCache, KeySection};
use crate::error::Result;
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::Som;
use std::sync::Arc;

/// Hits per unit, linear or `ln(1 + hits)`.
#[derive(Debug)]
pub struct HitHistogram {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl HitHistogram {
    /// Hit histogram with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Hit histogram with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Hit Histogram",
                "HitHistogram",
                VisualizerCategory::Standard,
                vec![
                    VariantInfo::new("Hit Histogram", "linear", "Number of inputs per unit"),
                    VariantInfo::new("Hit Histogram (log)", "log", "Logarithm of the inputs per unit"),
                ],
            ),
            cache,
            backdrop: Backdrop::default(),
            core: MatrixCore::new(settings),
        }
    }

    /// Matrix settings and value range.
    #[must_use]
    pub fn core(&self) -> &MatrixCore {
        &self.core
    }
}

impl Visualizer for HitHistogram {
    visualizer_plumbing!();

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        let mut matrix = hit_histogram(som)?;
        if variant == 1 {
            for r in 0..matrix.rows() {
                for c in 0..matrix.cols() {
                    matrix.set(r, c, matrix.get(r, c).ln_1p());
                }
            }
        }
        self.core.render(&matrix, som, width, height)
    }
}

/// Component `i` of every weight vector.
pub fn component_plane(som: &Som, component: usize) -> Result<Matrix> {
    Matrix::from_units(som, |x, y| Ok(som.weight(x, y)[component]))
}

/// Name of component `i`: the template label if present.
#[must_use]
pub fn component_label(som: &Som, component: usize) -> String {
    som.inputs()
        .template_vector
        .as_ref()
        .and_then(|t| t.label(component).map(str::to_string))
        .unwrap_or_else(|| format!("Component {}", component + 1))
}

/// One plane per weight vector component.
#[derive(Debug)]
pub struct ComponentPlanes {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl ComponentPlanes {
    /// Component planes with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Component planes with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Component Planes",
                "ComponentPlanes",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "Component Plane",
                    "component",
                    "Weight values of one component",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            core: MatrixCore::new(settings),
        }
    }

    /// Matrix settings and value range.
    #[must_use]
    pub fn core(&self) -> &MatrixCore {
        &self.core
    }
}

impl Visualizer for ComponentPlanes {
    visualizer_plumbing!();

    fn variant_count(&self, som: &Som) -> usize {
        som.dim()
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_variant(variant, som)?;
        self.core.render(&component_plane(som, variant)?, som, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::error::Error;
    use crate::palette::GradientFactory;
    use crate::som::{SharedInputObjects, TemplateVector};

    fn grey() -> MatrixSettings {
        MatrixSettings {
            interpolate: false,
            ..MatrixSettings::new(Arc::new(GradientFactory::palette("grey", 256).unwrap()))
        }
    }

    #[test]
    fn test_log_hits() {
        let som = Som::new(2, 1, 1, vec![0.0, 1.0])
            .unwrap()
            .with_mapping(vec![vec![], (0..9).collect()])
            .unwrap();
        let vis = HitHistogram::with_settings(ImageCache::shared(1 << 20), grey());
        let img = vis.get_visualization(1, &som, 20, 10).unwrap();
        assert_eq!(img.get_pixel(15, 5), Some(Rgba::WHITE));
        assert_eq!(img.get_pixel(5, 5), Some(Rgba::BLACK));
        assert!((vis.core().maximum_matrix_value().unwrap() - 10f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_component_planes_one_variant_per_dimension() {
        let som = Som::from_fn(2, 2, 3, |x, y| vec![x as f64, y as f64, 1.0]).unwrap();
        let vis = ComponentPlanes::with_settings(ImageCache::shared(1 << 20), grey());
        assert_eq!(vis.variant_count(&som), 3);
        let img = vis.get_visualization(1, &som, 10, 10).unwrap();
        assert_eq!(img.get_pixel(2, 8), Some(Rgba::WHITE));
        assert!(matches!(
            vis.get_visualization(3, &som, 10, 10),
            Err(Error::IllegalVariant { count: 3, .. })
        ));
    }

    #[test]
    fn test_component_label_from_template() {
        let som = Som::from_fn(1, 1, 2, |_, _| vec![0.0, 0.0])
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_template_vector(TemplateVector::new(vec![
                "age".to_string(),
                "income".to_string(),
            ])))
            .unwrap();
        assert_eq!(component_label(&som, 1), "income");
        let bare = Som::new(1, 1, 2, vec![0.0, 0.0]).unwrap();
        assert_eq!(component_label(&bare, 0), "Component 1");
    }
}
