//! Quality measure maps: quantization error and topographic error.

use super::matrix::{Matrix, MatrixCore, MatrixSettings};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::cache::{ImageCache, KeySection};
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::{InputData, InputObjectKind, Som};
use std::sync::Arc;

const NEEDS: &[InputObjectKind] = &[InputObjectKind::InputData];

fn input_data<'a>(som: &'a Som, visualizer: &str) -> Result<&'a InputData> {
    som.inputs()
        .input_data
        .as_deref()
        .ok_or_else(|| Error::MissingInputObjects {
            visualizer: visualizer.to_string(),
            missing: vec![InputObjectKind::InputData.name().to_string()],
        })
}

/// Summed (or with `mean`, averaged) distance of the mapped inputs to each unit.
pub fn quantization_error(som: &Som, mean: bool) -> Result<Matrix> {
    let data = input_data(som, "Quantization Error")?;
    Matrix::from_units(som, |x, y| {
        let mapped = som.mapped_inputs(x, y);
        let mut total = 0.0;
        for &i in mapped {
            total += som.metric().distance(som.weight(x, y), data.vector(i))?;
        }
        Ok(if mean && !mapped.is_empty() {
            total / mapped.len() as f64
        } else {
            total
        })
    })
}

/// Number of mapped inputs whose second best unit is not a 4-neighbour of the winner.
pub fn topographic_error(som: &Som) -> Result<Matrix> {
    let data = input_data(som, "Topographic Error")?;
    Matrix::from_units(som, |x, y| {
        let mut errors = 0usize;
        for &i in som.mapped_inputs(x, y) {
            let best = som.best_matching_units(data.vector(i), 2)?;
            if let Some(&(second, _)) = best.get(1) {
                let adjacent = som.neighbours4(x, y).any(|n| som.index(n.0, n.1) == second);
                if !adjacent {
                    errors += 1;
                }
            }
        }
        Ok(errors as f64)
    })
}

/// Quantization error per unit, total or mean.
#[derive(Debug)]
pub struct QuantizationError {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl QuantizationError {
    /// Visualizer with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Visualizer with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Quantization Error",
                "QuantizationError",
                VisualizerCategory::QualityMeasure,
                vec![
                    VariantInfo::new("Quantization Error", "qe", "Summed distance of mapped inputs"),
                    VariantInfo::new("Mean Quantization Error", "mqe", "Mean distance of mapped inputs"),
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

impl Visualizer for QuantizationError {
    visualizer_plumbing!();

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        NEEDS
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        let matrix = quantization_error(som, variant == 1)?;
        self.core.render(&matrix, som, width, height)
    }
}

/// Topographic error per unit.
#[derive(Debug)]
pub struct TopographicError {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl TopographicError {
    /// Visualizer with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Visualizer with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Topographic Error",
                "TopographicError",
                VisualizerCategory::QualityMeasure,
                vec![VariantInfo::new(
                    "Topographic Error",
                    "te",
                    "Inputs whose two best units are not adjacent",
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

impl Visualizer for TopographicError {
    visualizer_plumbing!();

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        NEEDS
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        self.core.render(&topographic_error(som)?, som, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::som::SharedInputObjects;
    use approx::assert_relative_eq;

    fn mapped_som(rows: &[Vec<f64>], weights: Vec<f64>, x_size: usize) -> Som {
        let data = InputData::from_rows(rows).unwrap();
        Som::new(x_size, 1, 1, weights)
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_input_data(data))
            .unwrap()
            .map_inputs()
            .unwrap()
    }

    #[test]
    fn test_quantization_error_total_and_mean() {
        let som = mapped_som(&[vec![0.5], vec![-0.5], vec![10.0]], vec![0.0, 10.0], 2);
        let total = quantization_error(&som, false).unwrap();
        assert_relative_eq!(total.get(0, 0), 1.0);
        assert_relative_eq!(total.get(0, 1), 0.0);
        let mean = quantization_error(&som, true).unwrap();
        assert_relative_eq!(mean.get(0, 0), 0.5);
    }

    #[test]
    fn test_topographic_error_counts_non_adjacent() {
        // Units at 0, 10, 1: input 0.4 wins unit 0 and is second closest to unit 2.
        let som = mapped_som(&[vec![0.4], vec![9.0]], vec![0.0, 10.0, 1.0], 3);
        let te = topographic_error(&som).unwrap();
        assert_relative_eq!(te.get(0, 0), 1.0);
        assert_relative_eq!(te.get(0, 1), 0.0);
    }

    #[test]
    fn test_mapping_beyond_inputs_rejected() {
        let som = mapped_som(&[vec![0.5], vec![-0.5], vec![10.0]], vec![0.0, 10.0, 20.0], 3);
        assert!(matches!(
            som.clone().with_mapping(vec![vec![0, 7], vec![1], vec![2]]),
            Err(Error::InputIndex { index: 7, count: 3 })
        ));
        let remapped = som.with_mapping(vec![vec![0, 1], vec![2], vec![]]).unwrap();
        let palette = Arc::new(crate::palette::GradientFactory::palette("grey", 16).unwrap());
        let vis = QuantizationError::new(ImageCache::shared(1 << 20), palette);
        assert!(vis.get_visualization(0, &remapped, 30, 10).is_ok());
    }

    #[test]
    fn test_missing_input_data() {
        let som = Som::new(1, 1, 1, vec![0.0]).unwrap();
        assert!(matches!(
            quantization_error(&som, false),
            Err(Error::MissingInputObjects { .. })
        ));
    }
}
