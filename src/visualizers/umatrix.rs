//! U-Matrix and D-Matrix.
//!
//! The U-Matrix lives on a `(2Y - 1) × (2X - 1)` grid. With `r` the row and
//! `c` the column:
//!
//! | `r` | `c` | cell |
//! |-----|-----|------|
//! | even | odd | distance to the right neighbour |
//! | odd | even | distance to the lower neighbour |
//! | odd | odd | `(d1 + d2) / (2√2)` over both diagonals |
//! | even | even | median of the 2, 3 or 4 adjacent distance cells |
//!
//! The D-Matrix keeps one cell per unit, aggregating the distances to the
//! 4-neighbours.

use super::matrix::{Matrix, MatrixCore, MatrixSettings};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::stats;
use crate::cache::{ImageCache, KeySection};
use crate::error::Result;
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::Som;
use std::f64::consts::SQRT_2;
use std::sync::Arc;

/// U-Matrix at doubled resolution.
///
/// # Errors
///
/// Propagates metric failures.
pub fn u_matrix(som: &Som) -> Result<Matrix> {
    let cols = 2 * som.x_size() - 1;
    let rows = 2 * som.y_size() - 1;
    let mut m = Matrix::zeros(rows, cols)?;

    for r in 0..rows {
        for c in 0..cols {
            let (x, y) = (c / 2, r / 2);
            let value = match (r % 2, c % 2) {
                (0, 1) => som.unit_distance_xy((x, y), (x + 1, y))?,
                (1, 0) => som.unit_distance_xy((x, y), (x, y + 1))?,
                (1, 1) => {
                    let d1 = som.unit_distance_xy((x, y), (x + 1, y + 1))?;
                    let d2 = som.unit_distance_xy((x + 1, y), (x, y + 1))?;
                    (d1 + d2) / (2.0 * SQRT_2)
                }
                _ => continue,
            };
            m.set(r, c, value);
        }
    }

    for r in (0..rows).step_by(2) {
        for c in (0..cols).step_by(2) {
            let mut around = Vec::with_capacity(4);
            if c > 0 {
                around.push(m.get(r, c - 1));
            }
            if c + 1 < cols {
                around.push(m.get(r, c + 1));
            }
            if r > 0 {
                around.push(m.get(r - 1, c));
            }
            if r + 1 < rows {
                around.push(m.get(r + 1, c));
            }
            let value = if around.is_empty() { 0.0 } else { stats::median(&around) };
            m.set(r, c, value);
        }
    }
    Ok(m)
}

/// How a D-Matrix cell summarizes the distances to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighbourAggregate {
    /// Median; equals the unit cells of the U-Matrix.
    Median,
    /// Arithmetic mean.
    Mean,
    /// Smallest distance.
    Minimum,
    /// Largest distance.
    Maximum,
}

impl NeighbourAggregate {
    /// Variant order of [`DMatrix`].
    pub const ALL: [Self; 4] = [Self::Median, Self::Mean, Self::Minimum, Self::Maximum];

    fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Median => stats::median(values),
            Self::Mean => stats::mean(values),
            Self::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Per-unit aggregate of the distances to the 4-neighbours.
pub fn d_matrix(som: &Som, aggregate: NeighbourAggregate) -> Result<Matrix> {
    Matrix::from_units(som, |x, y| {
        let distances = som
            .neighbours4(x, y)
            .map(|n| som.unit_distance_xy((x, y), n))
            .collect::<Result<Vec<_>>>()?;
        Ok(aggregate.apply(&distances))
    })
}

// ============================================================================
// Visualizers
// ============================================================================

/// U-Matrix visualizer.
#[derive(Debug)]
pub struct UMatrix {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl UMatrix {
    /// U-Matrix with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// U-Matrix with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "U-Matrix",
                "UMatrix",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "U-Matrix",
                    "umatrix",
                    "Distances between adjacent units",
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

    /// Mutable matrix settings.
    pub fn settings_mut(&mut self) -> &mut MatrixSettings {
        self.core.settings_mut()
    }
}

impl Visualizer for UMatrix {
    visualizer_plumbing!();

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        let matrix = u_matrix(som)?;
        self.core.render(&matrix, som, width, height)
    }
}

/// D-Matrix visualizer; one variant per [`NeighbourAggregate`].
#[derive(Debug)]
pub struct DMatrix {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl DMatrix {
    /// D-Matrix with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// D-Matrix with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "D-Matrix",
                "DMatrix",
                VisualizerCategory::Standard,
                vec![
                    VariantInfo::new("D-Matrix", "median", "Median distance to the neighbours"),
                    VariantInfo::new("D-Matrix (mean)", "mean", "Mean distance to the neighbours"),
                    VariantInfo::new("D-Matrix (min)", "min", "Smallest distance to a neighbour"),
                    VariantInfo::new("D-Matrix (max)", "max", "Largest distance to a neighbour"),
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

    /// Mutable matrix settings.
    pub fn settings_mut(&mut self) -> &mut MatrixSettings {
        self.core.settings_mut()
    }
}

impl Visualizer for DMatrix {
    visualizer_plumbing!();

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_variant(variant, som)?;
        let matrix = d_matrix(som, NeighbourAggregate::ALL[variant])?;
        self.core.render(&matrix, som, width, height)
    }
}
