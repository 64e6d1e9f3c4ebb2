//! Cluster-gap overlay.
//!
//! A wall is drawn on the shared edge of two adjacent units when their
//! distance exceeds `factor` times the mean neighbour distance of both
//! units.

use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::stats;
use crate::cache::{ImageCache, KeySection};
use crate::color::Rgba;
use crate::error::Result;
use crate::geometry::{GridLayout, Point};
use crate::image::RasterImage;
use crate::render::draw_thick_line;
use crate::som::Som;
use std::sync::Arc;

/// Default gap factor.
pub const DEFAULT_GAP_FACTOR: f64 = 1.5;

/// Adjacent unit pairs `(a, b)` (row-major indices, `b` right of or below `a`)
/// separated by a gap.
pub fn gap_edges(som: &Som, factor: f64) -> Result<Vec<(usize, usize)>> {
    let mut means = Vec::with_capacity(som.unit_count());
    for y in 0..som.y_size() {
        for x in 0..som.x_size() {
            let d = som
                .neighbours4(x, y)
                .map(|n| som.unit_distance_xy((x, y), n))
                .collect::<Result<Vec<_>>>()?;
            means.push(if d.is_empty() { 0.0 } else { stats::mean(&d) });
        }
    }

    let mut gaps = Vec::new();
    for y in 0..som.y_size() {
        for x in 0..som.x_size() {
            let a = som.index(x, y);
            let right = (x + 1 < som.x_size()).then(|| som.index(x + 1, y));
            let below = (y + 1 < som.y_size()).then(|| som.index(x, y + 1));
            for b in [right, below].into_iter().flatten() {
                let d = som.unit_distance(a, b)?;
                if d > factor * means[a] && d > factor * means[b] {
                    gaps.push((a, b));
                }
            }
        }
    }
    Ok(gaps)
}

/// Walls between units that sit across a gap.
#[derive(Debug)]
pub struct ClusterGap {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    factor: f64,
    line_width: f64,
    colour: Rgba,
}

impl ClusterGap {
    /// Overlay with the default factor.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Cluster Gaps",
                "ClusterGap",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "Cluster Gaps",
                    "gaps",
                    "Walls between dissimilar neighbours",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            factor: DEFAULT_GAP_FACTOR,
            line_width: 3.0,
            colour: Rgba::BLACK,
        }
    }

    /// Set the gap factor.
    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor.max(0.0);
    }

    /// Gap factor.
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl Visualizer for ClusterGap {
    visualizer_plumbing!();

    fn cache_params(&self) -> Vec<KeySection> {
        vec![KeySection::new()
            .with("factor", self.factor)
            .with("lw", self.line_width)
            .with("colour", self.colour)]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let mut image = RasterImage::new(width, height)?;
        for (a, b) in gap_edges(som, self.factor)? {
            let (ax, ay) = som.coords(a);
            let (bx, _) = som.coords(b);
            let (from, to) = if bx > ax {
                let x = (ax + 1) as f64 * layout.unit_width;
                (
                    Point::new(x, ay as f64 * layout.unit_height),
                    Point::new(x, (ay + 1) as f64 * layout.unit_height),
                )
            } else {
                let y = (ay + 1) as f64 * layout.unit_height;
                (
                    Point::new(ax as f64 * layout.unit_width, y),
                    Point::new((ax + 1) as f64 * layout.unit_width, y),
                )
            };
            draw_thick_line(&mut image, from, to, self.line_width, self.colour, &[]);
        }
        Ok(image)
    }
}
