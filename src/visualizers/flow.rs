//! Flow and borderline overlays.
//!
//! For unit `i` every other unit `j` contributes
//! `c = s · d_feature(i, j) - d_grid(i, j)`, where `s` rescales feature
//! distances to the mean grid distance. Contributions are weighted by a
//! Gaussian over grid distance and by the share of the offset along each
//! axis, and averaged separately over the `+x`, `-x`, `+y` and `-y` sides.
//! The flow component along an axis is `avg(-) - avg(+)`: it points towards
//! the side whose prototypes are relatively closer.
//!
//! All components are divided by the largest positive component; negative
//! components are not considered for the scale and may exceed 1 in
//! magnitude.

use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::cache::{ImageCache, KeySection};
use crate::color::Rgba;
use crate::error::Result;
use crate::geometry::{GridLayout, Point};
use crate::image::RasterImage;
use crate::render::{draw_arrow, draw_thick_line};
use crate::som::Som;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Default kernel bandwidth in grid units.
pub const DEFAULT_SIGMA: f64 = 1.0;

/// Per-unit flow vectors for one kernel width.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    x_size: usize,
    vectors: Vec<Point>,
}

#[derive(Default, Clone, Copy)]
struct SideSums {
    weighted: f64,
    weight: f64,
}

impl SideSums {
    fn add(&mut self, w: f64, c: f64) {
        self.weighted += w * c;
        self.weight += w;
    }

    fn average(self) -> f64 {
        if self.weight > 0.0 {
            self.weighted / self.weight
        } else {
            0.0
        }
    }
}

impl FlowField {
    /// Flow field of `som` for Gaussian bandwidth `sigma`.
    ///
    /// # Errors
    ///
    /// Propagates metric failures.
    pub fn compute(som: &Som, sigma: f64) -> Result<Self> {
        let n = som.unit_count();
        info!("computing flow field for {n} units, sigma {sigma}");
        let pos = |i: usize| {
            let (x, y) = som.coords(i);
            Point::new(x as f64, y as f64)
        };

        let mut feature = vec![0.0; n * n];
        let (mut sum_f, mut sum_g) = (0.0, 0.0);
        for i in 0..n {
            for j in (i + 1)..n {
                let f = som.unit_distance(i, j)?;
                feature[i * n + j] = f;
                feature[j * n + i] = f;
                sum_f += f;
                sum_g += pos(i).distance(pos(j));
            }
        }
        let scale = if sum_f > 0.0 { sum_g / sum_f } else { 0.0 };
        let two_sigma_sq = 2.0 * sigma.max(f64::EPSILON).powi(2);

        let mut raw = Vec::with_capacity(n);
        for i in 0..n {
            let (mut px, mut nx, mut py, mut ny) = (
                SideSums::default(),
                SideSums::default(),
                SideSums::default(),
                SideSums::default(),
            );
            for j in 0..n {
                if i == j {
                    continue;
                }
                let offset = pos(j) - pos(i);
                let g = offset.norm();
                let kernel = (-(g * g) / two_sigma_sq).exp();
                let c = scale * feature[i * n + j] - g;
                let wx = kernel * offset.x.abs() / g;
                let wy = kernel * offset.y.abs() / g;
                if offset.x > 0.0 {
                    px.add(wx, c);
                } else if offset.x < 0.0 {
                    nx.add(wx, c);
                }
                if offset.y > 0.0 {
                    py.add(wy, c);
                } else if offset.y < 0.0 {
                    ny.add(wy, c);
                }
            }
            let has_x = px.weight > 0.0 && nx.weight > 0.0;
            let has_y = py.weight > 0.0 && ny.weight > 0.0;
            raw.push(Point::new(
                if has_x { nx.average() - px.average() } else { 0.0 },
                if has_y { ny.average() - py.average() } else { 0.0 },
            ));
        }

        let max_positive = raw
            .iter()
            .flat_map(|p| [p.x, p.y])
            .filter(|v| *v > 0.0)
            .fold(0.0, f64::max);
        let vectors = if max_positive > 0.0 {
            raw.into_iter().map(|p| p * (1.0 / max_positive)).collect()
        } else {
            raw
        };
        Ok(Self {
            x_size: som.x_size(),
            vectors,
        })
    }

    /// Flow vector of unit `(x, y)`.
    #[must_use]
    pub fn vector(&self, x: usize, y: usize) -> Point {
        self.vectors[y * self.x_size + x]
    }

    /// All vectors, row-major.
    #[must_use]
    pub fn vectors(&self) -> &[Point] {
        &self.vectors
    }
}

/// Arrows along the flow, borderlines across it, or both.
#[derive(Debug)]
pub struct FlowBorderline {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    sigma: f64,
    line_width: f64,
    flow_colour: Rgba,
    border_colour: Rgba,
    flows: Mutex<HashMap<(u64, u64), Arc<FlowField>>>,
}

impl FlowBorderline {
    /// Visualizer with the default bandwidth.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Flow & Borderline",
                "FlowBorderline",
                VisualizerCategory::Standard,
                vec![
                    VariantInfo::new("Flow", "flow", "Arrows towards similar prototypes"),
                    VariantInfo::new("Borderline", "borderline", "Lines across the flow"),
                    VariantInfo::new("Flow & Borderline", "both", "Arrows and borderlines"),
                ],
            ),
            cache,
            backdrop: Backdrop::default(),
            sigma: DEFAULT_SIGMA,
            line_width: 2.0,
            flow_colour: Rgba::BLACK,
            border_colour: Rgba::RED,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Kernel bandwidth.
    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Change the kernel bandwidth; fields for other widths stay memoized.
    pub fn set_sigma(&mut self, sigma: f64) {
        self.sigma = sigma.max(f64::EPSILON);
    }

    /// Stroke width in pixels.
    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(1.0);
    }

    /// Forget every computed flow field.
    pub fn clear_flows(&self) {
        self.flows.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Flow field of `som` at the current bandwidth.
    pub fn flow_field(&self, som: &Som) -> Result<Arc<FlowField>> {
        let key = (som.identity_hash(), self.sigma.to_bits());
        let mut flows = self.flows.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(f) = flows.get(&key) {
            return Ok(Arc::clone(f));
        }
        let field = Arc::new(FlowField::compute(som, self.sigma)?);
        flows.insert(key, Arc::clone(&field));
        Ok(field)
    }
}

impl Visualizer for FlowBorderline {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.clear_flows();
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![KeySection::new()
            .with("sigma", self.sigma)
            .with("lw", self.line_width)
            .with("flow", self.flow_colour)
            .with("border", self.border_colour)]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_variant(variant, som)?;
        let field = self.flow_field(som)?;
        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let reach = layout.unit_size() * 0.45;
        let mut image = RasterImage::new(width, height)?;

        for y in 0..som.y_size() {
            for x in 0..som.x_size() {
                let centre = layout.unit_centre(x, y);
                let v = field.vector(x, y);
                let length = v.norm().min(1.0);
                if length < 1e-9 {
                    continue;
                }
                let dir = v * (1.0 / v.norm());
                if variant != 0 {
                    let across = dir.perpendicular() * (reach * length);
                    draw_thick_line(
                        &mut image,
                        centre - across,
                        centre + across,
                        self.line_width,
                        self.border_colour,
                        &[],
                    );
                }
                if variant != 1 {
                    draw_arrow(&mut image, centre, centre + dir * (reach * length), self.line_width, self.flow_colour);
                }
            }
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight groups along x: columns 0-1 and 2-3.
    fn two_clusters() -> Som {
        Som::from_fn(4, 1, 1, |x, _| vec![if x < 2 { x as f64 * 0.1 } else { 10.0 + x as f64 * 0.1 }]).unwrap()
    }

    #[test]
    fn test_flow_points_into_clusters() {
        let field = FlowField::compute(&two_clusters(), 1.0).unwrap();
        // Unit 1 has its similar neighbour on the left, unit 2 on the right.
        assert!(field.vector(1, 0).x < 0.0);
        assert!(field.vector(2, 0).x > 0.0);
        // Edge units have no opposite side.
        assert_eq!(field.vector(0, 0), Point::ORIGIN);
    }

    #[test]
    fn test_positive_maximum_is_one() {
        let field = FlowField::compute(&two_clusters(), 1.0).unwrap();
        let max = field
            .vectors()
            .iter()
            .flat_map(|p| [p.x, p.y])
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_map_has_no_flow() {
        let som = Som::from_fn(3, 3, 2, |x, y| vec![x as f64, y as f64]).unwrap();
        let field = FlowField::compute(&som, 1.0).unwrap();
        assert!(field.vector(1, 1).norm() < 1e-9);
    }

    #[test]
    fn test_flows_memoized_per_sigma() {
        let mut vis = FlowBorderline::new(ImageCache::shared(1 << 20));
        let som = two_clusters();
        let a = vis.flow_field(&som).unwrap();
        assert!(Arc::ptr_eq(&a, &vis.flow_field(&som).unwrap()));
        vis.set_sigma(2.0);
        let b = vis.flow_field(&som).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        vis.clear_flows();
        assert!(vis.flows.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalidate_forgets_flows() {
        let vis = FlowBorderline::new(ImageCache::shared(1 << 20));
        let som = two_clusters();
        vis.get_visualization(0, &som, 16, 16).unwrap();
        assert_eq!(vis.flows.lock().unwrap().len(), 1);
        assert_eq!(vis.invalidate(), 1);
        assert!(vis.flows.lock().unwrap().is_empty());
    }

    #[test]
    fn test_variants_draw_different_overlays() {
        let vis = FlowBorderline::new(ImageCache::shared(1 << 20));
        let som = two_clusters();
        let flow = vis.get_visualization(0, &som, 80, 20).unwrap();
        let border = vis.get_visualization(1, &som, 80, 20).unwrap();
        let both = vis.get_visualization(2, &som, 80, 20).unwrap();
        let painted = |img: &RasterImage| img.pixels().chunks(4).filter(|p| p[3] > 0).count();
        assert!(painted(&flow) > 0);
        assert!(painted(&border) > 0);
        assert!(painted(&both) >= painted(&flow));
        assert_ne!(flow.pixels(), border.pixels());
    }
}
