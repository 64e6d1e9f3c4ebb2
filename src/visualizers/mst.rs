//! Minimum spanning tree overlay.
//!
//! Variant 0 spans the unit weight vectors; variant 1 spans the input
//! vectors and draws each edge between the winning units of its endpoints.
//! Edges are coloured by weight through the palette. The heaviest edges can
//! be left out to expose cluster structure.

use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::mst::{prim, skip_worst_edges, Edge};
use crate::algo::stats;
use crate::cache::{ImageCache, KeySection};
use crate::error::{Error, Result};
use crate::geometry::GridLayout;
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::render::{draw_circle, draw_thick_line};
use crate::som::{InputObjectKind, Som};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Spanning tree over units or inputs.
#[derive(Debug)]
pub struct MinimumSpanningTree {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    palette: Arc<Palette>,
    skip_worst: usize,
    line_width: f64,
    trees: Mutex<HashMap<(u64, usize), Arc<Vec<Edge>>>>,
}

impl MinimumSpanningTree {
    /// Tree overlay coloured through `palette`.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Minimum Spanning Tree",
                "MST",
                VisualizerCategory::Standard,
                vec![
                    VariantInfo::new("MST (units)", "units", "Tree over the unit weight vectors"),
                    VariantInfo::new("MST (inputs)", "inputs", "Tree over the input vectors"),
                ],
            ),
            cache,
            backdrop: Backdrop::default(),
            palette,
            skip_worst: 0,
            line_width: 2.0,
            trees: Mutex::new(HashMap::new()),
        }
    }

    /// Leave out the `n` heaviest edges.
    pub fn set_skip_worst(&mut self, n: usize) {
        self.skip_worst = n;
    }

    /// Stroke width in pixels.
    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(1.0);
    }

    /// Replace the edge palette.
    pub fn set_palette(&mut self, palette: Arc<Palette>) {
        self.palette = palette;
    }

    /// Tree edges of `variant`, as unit index pairs.
    pub fn tree(&self, variant: usize, som: &Som) -> Result<Arc<Vec<Edge>>> {
        let key = (som.identity_hash(), variant);
        let mut trees = self.trees.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(t) = trees.get(&key) {
            return Ok(Arc::clone(t));
        }
        let edges = if variant == 0 {
            prim(som.unit_count(), |a, b| som.unit_distance(a, b))?
        } else {
            input_tree(som)?
        };
        let edges = Arc::new(edges);
        trees.insert(key, Arc::clone(&edges));
        Ok(edges)
    }
}

/// Spanning tree of the inputs, endpoints replaced by their winning units.
fn input_tree(som: &Som) -> Result<Vec<Edge>> {
    let data = som
        .inputs()
        .input_data
        .as_deref()
        .ok_or_else(|| Error::MissingInputObjects {
            visualizer: "Minimum Spanning Tree".to_string(),
            missing: vec![InputObjectKind::InputData.name().to_string()],
        })?;
    let edges = prim(data.len(), |a, b| {
        som.metric().distance(data.vector(a), data.vector(b))
    })?;
    let mapped = som.input_winners();
    let winner = |i: usize| -> Result<usize> {
        match mapped.get(i).copied().flatten() {
            Some(u) => Ok(u),
            None => Ok(som.best_matching_unit(data.vector(i))?.0),
        }
    };
    let mut out = Vec::with_capacity(edges.len());
    for e in edges {
        out.push(Edge {
            a: winner(e.a)?,
            b: winner(e.b)?,
            weight: e.weight,
        });
    }
    Ok(out)
}

impl Visualizer for MinimumSpanningTree {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.trees.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![KeySection::new()
            .with("skip", self.skip_worst)
            .with("lw", self.line_width)
            .with("palette", self.palette.short_name())
            .with("pal#", format!("{:x}", self.palette.content_hash()))]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_variant(variant, som)?;
        let tree = self.tree(variant, som)?;
        let edges = skip_worst_edges(&tree, self.skip_worst);
        let weights: Vec<f64> = edges.iter().map(|e| e.weight).collect();
        let (lo, hi) = stats::min_max(&weights).unwrap_or((0.0, 0.0));

        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let mut image = RasterImage::new(width, height)?;
        for e in &edges {
            if e.a == e.b {
                continue;
            }
            let t = if hi > lo { (e.weight - lo) / (hi - lo) } else { 0.0 };
            let (ax, ay) = som.coords(e.a);
            let (bx, by) = som.coords(e.b);
            draw_thick_line(
                &mut image,
                layout.unit_centre(ax, ay),
                layout.unit_centre(bx, by),
                self.line_width,
                self.palette.colour_for_value(t),
                &[],
            );
        }
        let dot = (self.line_width * 1.5).round() as i32;
        for y in 0..som.y_size() {
            for x in 0..som.x_size() {
                let c = layout.unit_centre(x, y);
                draw_circle(&mut image, c.x.round() as i32, c.y.round() as i32, dot, self.palette.colour_for_value(0.0));
            }
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::GradientFactory;
    use crate::som::{InputData, SharedInputObjects};

    fn vis() -> MinimumSpanningTree {
        MinimumSpanningTree::new(
            ImageCache::shared(1 << 20),
            Arc::new(GradientFactory::palette("grey", 16).unwrap()),
        )
    }

    #[test]
    fn test_unit_tree_spans_grid() {
        let som = Som::from_fn(3, 2, 1, |x, y| vec![(x + 10 * y) as f64]).unwrap();
        let tree = vis().tree(0, &som).unwrap();
        assert_eq!(tree.len(), 5);
        // Horizontal neighbours are the cheap edges.
        assert_eq!(tree.iter().filter(|e| (e.weight - 1.0).abs() < 1e-12).count(), 4);
    }

    #[test]
    fn test_input_tree_maps_to_winners() {
        let data = InputData::from_rows(&[vec![0.0], vec![0.1], vec![5.0]]).unwrap();
        let som = Som::from_fn(2, 1, 1, |x, _| vec![x as f64 * 5.0])
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_input_data(data))
            .unwrap();
        let tree = vis().tree(1, &som).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.iter().any(|e| e.a == e.b));
        assert!(tree.iter().any(|e| e.a != e.b));
    }

    #[test]
    fn test_skip_in_key_and_tree_memoized() {
        let mut v = vis();
        let som = Som::from_fn(2, 2, 1, |x, y| vec![(x + y) as f64]).unwrap();
        let t = v.tree(0, &som).unwrap();
        let k1 = v.cache_key(0, &som, 10, 10).to_string();
        v.set_skip_worst(1);
        assert_ne!(k1, v.cache_key(0, &som, 10, 10).to_string());
        assert!(Arc::ptr_eq(&t, &v.tree(0, &som).unwrap()));
        let img = v.get_visualization(0, &som, 10, 10).unwrap();
        assert!(img.pixels().chunks(4).any(|p| p[3] > 0));
    }

    #[test]
    fn test_invalidate_forgets_trees() {
        let v = vis();
        let som = Som::from_fn(2, 2, 1, |x, y| vec![(x + y) as f64]).unwrap();
        v.get_visualization(0, &som, 10, 10).unwrap();
        assert_eq!(v.trees.lock().unwrap().len(), 1);
        assert_eq!(v.invalidate(), 1);
        assert!(v.trees.lock().unwrap().is_empty());
    }

    #[test]
    fn test_input_variant_requires_data() {
        let som = Som::new(2, 1, 1, vec![0.0, 1.0]).unwrap();
        assert!(matches!(
            vis().get_visualization(1, &som, 8, 8),
            Err(Error::MissingInputObjects { .. })
        ));
    }
}
