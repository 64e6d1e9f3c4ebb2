//! Metro map visualizer.
//!
//! Every weight component becomes a line through the grid positions of its
//! value bins, lowest values first. Three optional transforms run in order:
//!
//! 1. [`selection`]: keep the components that vary most between regions.
//! 2. [`aggregation`]: merge similar lines by Ward clustering.
//! 3. [`snapping`]: move the lines onto the unit grid with octilinear segments.
//!
//! Lines are drawn in one of 20 styles (5 dash patterns × 4 thicknesses)
//! with colours cycling through the palette. Stations mark points shared by
//! several lines, repeated stops and direction changes. When snapping is on,
//! lines that leave a grid point in the same direction are spread apart.

pub mod aggregation;
pub mod bins;
pub mod selection;
pub mod snapping;

pub use aggregation::{cluster_lines, merge_clusters, Aggregation, LineDistance};
pub use bins::{bin_centres, component_lines, fill_empty_bins, ComponentLine};
pub use selection::{component_goodness, select_components, Selection};
pub use snapping::{direction_index, snap_line, DIRECTIONS};

use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::ward::Dendrogram;
use crate::cache::{ImageCache, KeySection};
use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::geometry::{GridLayout, Point};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::render::{draw_circle, draw_thick_line};
use crate::som::Som;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Default number of value bins per component.
pub const DEFAULT_BINS: usize = 6;

/// Default region split used for selection goodness.
pub const DEFAULT_REGIONS: usize = 2;

/// Number of palette samples lines cycle through.
const LINE_COLOURS: usize = 10;

/// Dash patterns in pixels, relative to a line width of one.
const DASHES: [&[f64]; 5] = [
    &[],
    &[6.0, 3.0],
    &[2.0, 2.0],
    &[6.0, 2.0, 2.0, 2.0],
    &[1.0, 3.0],
];

/// Thickness factors applied on top of the line width.
const THICKNESS: [f64; 4] = [1.0, 1.5, 0.75, 2.0];

/// Cosine above which two segments count as one direction.
const STRAIGHT_COS: f64 = 0.966;

type DendrogramKey = (u64, usize, LineDistance, String);

/// Dash pattern and thickness factor of style `index`.
#[must_use]
pub fn line_style(index: usize) -> (&'static [f64], f64) {
    let index = index % (DASHES.len() * THICKNESS.len());
    (DASHES[index % DASHES.len()], THICKNESS[index / DASHES.len()])
}

/// Component lines as metro lines.
#[derive(Debug)]
pub struct MetroMap {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    palette: Arc<Palette>,
    bins: usize,
    regions: usize,
    selection: Selection,
    aggregation: Aggregation,
    line_distance: LineDistance,
    snapping: bool,
    line_width: f64,
    workers: usize,
    dendrograms: Mutex<HashMap<DendrogramKey, Arc<Dendrogram>>>,
}

impl MetroMap {
    /// Metro map with every component and no transforms.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Metro Map",
                "MetroMap",
                VisualizerCategory::Standard,
                vec![VariantInfo::new(
                    "Metro Map",
                    "metro",
                    "Lines through the grid positions of component value bins",
                )],
            ),
            cache,
            backdrop: Backdrop::default(),
            palette,
            bins: DEFAULT_BINS,
            regions: DEFAULT_REGIONS,
            selection: Selection::All,
            aggregation: Aggregation::None,
            line_distance: LineDistance::Euclidean,
            snapping: false,
            line_width: 3.0,
            workers: 1,
            dendrograms: Mutex::new(HashMap::new()),
        }
    }

    /// Ward clustering worker threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the number of bins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMode`] for zero bins.
    pub fn set_bins(&mut self, bins: usize) -> Result<()> {
        if bins == 0 {
            return Err(Error::InvalidMode("metro map needs at least one bin".to_string()));
        }
        self.bins = bins;
        Ok(())
    }

    /// Number of bins.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Region split per axis used for selection goodness.
    pub fn set_regions(&mut self, regions: usize) {
        self.regions = regions.max(1);
    }

    /// Set the component selection.
    pub fn set_selection(&mut self, selection: Selection) -> Result<()> {
        self.selection = selection.validate()?;
        Ok(())
    }

    /// Set the line aggregation.
    pub fn set_aggregation(&mut self, aggregation: Aggregation) -> Result<()> {
        self.aggregation = aggregation.validate()?;
        Ok(())
    }

    /// Distance used to cluster lines.
    pub fn set_line_distance(&mut self, distance: LineDistance) {
        self.line_distance = distance;
    }

    /// Toggle grid snapping.
    pub fn set_snapping(&mut self, snapping: bool) {
        self.snapping = snapping;
    }

    /// Base stroke width in pixels.
    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(1.0);
    }

    /// Replace the line palette.
    pub fn set_palette(&mut self, palette: Arc<Palette>) {
        self.palette = palette;
    }

    /// Lines after selection, aggregation and snapping.
    pub fn lines(&self, som: &Som) -> Result<Vec<ComponentLine>> {
        let mut lines = component_lines(som, self.bins)?;
        if self.selection != Selection::All {
            let goodness = component_goodness(som, self.regions);
            let keep = select_components(&goodness, self.selection)?;
            lines.retain(|l| l.components.iter().any(|c| keep.contains(c)));
        }
        if self.aggregation != Aggregation::None && lines.len() > 1 {
            let dendrogram = self.dendrogram(som, &lines)?;
            let k = self.aggregation.cluster_count(&dendrogram);
            lines = merge_clusters(&lines, &dendrogram.cut(k));
        }
        if self.snapping {
            for line in &mut lines {
                line.points = snap_line(&line.points, som.x_size(), som.y_size());
            }
        }
        Ok(lines)
    }

    /// Clustering of `lines` cached per map, bins, distance and selection.
    fn dendrogram(&self, som: &Som, lines: &[ComponentLine]) -> Result<Arc<Dendrogram>> {
        let key = (
            som.identity_hash(),
            self.bins,
            self.line_distance,
            format!("{}/{}", self.selection, self.regions),
        );
        let mut dendrograms = self.dendrograms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(d) = dendrograms.get(&key) {
            return Ok(Arc::clone(d));
        }
        debug!("clustering {} metro lines by {}", lines.len(), self.line_distance);
        let dendrogram = Arc::new(cluster_lines(lines, self.line_distance, self.workers)?);
        dendrograms.insert(key, Arc::clone(&dendrogram));
        Ok(dendrogram)
    }

    fn line_colours(&self) -> Vec<Rgba> {
        (0..LINE_COLOURS)
            .map(|i| self.palette.colour_for_value(i as f64 / (LINE_COLOURS - 1) as f64))
            .collect()
    }
}

/// Grid key of a point, stable under float noise.
fn grid_key(p: Point) -> (i64, i64) {
    ((p.x * 1000.0).round() as i64, (p.y * 1000.0).round() as i64)
}

/// Points that get a station.
#[must_use]
pub fn stations(lines: &[ComponentLine]) -> Vec<Point> {
    let mut visits: BTreeMap<(i64, i64), (Point, Vec<usize>)> = BTreeMap::new();
    let mut marked: BTreeMap<(i64, i64), Point> = BTreeMap::new();
    for (l, line) in lines.iter().enumerate() {
        for (i, p) in line.points.iter().enumerate() {
            let entry = visits.entry(grid_key(*p)).or_insert_with(|| (*p, Vec::new()));
            if entry.1.contains(&l) {
                // Repeated stop on the same line.
                marked.insert(grid_key(*p), *p);
            } else {
                entry.1.push(l);
            }
            if i == 0 || i + 1 == line.points.len() {
                continue;
            }
            let incoming = *p - line.points[i - 1];
            let outgoing = line.points[i + 1] - *p;
            let (a, b) = (incoming.norm(), outgoing.norm());
            if a > 1e-9 && b > 1e-9 {
                let cos = (incoming.x * outgoing.x + incoming.y * outgoing.y) / (a * b);
                if cos < STRAIGHT_COS {
                    marked.insert(grid_key(*p), *p);
                }
            }
        }
    }
    for (key, (p, on)) in visits {
        if on.len() >= 2 {
            marked.insert(key, p);
        }
    }
    marked.into_values().collect()
}

/// Pixel offset of every segment so that lines leaving one grid point in
/// the same direction run side by side. Indexed `[line][segment]`.
#[must_use]
pub fn parallel_offsets(lines: &[ComponentLine], spacing: f64) -> Vec<Vec<Point>> {
    // Per grid point and undirected compass direction, the lines using it.
    let mut table: HashMap<((i64, i64), usize), Vec<usize>> = HashMap::new();
    let canonical = |a: Point, b: Point| {
        let (ka, kb) = (grid_key(a), grid_key(b));
        if ka <= kb {
            (a, b)
        } else {
            (b, a)
        }
    };
    for (l, line) in lines.iter().enumerate() {
        for w in line.points.windows(2) {
            let (from, to) = canonical(w[0], w[1]);
            if let Some(d) = direction_index(from, to) {
                let users = table.entry((grid_key(from), d % 4)).or_default();
                if !users.contains(&l) {
                    users.push(l);
                }
            }
        }
    }
    lines
        .iter()
        .enumerate()
        .map(|(l, line)| {
            line.points
                .windows(2)
                .map(|w| {
                    let (from, to) = canonical(w[0], w[1]);
                    let Some(d) = direction_index(from, to) else {
                        return Point::ORIGIN;
                    };
                    let Some(users) = table.get(&(grid_key(from), d % 4)) else {
                        return Point::ORIGIN;
                    };
                    let slot = users.iter().position(|u| *u == l).unwrap_or(0) as f64;
                    let shift = (slot - (users.len() - 1) as f64 / 2.0) * spacing;
                    let dir = to - from;
                    let n = dir.perpendicular() * (1.0 / dir.norm());
                    n * shift
                })
                .collect()
        })
        .collect()
}

impl Visualizer for MetroMap {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.dendrograms.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![
            KeySection::new()
                .with("bins", self.bins)
                .with("regions", self.regions)
                .with("select", self.selection)
                .with("aggregate", self.aggregation)
                .with("distance", self.line_distance)
                .with("snap", self.snapping)
                .with("lw", self.line_width),
            KeySection::new()
                .with("palette", self.palette.short_name())
                .with("pal#", format!("{:x}", self.palette.content_hash())),
        ]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_variant(variant, som)?;
        let lines = self.lines(som)?;
        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let colours = self.line_colours();
        let offsets = if self.snapping {
            parallel_offsets(&lines, self.line_width * 1.5)
        } else {
            lines
                .iter()
                .map(|l| vec![Point::ORIGIN; l.len().saturating_sub(1)])
                .collect()
        };

        let mut image = RasterImage::new(width, height)?;
        for (l, line) in lines.iter().enumerate() {
            let (dash, factor) = line_style(l);
            let thickness = self.line_width * factor;
            let dash: Vec<f64> = dash.iter().map(|d| d * thickness).collect();
            let colour = colours[l % colours.len()];
            for (s, w) in line.points.windows(2).enumerate() {
                let shift = offsets[l][s];
                draw_thick_line(
                    &mut image,
                    layout.to_pixel(w[0]) + shift,
                    layout.to_pixel(w[1]) + shift,
                    thickness,
                    colour,
                    &dash,
                );
            }
        }

        let radius = (self.line_width * 2.5).round().max(3.0) as i32;
        for p in stations(&lines) {
            let c = layout.to_pixel(p);
            let (cx, cy) = (c.x.round() as i32, c.y.round() as i32);
            draw_circle(&mut image, cx, cy, radius, Rgba::BLACK);
            draw_circle(&mut image, cx, cy, radius - 1, Rgba::WHITE);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::GradientFactory;

    fn metro() -> MetroMap {
        MetroMap::new(
            ImageCache::shared(1 << 22),
            Arc::new(GradientFactory::palette("rainbow", 32).unwrap()),
        )
    }

    /// Components 0 and 1 both grow with x, component 2 grows with y.
    fn som() -> Som {
        Som::from_fn(5, 5, 3, |x, y| vec![x as f64, x as f64 * 2.0 + 0.01 * y as f64, y as f64]).unwrap()
    }

    fn line(pts: &[(f64, f64)]) -> ComponentLine {
        ComponentLine::new(0, pts.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn test_twenty_distinct_styles() {
        for i in 0..20 {
            for j in (i + 1)..20 {
                let (di, fi) = line_style(i);
                let (dj, fj) = line_style(j);
                assert!(di != dj || fi != fj, "styles {i} and {j} coincide");
            }
        }
        assert_eq!(line_style(20), line_style(0));
    }

    #[test]
    fn test_one_line_per_component() {
        let lines = metro().lines(&som()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].len(), DEFAULT_BINS);
    }

    #[test]
    fn test_aggregation_merges_parallel_components() {
        let mut m = metro();
        m.set_aggregation(Aggregation::TargetCount(2)).unwrap();
        let lines = m.lines(&som()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].components, vec![0, 1]);
        assert_eq!(lines[1].components, vec![2]);
    }

    #[test]
    fn test_dendrogram_cached() {
        let mut m = metro();
        m.set_aggregation(Aggregation::TargetCount(1)).unwrap();
        let som = som();
        m.lines(&som).unwrap();
        m.set_aggregation(Aggregation::TargetCount(2)).unwrap();
        m.lines(&som).unwrap();
        assert_eq!(m.dendrograms.lock().unwrap().len(), 1);
        m.invalidate();
        assert!(m.dendrograms.lock().unwrap().is_empty());
    }

    #[test]
    fn test_snapped_lines_on_grid() {
        let mut m = metro();
        m.set_snapping(true);
        for l in m.lines(&som()).unwrap() {
            assert!(l.points.iter().all(|p| p.is_integral()));
        }
    }

    #[test]
    fn test_stations_at_crossings_and_bends() {
        let lines = vec![
            line(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]),
            line(&[(1.0, 0.0), (1.0, 1.0), (1.0, 2.0)]),
            line(&[(3.0, 0.0), (4.0, 0.0), (4.0, 1.0)]),
        ];
        let s = stations(&lines);
        assert_eq!(s, vec![Point::new(1.0, 1.0), Point::new(4.0, 0.0)]);
    }

    #[test]
    fn test_parallel_offsets_spread_shared_segments() {
        let lines = vec![line(&[(0.0, 0.0), (1.0, 0.0)]), line(&[(0.0, 0.0), (1.0, 0.0)])];
        let offsets = parallel_offsets(&lines, 4.0);
        assert_eq!(offsets[0][0], Point::new(0.0, -2.0));
        assert_eq!(offsets[1][0], Point::new(0.0, 2.0));
        let single = parallel_offsets(&lines[..1], 4.0);
        assert_eq!(single[0][0], Point::ORIGIN);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut m = metro();
        assert!(m.set_bins(0).is_err());
        assert!(m.set_selection(Selection::TargetCount(0)).is_err());
        assert!(m.set_aggregation(Aggregation::Threshold(2.0)).is_err());
        assert_eq!(m.bins(), DEFAULT_BINS);
    }

    #[test]
    fn test_render_draws_lines() {
        let mut m = metro();
        m.set_snapping(true);
        let img = m.get_visualization(0, &som(), 100, 100).unwrap();
        assert_eq!(img.width(), 100);
        assert!(img.pixels().chunks(4).any(|p| p[3] > 0));
    }
}
