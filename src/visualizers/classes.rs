//! Class-label visualizations: thematic class map, class entropy, silhouette.

use super::matrix::{Matrix, MatrixCore, MatrixSettings};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::algo::stats;
use crate::algo::voronoi::VoronoiPartition;
use crate::cache::{ImageCache, KeySection};
use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::geometry::GridLayout;
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::{ClassInfo, DistanceMatrix, InputObjectKind, Som};
use std::sync::Arc;

fn class_info<'a>(som: &'a Som, visualizer: &str) -> Result<&'a ClassInfo> {
    som.inputs()
        .class_info
        .as_deref()
        .ok_or_else(|| Error::MissingInputObjects {
            visualizer: visualizer.to_string(),
            missing: vec![InputObjectKind::ClassInfo.name().to_string()],
        })
}

/// Most frequent class among the inputs of every unit; the lower index wins ties.
pub fn majority_classes(som: &Som) -> Result<Vec<Option<usize>>> {
    let classes = class_info(som, "Class Map")?;
    let mut out = Vec::with_capacity(som.unit_count());
    for y in 0..som.y_size() {
        for x in 0..som.x_size() {
            let histogram = classes.class_histogram(som.mapped_inputs(x, y));
            let best = histogram
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                .map(|(c, _)| c);
            out.push(best);
        }
    }
    Ok(out)
}

/// Shannon entropy (bits) of the class distribution on every unit.
pub fn class_entropy(som: &Som) -> Result<Matrix> {
    let classes = class_info(som, "Class Entropy")?;
    Matrix::from_units(som, |x, y| {
        let histogram = classes.class_histogram(som.mapped_inputs(x, y));
        let total: usize = histogram.iter().sum();
        if total == 0 {
            return Ok(0.0);
        }
        Ok(histogram
            .iter()
            .filter(|n| **n > 0)
            .map(|&n| {
                let p = n as f64 / total as f64;
                -p * p.log2()
            })
            .sum())
    })
}

/// Silhouette of every labelled input in input space.
///
/// `a` is the mean distance to the own class, `b` the smallest mean
/// distance to another class; the value is `(b - a) / max(a, b)`, or 0 for
/// singleton classes.
#[must_use]
pub fn input_silhouettes(dist: &DistanceMatrix, classes: &ClassInfo) -> Vec<Option<f64>> {
    let n = dist.len();
    (0..n)
        .map(|i| {
            let own = classes.class_of(i)?;
            let mut sums = vec![(0.0, 0usize); classes.class_count()];
            for j in (0..n).filter(|&j| j != i) {
                if let Some(c) = classes.class_of(j) {
                    sums[c].0 += dist.get(i, j);
                    sums[c].1 += 1;
                }
            }
            if sums[own].1 == 0 {
                return Some(0.0);
            }
            let a = sums[own].0 / sums[own].1 as f64;
            let b = sums
                .iter()
                .enumerate()
                .filter(|(c, s)| *c != own && s.1 > 0)
                .map(|(_, s)| s.0 / s.1 as f64)
                .fold(f64::INFINITY, f64::min);
            if !b.is_finite() {
                return Some(0.0);
            }
            let m = a.max(b);
            Some(if m > 0.0 { (b - a) / m } else { 0.0 })
        })
        .collect()
}

/// Mean silhouette of the mapped inputs of every unit (0 without labelled inputs).
pub fn silhouette_matrix(som: &Som) -> Result<Matrix> {
    let classes = class_info(som, "Silhouette")?;
    let computed;
    let dist = match &som.inputs().distance_matrix {
        Some(d) => d.as_ref(),
        None => {
            let data = som.inputs().input_data.as_deref().ok_or_else(|| Error::MissingInputObjects {
                visualizer: "Silhouette".to_string(),
                missing: vec![InputObjectKind::InputData.name().to_string()],
            })?;
            computed = DistanceMatrix::compute(data, som.metric())?;
            &computed
        }
    };
    let silhouettes = input_silhouettes(dist, classes);
    Matrix::from_units(som, |x, y| {
        let values: Vec<f64> = som
            .mapped_inputs(x, y)
            .iter()
            .filter_map(|&i| silhouettes.get(i).copied().flatten())
            .collect();
        Ok(if values.is_empty() { 0.0 } else { stats::mean(&values) })
    })
}

// ============================================================================
// Thematic class map
// ============================================================================

/// Units (or their Voronoi regions) coloured by majority class.
#[derive(Debug)]
pub struct ClassVisualizer {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    colours: Option<Vec<Rgba>>,
}

impl ClassVisualizer {
    /// Class map with evenly spaced hues.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Thematic Class Map",
                "ClassMap",
                VisualizerCategory::Comparison,
                vec![
                    VariantInfo::new("Class Map", "units", "Majority class per unit"),
                    VariantInfo::new("Class Map (Voronoi)", "voronoi", "Majority class regions"),
                ],
            ),
            cache,
            backdrop: Backdrop::default(),
            colours: None,
        }
    }

    /// Use fixed class colours (cycled) instead of evenly spaced hues.
    pub fn set_class_colours(&mut self, colours: Option<Vec<Rgba>>) {
        self.colours = colours.filter(|c| !c.is_empty());
    }

    fn colours_for(&self, count: usize) -> Vec<Rgba> {
        match &self.colours {
            Some(fixed) => (0..count).map(|i| fixed[i % fixed.len()]).collect(),
            None => Rgba::distinct(count),
        }
    }
}

impl Visualizer for ClassVisualizer {
    visualizer_plumbing!();

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[InputObjectKind::ClassInfo]
    }

    fn cache_params(&self) -> Vec<KeySection> {
        let colours = self.colours.as_ref().map_or_else(
            || "distinct".to_string(),
            |c| c.iter().map(ToString::to_string).collect::<Vec<_>>().join("/"),
        );
        vec![KeySection::new().with("colours", colours)]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        self.check_variant(variant, som)?;
        let classes = class_info(som, &self.info.name)?;
        let colours = self.colours_for(classes.class_count());
        let majority = majority_classes(som)?;
        let layout = GridLayout::new(som.x_size(), som.y_size(), width, height);
        let mut image = RasterImage::new(width, height)?;

        if variant == 0 {
            for (unit, class) in majority.iter().enumerate() {
                let Some(c) = class else { continue };
                let (x, y) = som.coords(unit);
                let x0 = (x as f64 * layout.unit_width).round() as u32;
                let y0 = (y as f64 * layout.unit_height).round() as u32;
                let x1 = ((x + 1) as f64 * layout.unit_width).round() as u32;
                let y1 = ((y + 1) as f64 * layout.unit_height).round() as u32;
                image.fill_rect(x0, y0, x1 - x0, y1 - y0, colours[*c]);
            }
        } else {
            let (sites, site_classes): (Vec<_>, Vec<_>) = majority
                .iter()
                .enumerate()
                .filter_map(|(unit, class)| {
                    let (x, y) = som.coords(unit);
                    class.map(|c| (layout.unit_centre(x, y), c))
                })
                .unzip();
            let owners = VoronoiPartition::new(sites).rasterize(width, height);
            for (i, owner) in owners.iter().enumerate() {
                if let Some(site) = owner {
                    let (x, y) = ((i % width as usize) as u32, (i / width as usize) as u32);
                    image.set_pixel(x, y, colours[site_classes[*site]]);
                }
            }
        }
        Ok(image)
    }
}

// ============================================================================
// Entropy and silhouette maps
// ============================================================================

/// Class entropy per unit.
#[derive(Debug)]
pub struct ClassEntropy {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl ClassEntropy {
    /// Entropy map with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Entropy map with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Class Entropy",
                "ClassEntropy",
                VisualizerCategory::QualityMeasure,
                vec![VariantInfo::new(
                    "Class Entropy",
                    "entropy",
                    "Mixture of classes on each unit",
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

impl Visualizer for ClassEntropy {
    visualizer_plumbing!();

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[InputObjectKind::ClassInfo]
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        self.core.render(&class_entropy(som)?, som, width, height)
    }
}

/// Mean input silhouette per unit.
#[derive(Debug)]
pub struct Silhouette {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
}

impl Silhouette {
    /// Silhouette map with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// Silhouette map with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Silhouette",
                "Silhouette",
                VisualizerCategory::QualityMeasure,
                vec![VariantInfo::new(
                    "Silhouette",
                    "silhouette",
                    "How well mapped inputs fit their class",
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

impl Visualizer for Silhouette {
    visualizer_plumbing!();

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[InputObjectKind::InputData, InputObjectKind::ClassInfo]
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![self.core.settings().key_section()]
    }

    fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        self.core.render(&silhouette_matrix(som)?, som, width, height)
    }
}
