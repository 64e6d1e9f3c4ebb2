//! The visualizer contract and registry.
//!
//! Every visualizer renders one of its variants of a [`Som`] at a requested
//! size. [`Visualizer::get_visualization`] wraps rendering with the shared
//! [`ImageCache`]: the key is built from the visualizer's short name, the
//! SOM identity, size, opacity, background and every parameter the
//! visualizer declares in [`Visualizer::cache_params`].
//!
//! # Example
//!
//! ```rust,ignore
//! use som_viz::prelude::*;
//!
//! let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
//! let palette = Arc::new(GradientFactory::palette("rainbow", 256)?);
//! let umatrix = UMatrix::new(Arc::clone(&cache), palette);
//! let image = umatrix.get_visualization(0, &som, 400, 400)?;
//! ```

/// Accessors shared by every visualizer with `info`, `cache` and `backdrop` fields.
macro_rules! visualizer_plumbing {
    () => {
        fn info(&self) -> &$crate::visualizers::VisualizerInfo {
            &self.info
        }

        fn cache(&self) -> &std::sync::Arc<$crate::cache::ImageCache> {
            &self.cache
        }

        fn backdrop(&self) -> &$crate::visualizers::Backdrop {
            &self.backdrop
        }

        fn backdrop_mut(&mut self) -> &mut $crate::visualizers::Backdrop {
            &mut self.backdrop
        }
    };
}

pub mod classes;
pub mod flow;
pub mod gap;
pub mod hits;
pub mod matrix;
pub mod metro;
pub mod mst;
pub mod neighbourhood;
pub mod pmatrix;
pub mod quality;
pub mod sdh;
pub mod umatrix;

use crate::cache::{visualizer_prefix, CacheKey, ImageCache, KeySection};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::{InputObjectKind, Som};
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

pub use classes::{ClassEntropy, ClassVisualizer, Silhouette};
pub use flow::{FlowBorderline, FlowField};
pub use gap::ClusterGap;
pub use hits::{ComponentPlanes, HitHistogram};
pub use matrix::{Matrix, MatrixCore, MatrixSettings};
pub use metro::MetroMap;
pub use mst::MinimumSpanningTree;
pub use neighbourhood::NeighbourhoodGraph;
pub use pmatrix::{PMatrix, UStarMatrix};
pub use quality::{QuantizationError, TopographicError};
pub use sdh::SmoothedDataHistograms;
pub use umatrix::{DMatrix, UMatrix};

/// Grouping tag used to order visualizers in menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisualizerCategory {
    /// Structure visualizations of the map itself.
    Standard,
    /// Map quality measures.
    QualityMeasure,
    /// Comparisons between maps or against labels.
    Comparison,
}

/// Name and description of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantInfo {
    /// Display name.
    pub name: String,
    /// Short identifier.
    pub short_name: String,
    /// One-line description.
    pub description: String,
}

impl VariantInfo {
    /// Create a variant description.
    #[must_use]
    pub fn new(name: &str, short_name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Static description of a visualizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizerInfo {
    /// Display name.
    pub name: String,
    /// Short identifier; prefix of every cache key.
    pub short_name: String,
    /// Category tag.
    pub category: VisualizerCategory,
    /// Variants in index order.
    pub variants: Vec<VariantInfo>,
}

impl VisualizerInfo {
    /// Create a visualizer description.
    #[must_use]
    pub fn new(
        name: &str,
        short_name: &str,
        category: VisualizerCategory,
        variants: Vec<VariantInfo>,
    ) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
            category,
            variants,
        }
    }
}

/// Optional background image and opacity applied after rendering.
#[derive(Debug, Clone)]
pub struct Backdrop {
    background: Option<Arc<RasterImage>>,
    opacity: f32,
}

impl Default for Backdrop {
    fn default() -> Self {
        Self {
            background: None,
            opacity: 1.0,
        }
    }
}

impl Backdrop {
    /// Background image, if any.
    #[must_use]
    pub fn background(&self) -> Option<&Arc<RasterImage>> {
        self.background.as_ref()
    }

    /// Set or clear the background image.
    pub fn set_background(&mut self, background: Option<Arc<RasterImage>>) {
        self.background = background;
    }

    /// Overlay opacity in `[0, 1]`.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the overlay opacity (clamped to `[0, 1]`).
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn key_section(&self) -> KeySection {
        let bg = self
            .background
            .as_ref()
            .map_or_else(|| "none".to_string(), |b| format!("{:x}", b.content_hash()));
        KeySection::new().with("bg", bg)
    }

    fn apply(&self, image: RasterImage) -> Result<RasterImage> {
        match &self.background {
            Some(background) => image.composite_over(background, self.opacity),
            None if self.opacity < 1.0 => {
                let mut image = image;
                image.scale_alpha(self.opacity);
                Ok(image)
            }
            None => Ok(image),
        }
    }
}

/// A renderer of one family of SOM visualizations.
pub trait Visualizer: Send + Sync {
    /// Static description.
    fn info(&self) -> &VisualizerInfo;

    /// Number of variants for `som`.
    fn variant_count(&self, _som: &Som) -> usize {
        self.info().variants.len()
    }

    /// Input objects the SOM must carry.
    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[]
    }

    /// Every mutable parameter that influences the rendered pixels.
    fn cache_params(&self) -> Vec<KeySection>;

    /// Render variant `variant` without consulting the cache.
    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage>;

    /// Shared image cache.
    fn cache(&self) -> &Arc<ImageCache>;

    /// Background and opacity.
    fn backdrop(&self) -> &Backdrop;

    /// Mutable background and opacity.
    fn backdrop_mut(&mut self) -> &mut Backdrop;

    /// Display name.
    fn name(&self) -> &str {
        &self.info().name
    }

    /// Fail with [`Error::MissingInputObjects`] unless every needed object is attached.
    fn check_needed_objects(&self, som: &Som) -> Result<()> {
        let missing: Vec<String> = self
            .needed_input_objects()
            .iter()
            .filter(|kind| !som.inputs().has(**kind))
            .map(|kind| kind.name().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingInputObjects {
                visualizer: self.name().to_string(),
                missing,
            })
        }
    }

    /// Fail with [`Error::IllegalVariant`] unless `variant < variant_count(som)`.
    fn check_variant(&self, variant: usize, som: &Som) -> Result<()> {
        let count = self.variant_count(som);
        if variant < count {
            Ok(())
        } else {
            Err(Error::IllegalVariant {
                visualizer: self.name().to_string(),
                index: variant,
                count,
            })
        }
    }

    /// Index of the variant with the given name or short name.
    fn variant_by_name(&self, name: &str) -> Result<usize> {
        self.info()
            .variants
            .iter()
            .position(|v| v.name == name || v.short_name == name)
            .ok_or_else(|| Error::UnknownVariant(format!("{name} (in {})", self.name())))
    }

    /// Structured cache key of one rendering.
    fn cache_key(&self, variant: usize, som: &Som, width: u32, height: u32) -> CacheKey {
        CacheKey::new(
            &self.info().short_name,
            som.identity_hash(),
            width,
            height,
            self.backdrop().opacity(),
        )
        .section(KeySection::new().with("variant", variant))
        .section(self.backdrop().key_section())
        .sections(self.cache_params())
    }

    /// Cached rendering of `variant`.
    ///
    /// On a miss the image is created, composited over the background (or
    /// faded by the opacity when there is none), stored and returned.
    fn get_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<Arc<RasterImage>> {
        self.check_variant(variant, som)?;
        let key = self.cache_key(variant, som, width, height).to_string();
        if let Some(image) = self.cache().get(&key) {
            return Ok(image);
        }
        debug!("rendering {} variant {variant} at {width}x{height}", self.name());
        let image = self.create_visualization(variant, som, width, height)?;
        let image = Arc::new(self.backdrop().apply(image)?);
        self.cache().put(key, Arc::clone(&image));
        Ok(image)
    }

    /// Drop data memoized from previously rendered maps.
    fn forget_derived(&self) {}

    /// Drop every cached image of this visualizer along with its memoized
    /// data; returns the image count.
    fn invalidate(&self) -> usize {
        self.forget_derived();
        self.cache()
            .remove_all_with_prefix(&visualizer_prefix(&self.info().short_name))
    }
}

/// Order by category, then by name.
pub fn sort_visualizers(visualizers: &mut [Box<dyn Visualizer>]) {
    visualizers.sort_by(|a, b| compare_visualizers(a.as_ref(), b.as_ref()));
}

fn compare_visualizers(a: &dyn Visualizer, b: &dyn Visualizer) -> Ordering {
    a.info()
        .category
        .cmp(&b.info().category)
        .then_with(|| a.name().cmp(b.name()))
}

/// All visualizers sharing one cache.
pub struct Registry {
    cache: Arc<ImageCache>,
    visualizers: Vec<Box<dyn Visualizer>>,
}

impl Registry {
    /// Empty registry over `cache`.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>) -> Self {
        Self {
            cache,
            visualizers: Vec::new(),
        }
    }

    /// Every built-in visualizer, sorted by category and name.
    #[must_use]
    pub fn with_defaults(cache: Arc<ImageCache>, palette: Arc<Palette>, config: &EngineConfig) -> Self {
        let settings = MatrixSettings::from_config(config, palette);
        let c = || Arc::clone(&cache);
        let mut visualizers: Vec<Box<dyn Visualizer>> = vec![
            Box::new(UMatrix::with_settings(c(), settings.clone())),
            Box::new(DMatrix::with_settings(c(), settings.clone())),
            Box::new(PMatrix::with_settings(c(), settings.clone())),
            Box::new(UStarMatrix::with_settings(c(), settings.clone())),
            Box::new(HitHistogram::with_settings(c(), settings.clone())),
            Box::new(ComponentPlanes::with_settings(c(), settings.clone())),
            Box::new(SmoothedDataHistograms::with_settings(c(), settings.clone())),
            Box::new(QuantizationError::with_settings(c(), settings.clone())),
            Box::new(TopographicError::with_settings(c(), settings.clone())),
            Box::new(ClassEntropy::with_settings(c(), settings.clone())),
            Box::new(Silhouette::with_settings(c(), settings.clone())),
            Box::new(MetroMap::new(c(), Arc::clone(&settings.palette)).with_workers(config.ward_worker_count())),
            Box::new(FlowBorderline::new(c())),
            Box::new(MinimumSpanningTree::new(c(), Arc::clone(&settings.palette))),
            Box::new(NeighbourhoodGraph::new(c())),
            Box::new(ClassVisualizer::new(c())),
            Box::new(ClusterGap::new(c())),
        ];
        sort_visualizers(&mut visualizers);
        Self { cache, visualizers }
    }

    /// Add a visualizer, keeping the order.
    pub fn register(&mut self, visualizer: Box<dyn Visualizer>) {
        self.visualizers.push(visualizer);
        sort_visualizers(&mut self.visualizers);
    }

    /// Shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Visualizers in display order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Visualizer> {
        self.visualizers.iter().map(AsRef::as_ref)
    }

    /// Number of visualizers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.visualizers.len()
    }

    /// True if none are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visualizers.is_empty()
    }

    /// Look up by short name.
    #[must_use]
    pub fn get(&self, short_name: &str) -> Option<&dyn Visualizer> {
        self.iter().find(|v| v.info().short_name == short_name)
    }

    /// Mutable lookup by short name.
    pub fn get_mut(&mut self, short_name: &str) -> Option<&mut Box<dyn Visualizer>> {
        self.visualizers
            .iter_mut()
            .find(|v| v.info().short_name == short_name)
    }

    /// Visualizers whose needed input objects `som` carries.
    pub fn available_for<'a>(&'a self, som: &'a Som) -> impl Iterator<Item = &'a dyn Visualizer> + 'a {
        self.iter().filter(move |v| v.check_needed_objects(som).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::som::SharedInputObjects;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct Solid {
        info: VisualizerInfo,
        cache: Arc<ImageCache>,
        backdrop: Backdrop,
        colour: Rgba,
        renders: AtomicUsize,
    }

    impl Solid {
        fn new(cache: Arc<ImageCache>) -> Self {
            Self {
                info: VisualizerInfo::new(
                    "Solid",
                    "Solid",
                    VisualizerCategory::Standard,
                    vec![
                        VariantInfo::new("Plain", "plain", "one colour"),
                        VariantInfo::new("Other", "other", "same colour"),
                    ],
                ),
                cache,
                backdrop: Backdrop::default(),
                colour: Rgba::RED,
                renders: AtomicUsize::new(0),
            }
        }
    }

    impl Visualizer for Solid {
        fn info(&self) -> &VisualizerInfo {
            &self.info
        }
        fn needed_input_objects(&self) -> &[InputObjectKind] {
            &[InputObjectKind::ClassInfo]
        }
        fn cache_params(&self) -> Vec<KeySection> {
            vec![KeySection::new().with("colour", self.colour)]
        }
        fn create_visualization(&self, _variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
            self.check_needed_objects(som)?;
            self.renders.fetch_add(1, AtomicOrdering::SeqCst);
            RasterImage::filled(width, height, self.colour)
        }
        fn cache(&self) -> &Arc<ImageCache> {
            &self.cache
        }
        fn backdrop(&self) -> &Backdrop {
            &self.backdrop
        }
        fn backdrop_mut(&mut self) -> &mut Backdrop {
            &mut self.backdrop
        }
    }

    fn labelled_som() -> Som {
        Som::new(2, 2, 1, vec![0.0; 4])
            .unwrap()
            .with_inputs(SharedInputObjects::new().with_class_info(crate::som::ClassInfo::from_labels(&["a"])))
            .unwrap()
    }

    #[test]
    fn test_get_visualization_uses_cache() {
        let cache = ImageCache::shared(1 << 20);
        let vis = Solid::new(Arc::clone(&cache));
        let som = labelled_som();
        let a = vis.get_visualization(0, &som, 8, 8).unwrap();
        let b = vis.get_visualization(0, &som, 8, 8).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(vis.renders.load(AtomicOrdering::SeqCst), 1);
        vis.get_visualization(1, &som, 8, 8).unwrap();
        assert_eq!(vis.renders.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_illegal_variant() {
        let vis = Solid::new(ImageCache::shared(1 << 20));
        let err = vis.get_visualization(2, &labelled_som(), 8, 8).unwrap_err();
        assert!(matches!(err, Error::IllegalVariant { index: 2, count: 2, .. }));
        assert!(err.to_string().contains("Solid"));
    }

    #[test]
    fn test_missing_objects_named() {
        let vis = Solid::new(ImageCache::shared(1 << 20));
        let som = Som::new(1, 1, 1, vec![0.0]).unwrap();
        let err = vis.get_visualization(0, &som, 4, 4).unwrap_err();
        assert!(err.to_string().contains("class info"));
    }

    #[test]
    fn test_parameter_change_changes_key() {
        let mut vis = Solid::new(ImageCache::shared(1 << 20));
        let som = labelled_som();
        let k1 = vis.cache_key(0, &som, 4, 4).to_string();
        vis.colour = Rgba::BLUE;
        let k2 = vis.cache_key(0, &som, 4, 4).to_string();
        vis.backdrop_mut().set_opacity(0.5);
        let k3 = vis.cache_key(0, &som, 4, 4).to_string();
        assert_ne!(k1, k2);
        assert_ne!(k2, k3);
    }

    #[test]
    fn test_background_composited() {
        let mut vis = Solid::new(ImageCache::shared(1 << 20));
        let background = Arc::new(RasterImage::filled(4, 4, Rgba::BLUE).unwrap());
        vis.backdrop_mut().set_background(Some(background));
        vis.backdrop_mut().set_opacity(0.5);
        let img = vis.get_visualization(0, &labelled_som(), 4, 4).unwrap();
        assert_eq!(img.get_pixel(0, 0), Some(Rgba::new(128, 0, 128, 255)));
    }

    #[test]
    fn test_opacity_without_background_scales_alpha() {
        let mut vis = Solid::new(ImageCache::shared(1 << 20));
        vis.backdrop_mut().set_opacity(0.5);
        let img = vis.get_visualization(0, &labelled_som(), 2, 2).unwrap();
        assert_eq!(img.get_pixel(1, 1).unwrap().a, 128);
    }

    #[test]
    fn test_invalidate_drops_own_entries() {
        let cache = ImageCache::shared(1 << 20);
        let vis = Solid::new(Arc::clone(&cache));
        let som = labelled_som();
        vis.get_visualization(0, &som, 4, 4).unwrap();
        vis.get_visualization(1, &som, 4, 4).unwrap();
        cache.put("Other, x", Arc::new(RasterImage::new(1, 1).unwrap()));
        assert_eq!(vis.invalidate(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_variant_by_name() {
        let vis = Solid::new(ImageCache::shared(1 << 20));
        assert_eq!(vis.variant_by_name("other").unwrap(), 1);
        assert_eq!(vis.variant_by_name("Plain").unwrap(), 0);
        assert!(matches!(vis.variant_by_name("nope"), Err(Error::UnknownVariant(_))));
    }

    #[test]
    fn test_registry_sorted_by_category_then_name() {
        let palette = Arc::new(crate::palette::GradientFactory::palette("grey", 16).unwrap());
        let registry = Registry::with_defaults(ImageCache::shared(1 << 20), palette, &EngineConfig::default());
        let order: Vec<(VisualizerCategory, String)> = registry
            .iter()
            .map(|v| (v.info().category, v.name().to_string()))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert!(registry.get("UMatrix").is_some());
        assert!(registry.len() >= 17);
    }
}
