//! # SOM-Viz
//!
//! Rendering and caching core for Self-Organizing Map visualizations.
//!
//! A trained map ([`som::Som`]) is turned into raster images by a family of
//! visualizers: distance matrices (U-, D-, P- and U*-Matrix), hit
//! histograms, component planes, smoothed data histograms, metro maps,
//! flow and borderline fields, spanning trees, neighbourhood graphs, class
//! maps and quality measures, plus a cluster-gap overlay. Every rendering
//! goes through one shared, byte-bounded LRU [`cache::ImageCache`] keyed by
//! every parameter that influences the pixels.
//!
//! Built on the [trueno](https://crates.io/crates/trueno) core library for
//! vectorised pixel work.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use som_viz::prelude::*;
//!
//! let som = Som::from_fn(4, 4, 3, |x, y| vec![x as f64, y as f64, 0.0])?;
//! let cache = ImageCache::shared(DEFAULT_MAX_BYTES);
//! let palette = Arc::new(GradientFactory::palette("rainbow", 256)?);
//! let umatrix = UMatrix::new(cache, palette);
//!
//! let image = umatrix.get_visualization(0, &som, 400, 400)?;
//! PngEncoder::write_to_file(&image, "umatrix.png")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: multi-threaded Ward clustering with rayon (default)
//!
//! ## Academic References
//!
//! - Ultsch, A. (2003). "U*-Matrix: a tool to visualize clusters in high
//!   dimensional data."
//! - Pampalk, E., Rauber, A., & Merkl, D. (2002). "Using smoothed data
//!   histograms for cluster visualization in self-organizing maps."
//! - Ward, J. H. (1963). "Hierarchical grouping to optimize an objective
//!   function."

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code (Cloudflare incident 2025-11-18)
#![cfg_attr(test, allow(clippy::unwrap_used))]
// Allow common patterns in graphics/visualization code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// RGBA colours.
pub mod color;

/// In-memory RGBA raster images and compositing.
pub mod image;

/// Geometric primitives and the unit-grid layout.
pub mod geometry;

/// Colour palettes, gradients and the palette file format.
pub mod palette;

// ============================================================================
// Map Model
// ============================================================================

/// The SOM grid, its metric and attached input objects.
pub mod som;

/// Numerical and graph algorithms.
pub mod algo;

// ============================================================================
// Rendering Modules
// ============================================================================

/// Structured cache keys and the shared LRU image cache.
pub mod cache;

/// Rasterization of lines, circles and arrows.
pub mod render;

/// The visualizer contract, registry and every built-in visualizer.
pub mod visualizers;

/// Output encoders (PNG).
pub mod output;

// ============================================================================
// Configuration & Errors
// ============================================================================

/// Engine configuration (YAML file with environment overrides).
pub mod config;

/// Error types for som-viz operations.
pub mod error;

pub use error::{Error, Result};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types and traits for convenient imports.
///
/// ```rust,ignore
/// use som_viz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{ImageCache, DEFAULT_MAX_BYTES};
    pub use crate::color::Rgba;
    pub use crate::config::EngineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::Point;
    pub use crate::image::RasterImage;
    pub use crate::output::PngEncoder;
    pub use crate::palette::{GradientFactory, Palette};
    pub use crate::som::{
        ClassInfo, DistanceMatrix, InputData, InputObjectKind, Metric, SharedInputObjects, Som,
        TemplateVector,
    };
    pub use crate::visualizers::{
        ClassVisualizer, DMatrix, FlowBorderline, HitHistogram, MetroMap, MinimumSpanningTree,
        NeighbourhoodGraph, PMatrix, Registry, SmoothedDataHistograms, UMatrix, UStarMatrix,
        Visualizer,
    };
    pub use std::sync::Arc;
}

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export trueno for direct access to SIMD operations.
pub use trueno;
