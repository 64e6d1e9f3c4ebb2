//! Error types for som-viz operations.

use std::io;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or rendering SOM visualizations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (palette files, configuration, exports).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// PNG encoding error.
    #[error("PNG encoding error: {0}")]
    PngEncoding(#[from] png::EncodingError),

    /// XML reading or writing error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Requested variant index is outside `[0, count)`.
    #[error("illegal variant index {index} for {visualizer}: valid range is 0..{count}")]
    IllegalVariant {
        /// Name of the visualizer that was asked.
        visualizer: String,
        /// The offending index.
        index: usize,
        /// Number of variants the visualizer offers.
        count: usize,
    },

    /// A visualizer needs input objects the SOM does not carry.
    #[error("{visualizer} requires the following input objects, which are not available: {}", .missing.join(", "))]
    MissingInputObjects {
        /// Name of the visualizer.
        visualizer: String,
        /// Names of the absent objects.
        missing: Vec<String>,
    },

    /// No variant with the given name exists.
    #[error("unknown visualization variant: {0}")]
    UnknownVariant(String),

    /// Illegal selection, aggregation or display mode.
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Invalid dimensions for an image or matrix.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// Empty data provided where non-empty is required.
    #[error("Empty data provided")]
    EmptyData,

    /// Two sequences that must agree in length do not.
    #[error("Data length mismatch: expected {expected} elements, got {actual}")]
    DataLengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A unit refers to an input vector that does not exist.
    #[error("mapped input index {index} out of range for {count} input vectors")]
    InputIndex {
        /// The offending input index.
        index: usize,
        /// Number of attached input vectors.
        count: usize,
    },

    /// Distance metric could not be evaluated.
    #[error("metric error: {0}")]
    Metric(String),

    /// Colour index outside the palette.
    #[error("colour index {index} out of range for palette '{palette}' (max {max})")]
    ColourIndex {
        /// Palette short name.
        palette: String,
        /// Requested index.
        index: usize,
        /// Largest valid index.
        max: usize,
    },

    /// Malformed palette definition.
    #[error("palette format error: {0}")]
    PaletteFormat(String),

    /// Invalid configuration value.
    #[error("invalid configuration value for '{key}': {message}")]
    Config {
        /// Offending configuration key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
}
