//! Rasterization of overlay primitives.
//!
//! # Algorithms
//!
//! - **Bresenham's Line**: one pixel hairlines
//! - **Disc stamping**: thick and dashed lines for metro lines and graphs
//! - **Midpoint Circle**: filled and outlined circles (stations, vertices)
//!
//! # References
//!
//! - Bresenham, J. E. (1965). "Algorithm for computer control of a digital plotter."

mod primitives;

pub use primitives::{
    draw_arrow, draw_circle, draw_circle_outline, draw_line, draw_thick_line,
};
