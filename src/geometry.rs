//! Geometric primitives shared by the graph-like visualizers.
//!
//! Grid coordinates are expressed in unit space: unit `(x, y)` sits at the
//! point `(x, y)`, so a unit's centre maps to pixel
//! `((x + 0.5) * unit_width, (y + 0.5) * unit_height)`.

use std::ops::{Add, Mul, Sub};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Origin point (0, 0).
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation between two points.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Length of the vector from the origin.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Perpendicular vector (rotated 90° counter-clockwise in screen space).
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// True when both coordinates are whole numbers.
    #[must_use]
    pub fn is_integral(self) -> bool {
        self.x.fract() == 0.0 && self.y.fract() == 0.0
    }
}

impl Add for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Maps unit-grid coordinates to pixel coordinates of an output image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Pixel width of one unit.
    pub unit_width: f64,
    /// Pixel height of one unit.
    pub unit_height: f64,
}

impl GridLayout {
    /// Layout for an `x_size × y_size` grid stretched over `width × height` pixels.
    #[must_use]
    pub fn new(x_size: usize, y_size: usize, width: u32, height: u32) -> Self {
        Self {
            unit_width: f64::from(width) / x_size.max(1) as f64,
            unit_height: f64::from(height) / y_size.max(1) as f64,
        }
    }

    /// Pixel position of a grid point (unit centres at integer grid points).
    #[must_use]
    pub fn to_pixel(&self, grid: Point) -> Point {
        Point::new(
            (grid.x + 0.5) * self.unit_width,
            (grid.y + 0.5) * self.unit_height,
        )
    }

    /// Pixel position of the centre of unit `(x, y)`.
    #[must_use]
    pub fn unit_centre(&self, x: usize, y: usize) -> Point {
        self.to_pixel(Point::new(x as f64, y as f64))
    }

    /// The smaller of unit width and height.
    #[must_use]
    pub fn unit_size(&self) -> f64 {
        self.unit_width.min(self.unit_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(3.0, 4.0);
        assert!((p1.distance(p2) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_point_arithmetic() {
        let p = Point::new(1.0, 2.0) + Point::new(3.0, 4.0) * 2.0 - Point::new(1.0, 1.0);
        assert_eq!(p, Point::new(6.0, 9.0));
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        let v = Point::new(2.0, 1.0);
        let n = v.perpendicular();
        assert!((v.x * n.x + v.y * n.y).abs() < f64::EPSILON);
    }

    #[test]
    fn test_is_integral() {
        assert!(Point::new(2.0, -1.0).is_integral());
        assert!(!Point::new(2.5, 1.0).is_integral());
    }

    #[test]
    fn test_layout_unit_centre() {
        let layout = GridLayout::new(4, 2, 400, 100);
        assert_eq!(layout.unit_centre(0, 0), Point::new(50.0, 25.0));
        assert_eq!(layout.unit_centre(3, 1), Point::new(350.0, 75.0));
        assert!((layout.unit_size() - 50.0).abs() < f64::EPSILON);
    }
}
