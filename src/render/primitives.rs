//! Primitive rendering functions.
//!
//! Implements rasterization for the shapes the overlay visualizers need:
//! hairlines, thick (optionally dashed) lines, discs, circle outlines and
//! arrows. All drawing alpha-blends onto the target, so overlays drawn on a
//! transparent image keep their coverage information for later compositing.

use crate::color::Rgba;
use crate::geometry::Point;
use crate::image::RasterImage;

// ============================================================================
// Line Drawing
// ============================================================================

/// Draw a one pixel line using Bresenham's algorithm.
pub fn draw_line(img: &mut RasterImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        plot(img, x, y, color);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a line of the given thickness by stamping discs along it.
///
/// `dash` alternates "on" and "off" lengths in pixels; an empty slice draws a
/// solid line. The dash phase restarts for every call.
pub fn draw_thick_line(
    img: &mut RasterImage,
    from: Point,
    to: Point,
    thickness: f64,
    color: Rgba,
    dash: &[f64],
) {
    let length = from.distance(to);
    let radius = (thickness / 2.0).max(0.5);
    if length < f64::EPSILON {
        draw_circle(img, from.x.round() as i32, from.y.round() as i32, radius.round() as i32, color);
        return;
    }

    let step = (radius / 2.0).clamp(0.5, 2.0);
    let pattern_len: f64 = dash.iter().sum();
    let mut covered = RasterMask::new(img.width(), img.height());

    let mut t = 0.0;
    while t <= length {
        if is_dash_on(dash, pattern_len, t) {
            let p = from.lerp(to, t / length);
            stamp_disc(img, &mut covered, p, radius, color);
        }
        t += step;
    }
}

/// Whether distance `t` along a line falls into an "on" part of the pattern.
fn is_dash_on(dash: &[f64], pattern_len: f64, t: f64) -> bool {
    if dash.is_empty() || pattern_len <= 0.0 {
        return true;
    }
    let mut pos = t % pattern_len;
    for (i, len) in dash.iter().enumerate() {
        if pos < *len {
            return i % 2 == 0;
        }
        pos -= len;
    }
    true
}

/// Draw an arrow from `from` to `to` with a two-stroke head.
pub fn draw_arrow(img: &mut RasterImage, from: Point, to: Point, thickness: f64, color: Rgba) {
    let length = from.distance(to);
    if length < 1.0 {
        return;
    }
    draw_thick_line(img, from, to, thickness, color, &[]);

    let dir = (to - from) * (1.0 / length);
    let head = (length * 0.35).clamp(2.0, 12.0);
    let (sin, cos) = 25f64.to_radians().sin_cos();
    for side in [1.0, -1.0] {
        let back = Point::new(
            -dir.x * cos + side * dir.y * sin,
            -dir.y * cos - side * dir.x * sin,
        );
        draw_thick_line(img, to, to + back * head, thickness, color, &[]);
    }
}

// ============================================================================
// Circle Drawing
// ============================================================================

/// Draw a filled circle using the midpoint algorithm.
pub fn draw_circle(img: &mut RasterImage, cx: i32, cy: i32, radius: i32, color: Rgba) {
    if radius <= 0 {
        if radius == 0 {
            plot(img, cx, cy, color);
        }
        return;
    }

    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;
    let mut spans: Vec<(i32, i32, i32)> = Vec::with_capacity(radius as usize * 4);

    while x >= y {
        spans.push((cx - x, cx + x, cy + y));
        spans.push((cx - x, cx + x, cy - y));
        spans.push((cx - y, cx + y, cy + x));
        spans.push((cx - y, cx + y, cy - x));

        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }

    // Octant spans overlap; blend each pixel once so translucent discs stay even.
    let mut covered = RasterMask::new(img.width(), img.height());
    for (x1, x2, row) in spans {
        for px in x1..=x2 {
            if covered.claim(px, row) {
                plot(img, px, row, color);
            }
        }
    }
}

/// Draw a circle outline.
pub fn draw_circle_outline(img: &mut RasterImage, cx: i32, cy: i32, radius: i32, color: Rgba) {
    if radius <= 0 {
        if radius == 0 {
            plot(img, cx, cy, color);
        }
        return;
    }

    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;

    while x >= y {
        for (px, py) in [
            (cx + x, cy + y),
            (cx - x, cy + y),
            (cx + x, cy - y),
            (cx - x, cy - y),
            (cx + y, cy + x),
            (cx - y, cy + x),
            (cx + y, cy - x),
            (cx - y, cy - x),
        ] {
            plot(img, px, py, color);
        }

        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Blend a pixel with bounds checking on signed coordinates.
#[inline]
fn plot(img: &mut RasterImage, x: i32, y: i32, color: Rgba) {
    if x >= 0 && y >= 0 {
        img.blend_pixel(x as u32, y as u32, color);
    }
}

fn stamp_disc(img: &mut RasterImage, covered: &mut RasterMask, centre: Point, radius: f64, color: Rgba) {
    let r2 = radius * radius;
    let x_min = (centre.x - radius).floor() as i32;
    let x_max = (centre.x + radius).ceil() as i32;
    let y_min = (centre.y - radius).floor() as i32;
    let y_max = (centre.y + radius).ceil() as i32;

    for py in y_min..=y_max {
        for px in x_min..=x_max {
            let dx = f64::from(px) + 0.5 - centre.x;
            let dy = f64::from(py) + 0.5 - centre.y;
            if dx * dx + dy * dy <= r2 && covered.claim(px, py) {
                plot(img, px, py, color);
            }
        }
    }
}

/// Tracks pixels already painted by one shape.
struct RasterMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl RasterMask {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Marks the pixel; returns false if it was out of bounds or already marked.
    fn claim(&mut self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return false;
        }
        let idx = (y as usize) * (self.width as usize) + x as usize;
        !std::mem::replace(&mut self.bits[idx], true)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RasterImage {
        RasterImage::filled(w, h, Rgba::WHITE).expect("image creation should succeed")
    }

    #[test]
    fn test_draw_line_horizontal() {
        let mut img = white(100, 100);
        draw_line(&mut img, 10, 50, 90, 50, Rgba::BLACK);

        assert_eq!(img.get_pixel(10, 50), Some(Rgba::BLACK));
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::BLACK));
        assert_eq!(img.get_pixel(90, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_draw_line_diagonal() {
        let mut img = white(100, 100);
        draw_line(&mut img, 10, 10, 90, 90, Rgba::BLACK);
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_line_out_of_bounds() {
        let mut img = white(100, 100);
        draw_line(&mut img, -10, -10, 110, 110, Rgba::BLACK);
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_thick_line_covers_width() {
        let mut img = white(100, 100);
        draw_thick_line(&mut img, Point::new(10.0, 50.0), Point::new(90.0, 50.0), 6.0, Rgba::RED, &[]);
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::RED));
        assert_eq!(img.get_pixel(50, 52), Some(Rgba::RED));
        assert_eq!(img.get_pixel(50, 60), Some(Rgba::WHITE));
    }

    #[test]
    fn test_dashed_line_has_gaps() {
        let mut img = white(100, 20);
        draw_thick_line(
            &mut img,
            Point::new(0.0, 10.0),
            Point::new(100.0, 10.0),
            2.0,
            Rgba::BLACK,
            &[10.0, 10.0],
        );
        assert_eq!(img.get_pixel(4, 10), Some(Rgba::BLACK));
        assert_eq!(img.get_pixel(15, 10), Some(Rgba::WHITE));
        assert_eq!(img.get_pixel(25, 10), Some(Rgba::BLACK));
    }

    #[test]
    fn test_translucent_thick_line_blends_once() {
        let mut img = white(40, 40);
        let color = Rgba::new(0, 0, 0, 128);
        draw_thick_line(&mut img, Point::new(5.0, 20.0), Point::new(35.0, 20.0), 8.0, color, &[]);
        let a = img.get_pixel(20, 20).unwrap();
        let b = img.get_pixel(10, 18).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_circle() {
        let mut img = white(100, 100);
        draw_circle(&mut img, 50, 50, 20, Rgba::BLUE);
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::BLUE));
        assert_eq!(img.get_pixel(5, 5), Some(Rgba::WHITE));
    }

    #[test]
    fn test_draw_circle_outline() {
        let mut img = white(100, 100);
        draw_circle_outline(&mut img, 50, 50, 20, Rgba::GREEN);
        assert_eq!(img.get_pixel(70, 50), Some(Rgba::GREEN));
        assert_eq!(img.get_pixel(50, 50), Some(Rgba::WHITE));
    }

    #[test]
    fn test_circle_zero_radius() {
        let mut img = white(10, 10);
        draw_circle(&mut img, 5, 5, 0, Rgba::RED);
        assert_eq!(img.get_pixel(5, 5), Some(Rgba::RED));
    }

    #[test]
    fn test_arrow_draws_shaft_and_tip() {
        let mut img = white(60, 60);
        draw_arrow(&mut img, Point::new(10.0, 30.0), Point::new(50.0, 30.0), 2.0, Rgba::BLACK);
        assert_eq!(img.get_pixel(30, 30), Some(Rgba::BLACK));
        assert_eq!(img.get_pixel(50, 30), Some(Rgba::BLACK));
    }

    #[test]
    fn test_is_dash_on() {
        assert!(is_dash_on(&[], 0.0, 12.0));
        assert!(is_dash_on(&[4.0, 2.0], 6.0, 1.0));
        assert!(!is_dash_on(&[4.0, 2.0], 6.0, 5.0));
        assert!(is_dash_on(&[4.0, 2.0], 6.0, 7.0));
    }
}
