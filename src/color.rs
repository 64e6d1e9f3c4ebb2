//! Color types used by palettes and renderers.
//!
//! Palettes are sequences of opaque RGB colours; the alpha channel is only
//! used for overlay visualizations (graphs, metro lines, flow arrows) that are
//! composited over a background image.

use crate::error::{Error, Result};
use std::fmt;

/// RGBA color with 8-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Rgba {
    /// Red component (0-255).
    pub r: u8,
    /// Green component (0-255).
    pub g: u8,
    /// Blue component (0-255).
    pub b: u8,
    /// Alpha component (0-255, 255 = fully opaque).
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque red.
    pub const RED: Self = Self::new(255, 0, 0, 255);
    /// Opaque green.
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0, 0, 255, 255);

    /// Create a new RGBA color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color (alpha = 255).
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Convert to array representation.
    #[must_use]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Create from array representation.
    #[must_use]
    pub const fn from_array(arr: [u8; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Linear interpolation between two colors, rounding each channel.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };

        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Parse the `"r,g,b"` triplet used by the palette file format.
    pub fn parse_triplet(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(Error::PaletteFormat(format!(
                "expected 'red,green,blue', got '{text}'"
            )));
        }
        let channel = |s: &str| -> Result<u8> {
            s.parse::<u8>()
                .map_err(|e| Error::PaletteFormat(format!("bad colour channel '{s}': {e}")))
        };
        Ok(Self::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }

    /// Format as the `"r,g,b"` triplet of the palette file format.
    #[must_use]
    pub fn to_triplet(self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    /// `n` clearly distinguishable opaque colours, evenly spaced in hue.
    ///
    /// Used for class colours in thematic class maps.
    #[must_use]
    pub fn distinct(n: usize) -> Vec<Self> {
        (0..n)
            .map(|i| {
                let hue = 360.0 * i as f32 / n.max(1) as f32;
                // Alternate lightness so neighbouring hues stay apart for large n.
                let l = if i % 2 == 0 { 0.5 } else { 0.38 };
                Hsla::hsl(hue, 0.75, l).to_rgba()
            })
            .collect()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// HSLA color with floating-point components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsla {
    /// Hue (0.0-360.0 degrees).
    pub h: f32,
    /// Saturation (0.0-1.0).
    pub s: f32,
    /// Lightness (0.0-1.0).
    pub l: f32,
    /// Alpha (0.0-1.0).
    pub a: f32,
}

impl Hsla {
    /// Create a new HSLA color.
    #[must_use]
    pub const fn new(h: f32, s: f32, l: f32, a: f32) -> Self {
        Self { h, s, l, a }
    }

    /// Create an opaque HSL color (alpha = 1.0).
    #[must_use]
    pub const fn hsl(h: f32, s: f32, l: f32) -> Self {
        Self::new(h, s, l, 1.0)
    }

    /// Convert to RGBA.
    #[must_use]
    pub fn to_rgba(self) -> Rgba {
        let h = self.h / 360.0;
        let s = self.s;
        let l = self.l;

        let (r, g, b) = if s == 0.0 {
            (l, l, l)
        } else {
            let q = if l < 0.5 {
                l * (1.0 + s)
            } else {
                l + s - l * s
            };
            let p = 2.0 * l - q;

            (
                hue_to_rgb(p, q, h + 1.0 / 3.0),
                hue_to_rgb(p, q, h),
                hue_to_rgb(p, q, h - 1.0 / 3.0),
            )
        };

        Rgba::new(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
            (self.a * 255.0).round() as u8,
        )
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

impl From<Hsla> for Rgba {
    fn from(hsla: Hsla) -> Self {
        hsla.to_rgba()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_constants() {
        assert_eq!(Rgba::BLACK, Rgba::rgb(0, 0, 0));
        assert_eq!(Rgba::WHITE, Rgba::rgb(255, 255, 255));
        assert_eq!(Rgba::TRANSPARENT.a, 0);
    }

    #[test]
    fn test_lerp_midpoint_rounds() {
        let mid = Rgba::BLACK.lerp(Rgba::WHITE, 0.5);
        assert_eq!(mid, Rgba::rgb(128, 128, 128));
    }

    #[test]
    fn test_lerp_boundaries_clamped() {
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, -1.0), Rgba::BLACK);
        assert_eq!(Rgba::BLACK.lerp(Rgba::WHITE, 2.0), Rgba::WHITE);
    }

    #[test]
    fn test_triplet_round_trip() {
        let c = Rgba::rgb(12, 200, 7);
        assert_eq!(c.to_triplet(), "12,200,7");
        assert_eq!(Rgba::parse_triplet("12, 200 ,7").unwrap(), c);
    }

    #[test]
    fn test_triplet_rejects_garbage() {
        assert!(Rgba::parse_triplet("1,2").is_err());
        assert!(Rgba::parse_triplet("1,2,300").is_err());
        assert!(Rgba::parse_triplet("a,b,c").is_err());
    }

    #[test]
    fn test_hsla_primary_red() {
        let red = Hsla::hsl(0.0, 1.0, 0.5).to_rgba();
        assert_eq!((red.r, red.g, red.b), (255, 0, 0));
    }

    #[test]
    fn test_distinct_colours_differ() {
        let colours = Rgba::distinct(8);
        assert_eq!(colours.len(), 8);
        for (i, a) in colours.iter().enumerate() {
            assert_eq!(a.a, 255);
            for b in &colours[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_display_hex() {
        assert_eq!(Rgba::rgb(255, 0, 16).to_string(), "#ff0010");
    }
}
