//! In-memory raster images produced by visualizers.
//!
//! A [`RasterImage`] is a tightly packed RGBA8 pixel buffer. Matrix
//! visualizers produce opaque images; graph-like overlays (metro lines,
//! spanning trees, flow arrows) start from a transparent buffer and are
//! composited over a background image.

use crate::color::Rgba;
use crate::error::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use trueno::Vector;

/// Bytes stored per pixel (RGBA, 8 bit per channel).
pub const BYTES_PER_PIXEL: usize = 4;

/// RGBA raster image in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    /// Four bytes per pixel: [R, G, B, A].
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Create a fully transparent image.
    ///
    /// # Errors
    ///
    /// Returns an error if width or height is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use som_viz::image::RasterImage;
    ///
    /// let img = RasterImage::new(40, 30).unwrap();
    /// assert_eq!(img.byte_size(), 40 * 30 * 4);
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * BYTES_PER_PIXEL],
        })
    }

    /// Create an image filled with one colour.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self> {
        let mut img = Self::new(width, height)?;
        img.clear(color);
        Ok(img)
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Estimated memory footprint: `width * height * BYTES_PER_PIXEL`.
    #[must_use]
    pub const fn byte_size(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }

    /// Raw pixel bytes.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Fill the whole image with one colour.
    pub fn clear(&mut self, color: Rgba) {
        let rgba = color.to_array();
        for chunk in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&rgba);
        }
    }

    /// Fill a rectangle, clamped to the image bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgba) {
        let x1 = x.min(self.width);
        let y1 = y.min(self.height);
        let x2 = x.saturating_add(w).min(self.width);
        let y2 = y.saturating_add(h).min(self.height);
        if x1 >= x2 || y1 >= y2 {
            return;
        }

        let rgba = color.to_array();
        for row_y in y1..y2 {
            let start = self.pixel_index(x1, row_y);
            let end = self.pixel_index(x2, row_y);
            for chunk in self.pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                chunk.copy_from_slice(&rgba);
            }
        }
    }

    /// Colour at a pixel, `None` when out of bounds.
    #[must_use]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.pixel_index(x, y);
        Some(Rgba::from_array([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]))
    }

    /// Set a pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.pixel_index(x, y);
        self.pixels[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&color.to_array());
    }

    /// Alpha-blend a colour onto a pixel ("over" operator).
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }

        let idx = self.pixel_index(x, y);
        let src_a = f32::from(color.a) / 255.0;
        let dst_a = f32::from(self.pixels[idx + 3]) / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);

        if out_a > 0.0 {
            let blend = |src: u8, dst: u8| -> u8 {
                let src_f = f32::from(src) / 255.0;
                let dst_f = f32::from(dst) / 255.0;
                let out = (src_f * src_a + dst_f * dst_a * (1.0 - src_a)) / out_a;
                (out * 255.0).round() as u8
            };

            self.pixels[idx] = blend(color.r, self.pixels[idx]);
            self.pixels[idx + 1] = blend(color.g, self.pixels[idx + 1]);
            self.pixels[idx + 2] = blend(color.b, self.pixels[idx + 2]);
            self.pixels[idx + 3] = (out_a * 255.0).round() as u8;
        }
    }

    /// Multiply the alpha channel by `opacity` (clamped to [0, 1]).
    pub fn scale_alpha(&mut self, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        for chunk in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk[3] = (f32::from(chunk[3]) * opacity).round() as u8;
        }
    }

    /// Composite this image over `background` with the given opacity.
    ///
    /// Each pixel's effective alpha is its own alpha times `opacity`; the
    /// result is opaque wherever the background is. Uses trueno vectors for
    /// the per-row weighted sums.
    ///
    /// # Errors
    ///
    /// Returns an error if the images have different dimensions.
    pub fn composite_over(&self, background: &RasterImage, opacity: f32) -> Result<RasterImage> {
        if self.width != background.width || self.height != background.height {
            return Err(Error::InvalidDimensions {
                width: background.width,
                height: background.height,
            });
        }

        let opacity = opacity.clamp(0.0, 1.0);
        let row_bytes = (self.width as usize) * BYTES_PER_PIXEL;
        let mut out = background.clone();

        for y in 0..self.height as usize {
            let start = y * row_bytes;
            let src = &self.pixels[start..start + row_bytes];
            let dst = &background.pixels[start..start + row_bytes];

            let mut weights = Vec::with_capacity(row_bytes);
            let mut inverse = Vec::with_capacity(row_bytes);
            for chunk in src.chunks_exact(BYTES_PER_PIXEL) {
                let w = f32::from(chunk[3]) / 255.0 * opacity;
                weights.extend_from_slice(&[w, w, w, 0.0]);
                inverse.extend_from_slice(&[1.0 - w, 1.0 - w, 1.0 - w, 1.0]);
            }

            let src_vec = Vector::from_vec(src.iter().map(|&b| f32::from(b)).collect());
            let dst_vec = Vector::from_vec(dst.iter().map(|&b| f32::from(b)).collect());

            if let (Ok(src_scaled), Ok(dst_scaled)) = (
                src_vec.mul(&Vector::from_vec(weights)),
                dst_vec.mul(&Vector::from_vec(inverse)),
            ) {
                if let Ok(result) = src_scaled.add(&dst_scaled) {
                    let row = &mut out.pixels[start..start + row_bytes];
                    for (i, &v) in result.as_slice().iter().enumerate() {
                        row[i] = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }

        Ok(out)
    }

    /// Content hash, used to identify background images in cache keys.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.pixels.hash(&mut hasher);
        hasher.finish()
    }

    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_transparent() {
        let img = RasterImage::new(10, 5).unwrap();
        assert_eq!(img.pixel_count(), 50);
        assert_eq!(img.byte_size(), 200);
        assert_eq!(img.get_pixel(3, 3), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(RasterImage::new(0, 10).is_err());
        assert!(RasterImage::new(10, 0).is_err());
    }

    #[test]
    fn test_fill_rect_clamped() {
        let mut img = RasterImage::filled(20, 20, Rgba::WHITE).unwrap();
        img.fill_rect(15, 15, 100, 100, Rgba::RED);
        assert_eq!(img.get_pixel(19, 19), Some(Rgba::RED));
        assert_eq!(img.get_pixel(14, 14), Some(Rgba::WHITE));
    }

    #[test]
    fn test_set_pixel_out_of_bounds_ignored() {
        let mut img = RasterImage::new(4, 4).unwrap();
        img.set_pixel(10, 10, Rgba::RED);
        assert_eq!(img.get_pixel(10, 10), None);
    }

    #[test]
    fn test_blend_pixel_over_white() {
        let mut img = RasterImage::filled(2, 2, Rgba::WHITE).unwrap();
        img.blend_pixel(0, 0, Rgba::new(255, 0, 0, 128));
        let p = img.get_pixel(0, 0).unwrap();
        assert_eq!(p.r, 255);
        assert!(p.g > 100 && p.g < 150);
        assert_eq!(p.a, 255);
    }

    #[test]
    fn test_composite_full_opacity_keeps_opaque_overlay() {
        let overlay = RasterImage::filled(8, 8, Rgba::RED).unwrap();
        let background = RasterImage::filled(8, 8, Rgba::BLUE).unwrap();
        let out = overlay.composite_over(&background, 1.0).unwrap();
        assert_eq!(out.get_pixel(4, 4), Some(Rgba::RED));
    }

    #[test]
    fn test_composite_transparent_overlay_shows_background() {
        let overlay = RasterImage::new(8, 8).unwrap();
        let background = RasterImage::filled(8, 8, Rgba::BLUE).unwrap();
        let out = overlay.composite_over(&background, 1.0).unwrap();
        assert_eq!(out.get_pixel(1, 1), Some(Rgba::BLUE));
    }

    #[test]
    fn test_composite_half_opacity_mixes() {
        let overlay = RasterImage::filled(4, 4, Rgba::WHITE).unwrap();
        let background = RasterImage::filled(4, 4, Rgba::BLACK).unwrap();
        let out = overlay.composite_over(&background, 0.5).unwrap();
        let p = out.get_pixel(0, 0).unwrap();
        assert!(p.r > 120 && p.r < 135);
        assert_eq!(p.a, 255);
    }

    #[test]
    fn test_composite_dimension_mismatch() {
        let a = RasterImage::new(4, 4).unwrap();
        let b = RasterImage::new(5, 4).unwrap();
        assert!(a.composite_over(&b, 1.0).is_err());
    }

    #[test]
    fn test_scale_alpha() {
        let mut img = RasterImage::filled(2, 2, Rgba::RED).unwrap();
        img.scale_alpha(0.5);
        assert_eq!(img.get_pixel(0, 0).unwrap().a, 128);
    }

    #[test]
    fn test_content_hash_tracks_pixels() {
        let a = RasterImage::filled(3, 3, Rgba::RED).unwrap();
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        b.set_pixel(1, 1, Rgba::BLUE);
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
