//! Value matrices and their rasterization through a palette.
//!
//! A matrix whose resolution equals the unit grid maps one cell to one
//! unit. Other resolutions (the doubled U-Matrix grid) place cell `c` at
//! `(c * (X - 1) / (cols - 1) + 0.5) * unit_width`. Flat rendering gives each
//! cell the area between the midpoints to its neighbours; interpolated
//! rendering fits a natural bicubic spline through the cell centres.

use crate::algo::spline::BicubicSpline;
use crate::algo::stats;
use crate::cache::KeySection;
use crate::color::Rgba;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::Som;
use log::trace;
use std::sync::{Arc, Mutex, PoisonError};

/// Dense row-major `rows × cols` matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Zero-filled matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyData`] if either dimension is zero.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::from_vec(rows, cols, vec![0.0; rows * cols])
    }

    /// Wrap row-major values.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyData);
        }
        if values.len() != rows * cols {
            return Err(Error::DataLengthMismatch {
                expected: rows * cols,
                actual: values.len(),
            });
        }
        Ok(Self { rows, cols, values })
    }

    /// Matrix with one cell per unit of `som`, filled by `f(x, y)`.
    pub fn from_units(som: &Som, mut f: impl FnMut(usize, usize) -> Result<f64>) -> Result<Self> {
        let mut values = Vec::with_capacity(som.unit_count());
        for y in 0..som.y_size() {
            for x in 0..som.x_size() {
                values.push(f(x, y)?);
            }
        }
        Self::from_vec(som.y_size(), som.x_size(), values)
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Set the value at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] = value;
    }

    /// Minimum and maximum, ignoring NaN.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        stats::min_max(&self.values)
    }

    /// Copy scaled into `[0, 1]`; applying it twice changes nothing.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            values: stats::normalize(&self.values),
        }
    }

    /// Copy surrounded by a one-cell ring.
    ///
    /// With `median_ring` each ring cell is the median of its inner
    /// neighbours; otherwise it copies the nearest edge cell.
    #[must_use]
    pub fn with_ring(&self, median_ring: bool) -> Self {
        self.padded(median_ring, true, true)
    }

    /// Copy with a one-cell border on the selected axes only.
    #[must_use]
    pub fn padded(&self, median_ring: bool, pad_rows: bool, pad_cols: bool) -> Self {
        let (dr0, dc0) = (usize::from(pad_rows), usize::from(pad_cols));
        let (rows, cols) = (self.rows + 2 * dr0, self.cols + 2 * dc0);
        let mut values = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                let inner_r = r as isize - dr0 as isize;
                let inner_c = c as isize - dc0 as isize;
                values[r * cols + c] = if self.contains(inner_r, inner_c) {
                    self.get(inner_r as usize, inner_c as usize)
                } else if median_ring {
                    let mut neighbours = Vec::with_capacity(3);
                    for dr in -1..=1 {
                        for dc in -1..=1 {
                            if self.contains(inner_r + dr, inner_c + dc) {
                                neighbours.push(self.get((inner_r + dr) as usize, (inner_c + dc) as usize));
                            }
                        }
                    }
                    stats::median(&neighbours)
                } else {
                    let rr = inner_r.clamp(0, self.rows as isize - 1) as usize;
                    let cc = inner_c.clamp(0, self.cols as isize - 1) as usize;
                    self.get(rr, cc)
                };
            }
        }
        Self { rows, cols, values }
    }

    fn contains(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }
}

/// Hit counts per unit, `y_size × x_size`.
pub fn hit_histogram(som: &Som) -> Result<Matrix> {
    Matrix::from_units(som, |x, y| Ok(som.hits(x, y) as f64))
}

/// How a matrix is turned into pixels.
#[derive(Debug, Clone)]
pub struct MatrixSettings {
    /// Colour lookup.
    pub palette: Arc<Palette>,
    /// Bicubic smoothing instead of flat cells.
    pub interpolate: bool,
    /// Number of quantized bands; below 2 disables contours.
    pub contour_levels: usize,
    /// Paint units without hits white even on non-mnemonic maps.
    pub blank_empty_units: bool,
}

impl MatrixSettings {
    /// Settings with the given palette and defaults otherwise.
    #[must_use]
    pub fn new(palette: Arc<Palette>) -> Self {
        Self {
            palette,
            interpolate: true,
            contour_levels: 0,
            blank_empty_units: false,
        }
    }

    /// Settings seeded from the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig, palette: Arc<Palette>) -> Self {
        Self {
            palette,
            interpolate: config.interpolate,
            contour_levels: config.contour_levels,
            blank_empty_units: false,
        }
    }

    /// Cache key section covering every rendering-relevant field.
    #[must_use]
    pub fn key_section(&self) -> KeySection {
        KeySection::new()
            .with("palette", self.palette.short_name())
            .with("pal#", format!("{:x}", self.palette.content_hash()))
            .with("interp", self.interpolate)
            .with("contours", self.contour_levels)
            .with("blank", self.blank_empty_units)
    }
}

/// Matrix settings plus the value range of the last rendering.
#[derive(Debug)]
pub struct MatrixCore {
    settings: MatrixSettings,
    range: Mutex<Option<(f64, f64)>>,
}

impl MatrixCore {
    /// Wrap settings.
    #[must_use]
    pub fn new(settings: MatrixSettings) -> Self {
        Self {
            settings,
            range: Mutex::new(None),
        }
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &MatrixSettings {
        &self.settings
    }

    /// Mutable settings; callers must invalidate cached images afterwards.
    pub fn settings_mut(&mut self) -> &mut MatrixSettings {
        &mut self.settings
    }

    /// Smallest value of the most recently rendered matrix.
    pub fn minimum_matrix_value(&self) -> Option<f64> {
        self.last_range().map(|r| r.0)
    }

    /// Largest value of the most recently rendered matrix.
    pub fn maximum_matrix_value(&self) -> Option<f64> {
        self.last_range().map(|r| r.1)
    }

    fn last_range(&self) -> Option<(f64, f64)> {
        *self.range.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render `matrix` for `som` and record the range of the values sampled
    /// while rasterizing it.
    pub fn render(&self, matrix: &Matrix, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        let (image, range) = rasterize(matrix, som, &self.settings, width, height)?;
        *self.range.lock().unwrap_or_else(PoisonError::into_inner) = range;
        Ok(image)
    }
}

/// Support position of cell `c` among `n` cells spread over `units` units.
fn support_position(c: f64, n: usize, units: usize, unit_size: f64) -> f64 {
    let step = if n > 1 {
        (units - 1) as f64 / (n - 1) as f64
    } else {
        0.0
    };
    let offset = if n > 1 { 0.0 } else { (units - 1) as f64 / 2.0 };
    (c * step + offset + 0.5) * unit_size
}

/// Cell index (0-based, `cells` cells with support positions `pos`) owning
/// each pixel centre along one axis.
fn pixel_cells(pos: &[f64], pixels: u32, extent: f64) -> Vec<usize> {
    let mut bounds = Vec::with_capacity(pos.len() + 1);
    bounds.push(0.0);
    bounds.extend(pos.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    bounds.push(extent);
    (0..pixels)
        .map(|p| {
            let centre = f64::from(p) + 0.5;
            bounds
                .partition_point(|&b| b <= centre)
                .saturating_sub(1)
                .min(pos.len() - 1)
        })
        .collect()
}

/// Rasterize `matrix` over the unit grid of `som`.
pub fn render_matrix(
    matrix: &Matrix,
    som: &Som,
    settings: &MatrixSettings,
    width: u32,
    height: u32,
) -> Result<RasterImage> {
    rasterize(matrix, som, settings, width, height).map(|(image, _)| image)
}

/// Smallest and largest non-NaN value in `values`.
fn sampled_range(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().filter(|v| !v.is_nan()).fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Rasterize `matrix` and return the image with the range of the sampled
/// heights. Interpolated heights may overshoot the cell values, so colours
/// are normalized against that range.
fn rasterize(
    matrix: &Matrix,
    som: &Som,
    settings: &MatrixSettings,
    width: u32,
    height: u32,
) -> Result<(RasterImage, Option<(f64, f64)>)> {
    let mut image = RasterImage::filled(width, height, Rgba::WHITE)?;

    let unit_w = f64::from(width) / som.x_size() as f64;
    let unit_h = f64::from(height) / som.y_size() as f64;

    let mut heights = vec![f64::NAN; width as usize * height as usize];

    if settings.interpolate {
        let padded = matrix.with_ring(false);
        let mut xs = vec![0.0];
        xs.extend((0..matrix.cols()).map(|c| support_position(c as f64, matrix.cols(), som.x_size(), unit_w)));
        xs.push(f64::from(width));
        let mut ys = vec![0.0];
        ys.extend((0..matrix.rows()).map(|r| support_position(r as f64, matrix.rows(), som.y_size(), unit_h)));
        ys.push(f64::from(height));
        let spline = BicubicSpline::new(xs, ys, padded.values().to_vec())?;

        let px: Vec<f64> = (0..width).map(|x| f64::from(x) + 0.5).collect();
        let py: Vec<f64> = (0..height).map(|y| f64::from(y) + 0.5).collect();
        let total = px.len() * py.len();
        let every = (total / 500).max(5000);
        let mut next_report = every;
        let sampled = spline.sample_grid(&px, &py, |done| {
            if done >= next_report {
                trace!("interpolated {done}/{total} pixels");
                next_report = (done / every + 1) * every;
            }
        });
        for (h, v) in heights.iter_mut().zip(sampled) {
            *h = v;
        }
    } else {
        // Axes whose resolution differs from the unit grid get a median ring.
        let ring_cols = matrix.cols() != som.x_size();
        let ring_rows = matrix.rows() != som.y_size();
        let grid = matrix.padded(true, ring_rows, ring_cols);
        let col_offset = f64::from(u8::from(ring_cols));
        let row_offset = f64::from(u8::from(ring_rows));
        let col_pos: Vec<f64> = (0..grid.cols())
            .map(|c| support_position(c as f64 - col_offset, matrix.cols(), som.x_size(), unit_w))
            .collect();
        let row_pos: Vec<f64> = (0..grid.rows())
            .map(|r| support_position(r as f64 - row_offset, matrix.rows(), som.y_size(), unit_h))
            .collect();
        let cols = pixel_cells(&col_pos, width, f64::from(width));
        let rows = pixel_cells(&row_pos, height, f64::from(height));
        for (y, &r) in rows.iter().enumerate() {
            for (x, &c) in cols.iter().enumerate() {
                heights[y * width as usize + x] = grid.get(r, c);
            }
        }
    }

    let range = sampled_range(&heights);
    let (lo, hi) = range.unwrap_or((0.0, 0.0));
    let span = hi - lo;
    for h in heights.iter_mut().filter(|h| !h.is_nan()) {
        *h = if span > 0.0 { (*h - lo) / span } else { 0.0 };
    }

    let palette = &settings.palette;
    let levels = settings.contour_levels;
    let band = |v: f64| -> usize { ((v.clamp(0.0, 1.0) * levels as f64) as usize).min(levels - 1) };

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * width as usize + x as usize;
            let v = heights[idx];
            if v.is_nan() {
                continue;
            }
            let colour = if levels >= 2 {
                let b = band(v);
                let right = (x + 1 < width).then(|| heights[idx + 1]);
                let below = (y + 1 < height).then(|| heights[idx + width as usize]);
                let edge = [right, below]
                    .into_iter()
                    .flatten()
                    .any(|n| !n.is_nan() && band(n) != b);
                if edge {
                    Rgba::BLACK
                } else {
                    palette.colour_for_value(b as f64 / (levels - 1) as f64)
                }
            } else {
                palette.colour_for_value(v)
            };
            image.set_pixel(x, y, colour);
        }
    }

    if som.is_mnemonic() || settings.blank_empty_units {
        blank_empty_units(&mut image, som);
    }
    Ok((image, range))
}

/// Paint every unit without hits white.
pub fn blank_empty_units(image: &mut RasterImage, som: &Som) {
    let unit_w = f64::from(image.width()) / som.x_size() as f64;
    let unit_h = f64::from(image.height()) / som.y_size() as f64;
    for y in 0..som.y_size() {
        for x in 0..som.x_size() {
            if som.hits(x, y) == 0 {
                let x0 = (x as f64 * unit_w).round() as u32;
                let y0 = (y as f64 * unit_h).round() as u32;
                let x1 = ((x + 1) as f64 * unit_w).round() as u32;
                let y1 = ((y + 1) as f64 * unit_h).round() as u32;
                image.fill_rect(x0, y0, x1 - x0, y1 - y0, Rgba::WHITE);
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Normalization maps into [0, 1] and is idempotent.
        #[test]
        fn prop_matrix_normalized_idempotent(
            values in prop::collection::vec(-1e3f64..1e3, 1..64)
        ) {
            let m = Matrix::from_vec(1, values.len(), values).unwrap();
            let n = m.normalized();
            prop_assert!(n.values().iter().all(|v| (0.0..=1.0).contains(v)));
            let nn = n.normalized();
            for (a, b) in n.values().iter().zip(nn.values()) {
                prop_assert!((a - b).abs() < 1e-12);
            }
        }

        /// Every interpolated height lies inside the recorded range.
        #[test]
        fn prop_recorded_range_covers_sampled_values(
            values in prop::collection::vec(-10.0f64..10.0, 6),
            width in 8u32..64,
            height in 8u32..64
        ) {
            let som = Som::from_fn(3, 2, 1, |x, _| vec![x as f64]).unwrap();
            let m = Matrix::from_vec(2, 3, values).unwrap();
            let core = MatrixCore::new(MatrixSettings::new(Arc::new(
                crate::palette::GradientFactory::palette("grey", 256).unwrap(),
            )));
            core.render(&m, &som, width, height).unwrap();
            let lo = core.minimum_matrix_value().unwrap();
            let hi = core.maximum_matrix_value().unwrap();
            prop_assert!(lo <= hi);

            // Resample the surface the renderer builds.
            let padded = m.with_ring(false);
            let unit_w = f64::from(width) / 3.0;
            let unit_h = f64::from(height) / 2.0;
            let mut xs = vec![0.0];
            xs.extend((0..3).map(|c| support_position(c as f64, 3, 3, unit_w)));
            xs.push(f64::from(width));
            let mut ys = vec![0.0];
            ys.extend((0..2).map(|r| support_position(r as f64, 2, 2, unit_h)));
            ys.push(f64::from(height));
            let spline = BicubicSpline::new(xs, ys, padded.values().to_vec()).unwrap();
            for y in 0..height {
                for x in 0..width {
                    let v = spline.eval(f64::from(x) + 0.5, f64::from(y) + 0.5);
                    prop_assert!(lo - 1e-9 <= v && v <= hi + 1e-9, "{} outside [{}, {}]", v, lo, hi);
                }
            }
        }
    }
}
