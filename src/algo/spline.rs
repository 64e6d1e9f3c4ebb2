//! Natural cubic and bicubic spline interpolation.
//!
//! The bicubic surface is separable: a natural cubic spline per row along x,
//! then a spline along y through the row values at the requested x.

use crate::error::{Error, Result};

/// Natural cubic spline through `(xs[i], ys[i])`, `xs` strictly increasing.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural spline (zero second derivative at both ends).
    ///
    /// # Errors
    ///
    /// Fails for empty input, mismatched lengths or non-increasing `xs`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        if xs.is_empty() {
            return Err(Error::EmptyData);
        }
        if xs.len() != ys.len() {
            return Err(Error::DataLengthMismatch {
                expected: xs.len(),
                actual: ys.len(),
            });
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidMode(
                "spline support positions must be strictly increasing".to_string(),
            ));
        }
        let second = second_derivatives(&xs, &ys);
        Ok(Self { xs, ys, second })
    }

    /// Value at `x`; positions outside the support are clamped to its ends.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        evaluate(&self.xs, &self.ys, &self.second, x)
    }
}

fn second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut y2 = vec![0.0; n];
    if n < 3 {
        return y2;
    }
    let mut u = vec![0.0; n];
    for i in 1..n - 1 {
        let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
        let p = sig * y2[i - 1] + 2.0;
        y2[i] = (sig - 1.0) / p;
        let slope = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]) - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
        u[i] = (6.0 * slope / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
    }
    y2[n - 1] = 0.0;
    for k in (0..n - 1).rev() {
        y2[k] = y2[k] * y2[k + 1] + u[k];
    }
    y2
}

fn evaluate(xs: &[f64], ys: &[f64], y2: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if n == 1 {
        return ys[0];
    }
    let x = x.clamp(xs[0], xs[n - 1]);
    // First support position strictly greater than x, kept inside [1, n-1].
    let hi = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let lo = hi - 1;
    let h = xs[hi] - xs[lo];
    let a = (xs[hi] - x) / h;
    let b = (x - xs[lo]) / h;
    a * ys[lo]
        + b * ys[hi]
        + ((a * a * a - a) * y2[lo] + (b * b * b - b) * y2[hi]) * (h * h) / 6.0
}

/// Bicubic spline over a rectilinear grid of support values.
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Row-major `ys.len() × xs.len()` values.
    values: Vec<f64>,
    /// Second derivatives of each row along x.
    row_second: Vec<f64>,
}

impl BicubicSpline {
    /// Fit a surface through `values[row * xs.len() + col]` at `(xs[col], ys[row])`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if xs.is_empty() || ys.is_empty() {
            return Err(Error::EmptyData);
        }
        if values.len() != xs.len() * ys.len() {
            return Err(Error::DataLengthMismatch {
                expected: xs.len() * ys.len(),
                actual: values.len(),
            });
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) || ys.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidMode(
                "spline support positions must be strictly increasing".to_string(),
            ));
        }
        let nx = xs.len();
        let row_second = values
            .chunks(nx)
            .flat_map(|row| second_derivatives(&xs, row))
            .collect();
        Ok(Self {
            xs,
            ys,
            values,
            row_second,
        })
    }

    fn column_at(&self, x: f64) -> Vec<f64> {
        let nx = self.xs.len();
        self.values
            .chunks(nx)
            .zip(self.row_second.chunks(nx))
            .map(|(row, y2)| evaluate(&self.xs, row, y2, x))
            .collect()
    }

    /// Value at `(x, y)`.
    #[must_use]
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let column = self.column_at(x);
        let y2 = second_derivatives(&self.ys, &column);
        evaluate(&self.ys, &column, &y2, y)
    }

    /// Values at every `(px[i], py[j])`, returned row-major (`py.len()` rows).
    ///
    /// `progress` is called with the number of samples produced so far after
    /// each column.
    pub fn sample_grid(&self, px: &[f64], py: &[f64], mut progress: impl FnMut(usize)) -> Vec<f64> {
        let w = px.len();
        let mut out = vec![0.0; w * py.len()];
        for (i, &x) in px.iter().enumerate() {
            let column = self.column_at(x);
            let y2 = second_derivatives(&self.ys, &column);
            for (j, &y) in py.iter().enumerate() {
                out[j * w + i] = evaluate(&self.ys, &column, &y2, y);
            }
            progress((i + 1) * py.len());
        }
        out
    }
}
