//! Colour palettes and gradients.
//!
//! A [`Palette`] is a fixed-length sequence of colours; matrix values in
//! `[0, 1]` are mapped to colour index `round(value * max_colour_index)`.
//! A palette may be backed by a [`ColorGradient`], in which case its colour
//! array is regenerated whenever the gradient or the colour count changes.

mod xml;

pub use xml::load_palette_dir;

use crate::color::Rgba;
use crate::error::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default number of colours generated from a gradient.
pub const DEFAULT_COLOUR_COUNT: usize = 256;

/// One control point of a [`ColorGradient`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientPoint {
    /// Position in `[0, 1]`.
    pub position: f64,
    /// Colour at that position.
    pub colour: Rgba,
}

impl GradientPoint {
    /// Create a control point.
    #[must_use]
    pub const fn new(position: f64, colour: Rgba) -> Self {
        Self { position, colour }
    }
}

/// Piecewise-linear colour gradient over `[0, 1]`.
///
/// Invariants: at least two points, sorted by position, the first at 0 and
/// the last at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    points: Vec<GradientPoint>,
}

impl ColorGradient {
    /// Create a gradient from control points (sorted on construction).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PaletteFormat`] if fewer than two points are given,
    /// a position lies outside `[0, 1]`, or the ends are not at 0 and 1.
    pub fn new(mut points: Vec<GradientPoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::PaletteFormat(
                "a gradient needs at least two points".to_string(),
            ));
        }
        if let Some(p) = points
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.position) || p.position.is_nan())
        {
            return Err(Error::PaletteFormat(format!(
                "gradient position {} outside [0, 1]",
                p.position
            )));
        }
        points.sort_by(|a, b| a.position.total_cmp(&b.position));
        let first = points[0].position;
        let last = points[points.len() - 1].position;
        if first != 0.0 || last != 1.0 {
            return Err(Error::PaletteFormat(format!(
                "gradient must span [0, 1], spans [{first}, {last}]"
            )));
        }
        Ok(Self { points })
    }

    /// Evenly spaced gradient through the given colours.
    pub fn even(colours: &[Rgba]) -> Result<Self> {
        let n = colours.len();
        if n < 2 {
            return Err(Error::PaletteFormat(
                "a gradient needs at least two colours".to_string(),
            ));
        }
        Self::new(
            colours
                .iter()
                .enumerate()
                .map(|(i, c)| GradientPoint::new(i as f64 / (n - 1) as f64, *c))
                .collect(),
        )
    }

    /// Control points, sorted by position.
    #[must_use]
    pub fn points(&self) -> &[GradientPoint] {
        &self.points
    }

    /// Interpolated colour at `t` (clamped to `[0, 1]`).
    #[must_use]
    pub fn colour_at(&self, t: f64) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let upper = self
            .points
            .iter()
            .position(|p| p.position >= t)
            .unwrap_or(self.points.len() - 1);
        if upper == 0 {
            return self.points[0].colour;
        }
        let lo = self.points[upper - 1];
        let hi = self.points[upper];
        let span = hi.position - lo.position;
        if span <= 0.0 {
            return hi.colour;
        }
        lo.colour.lerp(hi.colour, (t - lo.position) / span)
    }

    /// Insert a control point strictly inside `(0, 1)`.
    pub fn insert(&mut self, position: f64, colour: Rgba) -> Result<()> {
        if !(position > 0.0 && position < 1.0) {
            return Err(Error::PaletteFormat(format!(
                "inserted gradient position {position} must lie strictly inside (0, 1)"
            )));
        }
        let idx = self
            .points
            .iter()
            .position(|p| p.position > position)
            .unwrap_or(self.points.len());
        self.points.insert(idx, GradientPoint::new(position, colour));
        Ok(())
    }

    /// Remove an inner control point; the end points cannot be removed.
    pub fn remove(&mut self, index: usize) -> Result<GradientPoint> {
        if index == 0 || index + 1 >= self.points.len() {
            return Err(Error::PaletteFormat(format!(
                "gradient point {index} is an end point or does not exist"
            )));
        }
        Ok(self.points.remove(index))
    }

    /// Sample `n` evenly spaced colours.
    #[must_use]
    pub fn sample(&self, n: usize) -> Vec<Rgba> {
        match n {
            0 => Vec::new(),
            1 => vec![self.colour_at(0.0)],
            _ => (0..n)
                .map(|i| self.colour_at(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

/// An ordered, fixed-length sequence of colours.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    short_name: String,
    name: String,
    description: String,
    colours: Vec<Rgba>,
    gradient: Option<ColorGradient>,
    reversed: bool,
}

impl Palette {
    /// Create a plain palette from an explicit colour list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyData`] if `colours` is empty.
    pub fn new(short_name: &str, name: &str, description: &str, colours: Vec<Rgba>) -> Result<Self> {
        if colours.is_empty() {
            return Err(Error::EmptyData);
        }
        Ok(Self {
            short_name: short_name.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            colours,
            gradient: None,
            reversed: false,
        })
    }

    /// Create a gradient-backed palette with `count` colours.
    pub fn from_gradient(
        short_name: &str,
        name: &str,
        description: &str,
        gradient: ColorGradient,
        count: usize,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyData);
        }
        Ok(Self {
            short_name: short_name.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            colours: gradient.sample(count),
            gradient: Some(gradient),
            reversed: false,
        })
    }

    /// Short identifier.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current colour array (reversed if the palette is reversed).
    #[must_use]
    pub fn colours(&self) -> &[Rgba] {
        &self.colours
    }

    /// Number of colours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colours.len()
    }

    /// Always false; palettes hold at least one colour.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colours.is_empty()
    }

    /// Largest valid colour index.
    #[must_use]
    pub fn max_colour_index(&self) -> usize {
        self.colours.len() - 1
    }

    /// Backing gradient, if any.
    #[must_use]
    pub fn gradient(&self) -> Option<&ColorGradient> {
        self.gradient.as_ref()
    }

    /// Whether the colour order is reversed.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Colour at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColourIndex`] when `index > max_colour_index()`.
    pub fn colour_at(&self, index: usize) -> Result<Rgba> {
        self.colours
            .get(index)
            .copied()
            .ok_or_else(|| Error::ColourIndex {
                palette: self.short_name.clone(),
                index,
                max: self.max_colour_index(),
            })
    }

    /// Colour at `index`, clamping out-of-range indices to the ends.
    #[must_use]
    pub fn colour_at_clamped(&self, index: i64) -> Rgba {
        let idx = index.clamp(0, self.max_colour_index() as i64) as usize;
        self.colours[idx]
    }

    /// Colour for a normalized value: index `round(value * max_colour_index)`.
    #[must_use]
    pub fn colour_for_value(&self, value: f64) -> Rgba {
        if value.is_nan() {
            return self.colours[0];
        }
        self.colour_at_clamped((value * self.max_colour_index() as f64).round() as i64)
    }

    /// Toggle the reversed flag and reverse the colour array.
    pub fn reverse(&mut self) {
        self.reversed = !self.reversed;
        self.colours.reverse();
    }

    /// Replace the colours of a plain palette; drops any gradient backing.
    pub fn set_colours(&mut self, colours: Vec<Rgba>) -> Result<()> {
        if colours.is_empty() {
            return Err(Error::EmptyData);
        }
        self.colours = colours;
        self.gradient = None;
        if self.reversed {
            self.colours.reverse();
        }
        Ok(())
    }

    /// Replace the backing gradient and regenerate the colours.
    pub fn set_gradient(&mut self, gradient: ColorGradient) {
        self.gradient = Some(gradient);
        self.regenerate(self.colours.len());
    }

    /// Change the number of colours generated from the gradient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMode`] for plain palettes and
    /// [`Error::EmptyData`] for a zero count.
    pub fn set_colour_count(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::EmptyData);
        }
        if self.gradient.is_none() {
            return Err(Error::InvalidMode(format!(
                "palette '{}' has no gradient to resample",
                self.short_name
            )));
        }
        self.regenerate(count);
        Ok(())
    }

    /// Insert a gradient stop and regenerate.
    pub fn insert_gradient_point(&mut self, position: f64, colour: Rgba) -> Result<()> {
        let gradient = self.gradient.as_mut().ok_or_else(|| {
            Error::InvalidMode(format!("palette '{}' has no gradient", self.short_name))
        })?;
        gradient.insert(position, colour)?;
        self.regenerate(self.colours.len());
        Ok(())
    }

    /// Remove an inner gradient stop and regenerate.
    pub fn remove_gradient_point(&mut self, index: usize) -> Result<GradientPoint> {
        let gradient = self.gradient.as_mut().ok_or_else(|| {
            Error::InvalidMode(format!("palette '{}' has no gradient", self.short_name))
        })?;
        let removed = gradient.remove(index)?;
        self.regenerate(self.colours.len());
        Ok(removed)
    }

    /// Hash over name, colours and reversal; part of every matrix cache key.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.short_name.hash(&mut hasher);
        self.colours.hash(&mut hasher);
        self.reversed.hash(&mut hasher);
        hasher.finish()
    }

    fn regenerate(&mut self, count: usize) {
        if let Some(gradient) = &self.gradient {
            self.colours = gradient.sample(count);
            if self.reversed {
                self.colours.reverse();
            }
        }
    }
}

/// Factory for the built-in named gradients.
pub struct GradientFactory;

impl GradientFactory {
    /// Short names of all built-in gradients.
    pub const NAMES: [&'static str; 7] = [
        "rainbow",
        "grey",
        "heat",
        "redscale",
        "matlab-jet",
        "island",
        "bwr",
    ];

    /// Look up a built-in gradient by short name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<(&'static str, ColorGradient)> {
        let (long, stops): (&'static str, Vec<(f64, Rgba)>) = match name {
            "rainbow" => (
                "Rainbow",
                vec![
                    (0.0, Rgba::rgb(0, 0, 255)),
                    (0.25, Rgba::rgb(0, 255, 255)),
                    (0.5, Rgba::rgb(0, 255, 0)),
                    (0.75, Rgba::rgb(255, 255, 0)),
                    (1.0, Rgba::rgb(255, 0, 0)),
                ],
            ),
            "grey" => ("Greyscale", vec![(0.0, Rgba::BLACK), (1.0, Rgba::WHITE)]),
            "heat" => (
                "Heat",
                vec![
                    (0.0, Rgba::BLACK),
                    (0.4, Rgba::rgb(220, 0, 0)),
                    (0.8, Rgba::rgb(255, 230, 0)),
                    (1.0, Rgba::WHITE),
                ],
            ),
            "redscale" => (
                "Red scale",
                vec![(0.0, Rgba::WHITE), (1.0, Rgba::rgb(128, 0, 0))],
            ),
            "matlab-jet" => (
                "Jet",
                vec![
                    (0.0, Rgba::rgb(0, 0, 143)),
                    (0.125, Rgba::rgb(0, 0, 255)),
                    (0.375, Rgba::rgb(0, 255, 255)),
                    (0.625, Rgba::rgb(255, 255, 0)),
                    (0.875, Rgba::rgb(255, 0, 0)),
                    (1.0, Rgba::rgb(128, 0, 0)),
                ],
            ),
            "island" => (
                "Island",
                vec![
                    (0.0, Rgba::rgb(0, 30, 110)),
                    (0.3, Rgba::rgb(110, 170, 230)),
                    (0.45, Rgba::rgb(60, 150, 60)),
                    (0.6, Rgba::rgb(230, 220, 110)),
                    (0.8, Rgba::rgb(140, 90, 40)),
                    (1.0, Rgba::WHITE),
                ],
            ),
            "bwr" => (
                "Blue-white-red",
                vec![
                    (0.0, Rgba::rgb(30, 60, 200)),
                    (0.5, Rgba::WHITE),
                    (1.0, Rgba::rgb(200, 30, 30)),
                ],
            ),
            _ => return None,
        };
        let points = stops
            .into_iter()
            .map(|(p, c)| GradientPoint::new(p, c))
            .collect();
        ColorGradient::new(points).ok().map(|g| (long, g))
    }

    /// Materialize a built-in gradient as a palette of `count` colours.
    pub fn palette(name: &str, count: usize) -> Result<Palette> {
        let (long, gradient) = Self::by_name(name)
            .ok_or_else(|| Error::PaletteFormat(format!("no built-in palette named '{name}'")))?;
        Palette::from_gradient(name, long, &format!("{long} gradient"), gradient, count)
    }

    /// All built-in palettes with [`DEFAULT_COLOUR_COUNT`] colours.
    #[must_use]
    pub fn builtin() -> Vec<Palette> {
        Self::NAMES
            .iter()
            .filter_map(|name| Self::palette(name, DEFAULT_COLOUR_COUNT).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_palette() -> Palette {
        Palette::new(
            "rgb",
            "RGB",
            "three colours",
            vec![Rgba::RED, Rgba::GREEN, Rgba::BLUE],
        )
        .unwrap()
    }

    #[test]
    fn test_max_colour_index() {
        assert_eq!(rgb_palette().max_colour_index(), 2);
    }

    #[test]
    fn test_colour_at_out_of_range_fails() {
        let p = rgb_palette();
        assert_eq!(p.colour_at(1).unwrap(), Rgba::GREEN);
        assert!(matches!(p.colour_at(3), Err(Error::ColourIndex { index: 3, max: 2, .. })));
    }

    #[test]
    fn test_colour_at_clamped() {
        let p = rgb_palette();
        assert_eq!(p.colour_at_clamped(-4), Rgba::RED);
        assert_eq!(p.colour_at_clamped(99), Rgba::BLUE);
    }

    #[test]
    fn test_colour_for_value_rounds() {
        let p = rgb_palette();
        assert_eq!(p.colour_for_value(0.0), Rgba::RED);
        assert_eq!(p.colour_for_value(0.74), Rgba::GREEN);
        assert_eq!(p.colour_for_value(0.76), Rgba::BLUE);
        assert_eq!(p.colour_for_value(1.0), Rgba::BLUE);
    }

    #[test]
    fn test_reverse_twice_is_identity() {
        let original = rgb_palette();
        let mut p = original.clone();
        p.reverse();
        assert!(p.is_reversed());
        assert_eq!(p.colours()[0], Rgba::BLUE);
        p.reverse();
        assert_eq!(p, original);
    }

    #[test]
    fn test_gradient_regenerates_on_count_change() {
        let mut p = GradientFactory::palette("grey", 3).unwrap();
        assert_eq!(p.colours(), &[Rgba::BLACK, Rgba::rgb(128, 128, 128), Rgba::WHITE]);
        p.set_colour_count(5).unwrap();
        assert_eq!(p.len(), 5);
        assert_eq!(p.colours()[4], Rgba::WHITE);
    }

    #[test]
    fn test_reversed_gradient_stays_reversed_after_regeneration() {
        let mut p = GradientFactory::palette("grey", 4).unwrap();
        p.reverse();
        p.set_colour_count(6).unwrap();
        assert_eq!(p.colours()[0], Rgba::WHITE);
        assert_eq!(p.colours()[5], Rgba::BLACK);
    }

    #[test]
    fn test_insert_and_remove_gradient_point() {
        let mut p = GradientFactory::palette("grey", 3).unwrap();
        p.insert_gradient_point(0.5, Rgba::RED).unwrap();
        assert_eq!(p.colours()[1], Rgba::RED);
        let removed = p.remove_gradient_point(1).unwrap();
        assert_eq!(removed.colour, Rgba::RED);
        assert_eq!(p.colours()[1], Rgba::rgb(128, 128, 128));
    }

    #[test]
    fn test_end_points_cannot_be_removed() {
        let mut p = GradientFactory::palette("grey", 3).unwrap();
        assert!(p.remove_gradient_point(0).is_err());
        assert!(p.remove_gradient_point(1).is_err());
    }

    #[test]
    fn test_set_gradient_keeps_count_and_reversal() {
        let mut p = GradientFactory::palette("grey", 3).unwrap();
        p.reverse();
        p.set_gradient(ColorGradient::even(&[Rgba::RED, Rgba::BLUE]).unwrap());
        assert_eq!(p.len(), 3);
        assert_eq!(p.colours()[0], Rgba::BLUE);
        assert_eq!(p.colours()[2], Rgba::RED);
        assert_eq!(p.gradient().unwrap().points().len(), 2);
    }

    #[test]
    fn test_set_colours_drops_gradient() {
        let mut p = GradientFactory::palette("grey", 8).unwrap();
        p.set_colours(vec![Rgba::RED, Rgba::GREEN]).unwrap();
        assert!(p.gradient().is_none());
        assert_eq!(p.colours(), &[Rgba::RED, Rgba::GREEN]);
        assert!(p.set_colour_count(4).is_err());
        assert!(matches!(p.set_colours(Vec::new()), Err(Error::EmptyData)));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_plain_palette_has_no_gradient_ops() {
        let mut p = rgb_palette();
        assert!(p.set_colour_count(10).is_err());
        assert!(p.insert_gradient_point(0.5, Rgba::WHITE).is_err());
    }

    #[test]
    fn test_gradient_validation() {
        assert!(ColorGradient::new(vec![GradientPoint::new(0.0, Rgba::BLACK)]).is_err());
        assert!(ColorGradient::new(vec![
            GradientPoint::new(0.1, Rgba::BLACK),
            GradientPoint::new(1.0, Rgba::WHITE),
        ])
        .is_err());
        let g = ColorGradient::new(vec![
            GradientPoint::new(1.0, Rgba::WHITE),
            GradientPoint::new(0.0, Rgba::BLACK),
        ])
        .unwrap();
        assert_eq!(g.points()[0].colour, Rgba::BLACK);
    }

    #[test]
    fn test_builtin_palettes_complete() {
        let all = GradientFactory::builtin();
        assert_eq!(all.len(), GradientFactory::NAMES.len());
        assert!(all.iter().all(|p| p.len() == DEFAULT_COLOUR_COUNT));
        assert!(GradientFactory::palette("nope", 10).is_err());
    }

    #[test]
    fn test_content_hash_changes_with_reversal() {
        let mut p = rgb_palette();
        let h = p.content_hash();
        p.reverse();
        assert_ne!(h, p.content_hash());
    }
}
