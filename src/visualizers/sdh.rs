//! Smoothed data histograms.
//!
//! Every input votes for its `s` best-matching units. The whole table over
//! `s ∈ [1, max_smoothing]` is built at once from the `max_smoothing` best
//! units of every input, then each matrix is normalized to `[0, 1]`.

use super::matrix::{Matrix, MatrixCore, MatrixSettings};
use super::{Backdrop, VariantInfo, Visualizer, VisualizerCategory, VisualizerInfo};
use crate::cache::{ImageCache, KeySection};
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::palette::Palette;
use crate::som::{InputObjectKind, Som};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Default smoothing factor.
pub const DEFAULT_SMOOTHING: usize = 3;
/// Default largest smoothing factor in the table.
pub const DEFAULT_MAX_SMOOTHING: usize = 15;

/// How a vote is split over the `s` best units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdhWeighting {
    /// Rank `k` (0-based) receives `(s - k) / (s (s + 1) / 2)`.
    Rank,
    /// Shares proportional to inverse distance.
    InverseDistance,
    /// Distances min-max scaled per input; the closest unit receives 1.
    MinMaxInverseDistance,
}

impl SdhWeighting {
    /// Variant order.
    pub const ALL: [Self; 3] = [Self::Rank, Self::InverseDistance, Self::MinMaxInverseDistance];

    fn votes(self, best: &[(usize, f64)]) -> Vec<f64> {
        let s = best.len();
        match self {
            Self::Rank => {
                let c = (s * (s + 1)) as f64 / 2.0;
                (0..s).map(|k| (s - k) as f64 / c).collect()
            }
            Self::InverseDistance => {
                let inv: Vec<f64> = best.iter().map(|(_, d)| 1.0 / d.max(1e-12)).collect();
                let total: f64 = inv.iter().sum();
                inv.into_iter().map(|v| v / total).collect()
            }
            Self::MinMaxInverseDistance => {
                let lo = best.first().map_or(0.0, |b| b.1);
                let hi = best.last().map_or(0.0, |b| b.1);
                best.iter()
                    .map(|(_, d)| if hi > lo { 1.0 - (d - lo) / (hi - lo) } else { 1.0 })
                    .collect()
            }
        }
    }
}

/// Normalized SDH matrices for every smoothing factor and weighting.
#[derive(Debug, Clone)]
pub struct SdhTable {
    /// `tables[s - 1][w]` for weighting `SdhWeighting::ALL[w]`.
    tables: Vec<[Matrix; 3]>,
}

impl SdhTable {
    /// Build the table for `s ∈ [1, max_smoothing]`.
    ///
    /// # Errors
    ///
    /// Fails without input data or on metric errors.
    pub fn compute(som: &Som, max_smoothing: usize) -> Result<Self> {
        let data = som
            .inputs()
            .input_data
            .as_deref()
            .ok_or_else(|| Error::MissingInputObjects {
                visualizer: "Smoothed Data Histograms".to_string(),
                missing: vec![InputObjectKind::InputData.name().to_string()],
            })?;
        let max = max_smoothing.clamp(1, som.unit_count());
        info!("computing SDH table for {} inputs, s = 1..={max}", data.len());

        let best = data
            .iter()
            .map(|v| som.best_matching_units(v, max))
            .collect::<Result<Vec<_>>>()?;

        let mut tables = Vec::with_capacity(max);
        for s in 1..=max {
            let mut raw = [
                vec![0.0; som.unit_count()],
                vec![0.0; som.unit_count()],
                vec![0.0; som.unit_count()],
            ];
            for units in &best {
                let units = &units[..s.min(units.len())];
                for (w, weighting) in SdhWeighting::ALL.iter().enumerate() {
                    for ((unit, _), vote) in units.iter().zip(weighting.votes(units)) {
                        raw[w][*unit] += vote;
                    }
                }
            }
            let [a, b, c] = raw;
            tables.push([
                Matrix::from_vec(som.y_size(), som.x_size(), a)?.normalized(),
                Matrix::from_vec(som.y_size(), som.x_size(), b)?.normalized(),
                Matrix::from_vec(som.y_size(), som.x_size(), c)?.normalized(),
            ]);
        }
        Ok(Self { tables })
    }

    /// Largest smoothing factor in the table.
    #[must_use]
    pub fn max_smoothing(&self) -> usize {
        self.tables.len()
    }

    /// Matrix for smoothing `s` (clamped into the table) and `weighting`.
    #[must_use]
    pub fn get(&self, s: usize, weighting: SdhWeighting) -> &Matrix {
        let row = &self.tables[s.clamp(1, self.tables.len()) - 1];
        let w = SdhWeighting::ALL
            .iter()
            .position(|x| *x == weighting)
            .unwrap_or(0);
        &row[w]
    }
}

/// Smoothed data histograms visualizer; one variant per [`SdhWeighting`].
#[derive(Debug)]
pub struct SmoothedDataHistograms {
    info: VisualizerInfo,
    cache: Arc<ImageCache>,
    backdrop: Backdrop,
    core: MatrixCore,
    smoothing: usize,
    max_smoothing: usize,
    tables: Mutex<HashMap<(u64, usize), Arc<SdhTable>>>,
}

impl SmoothedDataHistograms {
    /// SDH with default matrix settings.
    #[must_use]
    pub fn new(cache: Arc<ImageCache>, palette: Arc<Palette>) -> Self {
        Self::with_settings(cache, MatrixSettings::new(palette))
    }

    /// SDH with explicit matrix settings.
    #[must_use]
    pub fn with_settings(cache: Arc<ImageCache>, settings: MatrixSettings) -> Self {
        Self {
            info: VisualizerInfo::new(
                "Smoothed Data Histograms",
                "SDH",
                VisualizerCategory::Standard,
                vec![
                    VariantInfo::new("SDH", "rank", "Votes weighted by rank"),
                    VariantInfo::new("SDH (distance)", "distance", "Votes weighted by inverse distance"),
                    VariantInfo::new(
                        "SDH (normalized distance)",
                        "minmax",
                        "Votes weighted by per-input normalized distance",
                    ),
                ],
            ),
            cache,
            backdrop: Backdrop::default(),
            core: MatrixCore::new(settings),
            smoothing: DEFAULT_SMOOTHING,
            max_smoothing: DEFAULT_MAX_SMOOTHING,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Current smoothing factor.
    #[must_use]
    pub fn smoothing(&self) -> usize {
        self.smoothing
    }

    /// Set the smoothing factor, clamped to `[1, max_smoothing]`.
    pub fn set_smoothing(&mut self, s: usize) {
        self.smoothing = s.clamp(1, self.max_smoothing);
    }

    /// Set the table size; the smoothing factor is clamped to it.
    pub fn set_max_smoothing(&mut self, max: usize) {
        self.max_smoothing = max.max(1);
        self.smoothing = self.smoothing.min(self.max_smoothing);
    }

    /// Matrix settings and value range.
    #[must_use]
    pub fn core(&self) -> &MatrixCore {
        &self.core
    }

    /// Table for `som`, computed on first use.
    pub fn table(&self, som: &Som) -> Result<Arc<SdhTable>> {
        let key = (som.identity_hash(), self.max_smoothing);
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(t) = tables.get(&key) {
            return Ok(Arc::clone(t));
        }
        let table = Arc::new(SdhTable::compute(som, self.max_smoothing)?);
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }
}

impl Visualizer for SmoothedDataHistograms {
    visualizer_plumbing!();

    fn forget_derived(&self) {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn needed_input_objects(&self) -> &[InputObjectKind] {
        &[InputObjectKind::InputData]
    }

    fn cache_params(&self) -> Vec<KeySection> {
        vec![
            self.core.settings().key_section(),
            KeySection::new()
                .with("s", self.smoothing)
                .with("max", self.max_smoothing),
        ]
    }

    fn create_visualization(&self, variant: usize, som: &Som, width: u32, height: u32) -> Result<RasterImage> {
        self.check_needed_objects(som)?;
        self.check_variant(variant, som)?;
        let table = self.table(som)?;
        let matrix = table.get(self.smoothing, SdhWeighting::ALL[variant]);
        self.core.render(matrix, som, width, height)
    }
}
