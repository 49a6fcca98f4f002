use std::f64::consts::TAU;

use palette::{Hsl, IntoColor, Srgb};

use crate::data::grid::unify_grids;
use crate::data::model::{AggregatedMatrix, ContainmentTable, FreqKey};

// ---------------------------------------------------------------------------
// Line styling – immutable configuration for the plotting layer
// ---------------------------------------------------------------------------

/// Per-sample line styling handed to the plotting layer at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: Srgb<u8>,
    pub width: f32,
    pub alpha: f32,
}

impl LineStyle {
    pub fn new(color: Srgb<u8>, width: f32, alpha: f32) -> Self {
        LineStyle {
            color,
            width,
            alpha,
        }
    }
}

/// Default styles for up to three overlaid samples: royal blue, tomato,
/// forest green.
pub fn default_line_styles() -> Vec<LineStyle> {
    vec![
        LineStyle::new(Srgb::new(65, 105, 225), 1.1, 1.0),
        LineStyle::new(Srgb::new(255, 99, 71), 1.6, 1.0),
        LineStyle::new(Srgb::new(34, 139, 34), 1.0, 1.0),
    ]
}

// ---------------------------------------------------------------------------
// Normalizer – the contract the plotting layer relies on
// ---------------------------------------------------------------------------

/// Polar wedge geometry for one (angle, value) bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wedge {
    /// Center of the wedge in radians.
    pub center_rad: f64,
    /// Angular width in radians.
    pub width_rad: f64,
}

/// Consumer-side contract over one or more aggregated datasets: the shared
/// frequency layout, the shared radial scale, and the value→color /
/// value→wedge mappings every subplot uses.
///
/// Owns nothing from the aggregators; it reads the matrices by reference at
/// construction and keeps only derived values.
#[derive(Debug, Clone)]
pub struct Normalizer {
    frequencies: Vec<FreqKey>,
    max_scale: f64,
}

/// Levels at or below this map to the cold end of the color gradient.
const COLOR_FLOOR: f64 = 10.0;
/// Zero-width reference level for wedge sizing; a 0 dB bar still gets a
/// visible sliver.
const WIDTH_FLOOR: f64 = -10.0;

impl Normalizer {
    /// Layout for a set of level matrices: one subplot per frequency in the
    /// union of their grids, one shared radial scale.
    pub fn for_matrices<'a, I>(matrices: I, scale_override: Option<f64>) -> Self
    where
        I: IntoIterator<Item = &'a AggregatedMatrix>,
    {
        let matrices: Vec<&AggregatedMatrix> = matrices.into_iter().collect();
        let frequencies = unify_grids(
            matrices
                .iter()
                .map(|m| m.frequencies.iter().copied().collect::<Vec<_>>()),
        );
        let observed = matrices
            .iter()
            .filter_map(|m| m.max_signal())
            .fold(0.0, f64::max);
        Normalizer {
            frequencies,
            max_scale: scale_override.unwrap_or_else(|| round_up_to_ten(observed)),
        }
    }

    /// Scale for a set of containment tables (no frequency layout).
    pub fn for_containment<'a, I>(tables: I, scale_override: Option<f64>) -> Self
    where
        I: IntoIterator<Item = &'a ContainmentTable>,
    {
        let observed = tables
            .into_iter()
            .filter_map(|t| t.max_radius())
            .fold(0.0, f64::max);
        Normalizer {
            frequencies: Vec::new(),
            max_scale: scale_override.unwrap_or_else(|| round_up_to_ten(observed)),
        }
    }

    /// Union of frequencies across all supplied matrices, one subplot each.
    pub fn frequencies(&self) -> &[FreqKey] {
        &self.frequencies
    }

    /// Shared maximum of the radial scale: the largest observed value
    /// rounded up to the next multiple of 10, unless overridden.
    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Position of a level on the color gradient, clamped to `[0, 1]`.
    pub fn color_ratio(&self, value: f64) -> f64 {
        let span = self.max_scale - COLOR_FLOOR;
        if span <= 0.0 {
            return 1.0;
        }
        ((value - COLOR_FLOOR) / span).clamp(0.0, 1.0)
    }

    /// Map a level to a color on a cold-to-hot gradient (blue at the floor,
    /// red at the scale maximum).
    pub fn color_for(&self, value: f64) -> Srgb<u8> {
        let ratio = self.color_ratio(value) as f32;
        let hsl = Hsl::new(240.0 * (1.0 - ratio), 0.85, 0.5);
        let rgb: Srgb = hsl.into_color();
        rgb.into_format()
    }

    /// Wedge geometry for sample `sample_index` of `n_samples` overlaid at
    /// one angle. The full-sector width scales with the value; N overlaid
    /// samples split it into N adjacent wedges of equal width whose total
    /// equals the single-sample wedge, ordered left to right by index.
    pub fn wedge(
        &self,
        value: f64,
        angle_deg: f64,
        n_angles: usize,
        sample_index: usize,
        n_samples: usize,
    ) -> Wedge {
        debug_assert!(sample_index < n_samples);
        let span = self.max_scale - WIDTH_FLOOR;
        let ratio = if span <= 0.0 {
            1.0
        } else {
            ((value - WIDTH_FLOOR) / span).clamp(0.0, 1.0)
        };
        let base = TAU / n_angles.max(1) as f64 * ratio;
        let slot = base / n_samples.max(1) as f64;
        let center =
            angle_deg.to_radians() + (sample_index as f64 - (n_samples as f64 - 1.0) / 2.0) * slot;
        Wedge {
            center_rad: center,
            width_rad: slot,
        }
    }
}

fn round_up_to_ten(value: f64) -> f64 {
    (value / 10.0).ceil() * 10.0
}
