use std::fmt;

// ---------------------------------------------------------------------------
// FreqKey – a frequency usable as an ordered map key
// ---------------------------------------------------------------------------

/// A frequency in MHz wrapped for use as a `BTreeMap`/`BTreeSet` key.
///
/// Frequencies arrive as floats and must act as exact column keys, so the
/// wrapper supplies total ordering via `f64::total_cmp`. Repeated-measurement
/// datasets round before keying (see [`FreqKey::rounded`]) to absorb sensor
/// jitter across runs; single-shot datasets key on the raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreqKey(f64);

impl FreqKey {
    pub fn new(mhz: f64) -> Self {
        FreqKey(mhz)
    }

    /// Key a frequency after rounding to `decimals` decimal places.
    /// Equal rounded values yield bit-identical keys.
    pub fn rounded(mhz: f64, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        FreqKey((mhz * scale).round() / scale)
    }

    pub fn mhz(&self) -> f64 {
        self.0
    }
}

impl Eq for FreqKey {}

impl PartialOrd for FreqKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FreqKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for FreqKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for FreqKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SweepRow – one (frequency, signal, noise) reading
// ---------------------------------------------------------------------------

/// One row of a frequency sweep read from a measurement file.
#[derive(Debug, Clone, Copy)]
pub struct SweepRow {
    pub freq: FreqKey,
    /// Signal level, dB.
    pub signal: f64,
    /// Noise level at the same frequency, dB.
    pub noise: f64,
}

// ---------------------------------------------------------------------------
// AggregatedMatrix – the angle × frequency output of a level aggregation
// ---------------------------------------------------------------------------

/// Two parallel angle × frequency tables, signal and noise, with both axes
/// sorted ascending.
///
/// Invariants once built:
/// * every (angle, frequency) cell holds a finite value — gaps are filled by
///   the imputation pass, never left missing;
/// * the first row is duplicated as an appended last row (angle wrapped to
///   +360°) so a polar consumer can draw a closed loop;
/// * the matrix is immutable after construction and owned by the aggregator
///   that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMatrix {
    /// Name of the source directory, used for captions and export naming.
    pub source: String,
    /// Measurement angles in degrees, ascending, with the closing duplicate
    /// (first angle + 360°) appended last. Empty for an empty dataset.
    pub angles_deg: Vec<f64>,
    /// Canonical frequency grid, ascending, shared by both tables.
    pub frequencies: Vec<FreqKey>,
    /// Signal levels, `angles_deg.len()` rows × `frequencies.len()` columns.
    pub signal: Vec<Vec<f64>>,
    /// Noise levels, same shape as `signal`.
    pub noise: Vec<Vec<f64>>,
}

impl AggregatedMatrix {
    pub fn empty(source: String) -> Self {
        AggregatedMatrix {
            source,
            angles_deg: Vec::new(),
            frequencies: Vec::new(),
            signal: Vec::new(),
            noise: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.angles_deg.is_empty()
    }

    /// Number of distinct measurement angles (the closing duplicate row is
    /// not counted).
    pub fn angle_count(&self) -> usize {
        self.angles_deg.len().saturating_sub(1)
    }

    /// Largest signal level in the matrix, or `None` when empty.
    pub fn max_signal(&self) -> Option<f64> {
        self.signal.iter().flatten().copied().reduce(f64::max)
    }

    /// Largest noise level in the matrix, or `None` when empty.
    pub fn max_noise(&self) -> Option<f64> {
        self.noise.iter().flatten().copied().reduce(f64::max)
    }

    /// Column index of a frequency in the canonical grid.
    pub fn frequency_index(&self, freq: FreqKey) -> Option<usize> {
        self.frequencies.binary_search(&freq).ok()
    }

    /// Signal column for one frequency, one value per angle row
    /// (closing duplicate included).
    pub fn signal_column(&self, col: usize) -> Vec<f64> {
        self.signal.iter().map(|row| row[col]).collect()
    }

    /// Noise column for one frequency, one value per angle row.
    pub fn noise_column(&self, col: usize) -> Vec<f64> {
        self.noise.iter().map(|row| row[col]).collect()
    }
}

// ---------------------------------------------------------------------------
// ContainmentTable – per-angle containment radius with bounds
// ---------------------------------------------------------------------------

/// Containment radius for one angle.
///
/// For single-run data the lower bound comes from the instrument's rounding
/// granularity and no upper bound exists. For repeated runs both bounds are
/// `main ± expanded_uncertainty` and therefore symmetric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainmentEntry {
    pub angle_deg: f64,
    pub main: f64,
    pub lower: f64,
    pub upper: Option<f64>,
}

/// Per-angle containment results, sorted by angle ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainmentTable {
    pub source: String,
    pub entries: Vec<ContainmentEntry>,
}

impl ContainmentTable {
    pub fn empty(source: String) -> Self {
        ContainmentTable {
            source,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest plotted radius: the upper bound where present, else the
    /// central value.
    pub fn max_radius(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|e| e.upper.unwrap_or(e.main))
            .reduce(f64::max)
    }
}

// ---------------------------------------------------------------------------
// LevelSummary – the reduced per-frequency table behind the CSV export
// ---------------------------------------------------------------------------

/// One row of the reduced per-frequency table: the worst case over all
/// angles of the cross-run mean signal and noise.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FrequencySummaryRow {
    pub freq: f64,
    pub signal: f64,
    pub noise: f64,
}

/// Companion output of the repeated-level aggregation: the per-frequency
/// worst-case table plus the ceiling of the largest mean containment radius,
/// both of which feed the CSV export convention
/// `<source-directory> [R2=<max_r2>].csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub per_frequency: Vec<FrequencySummaryRow>,
    pub max_r2: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounded_keys_collapse_jitter() {
        let a = FreqKey::rounded(99.96, 0);
        let b = FreqKey::rounded(100.04, 0);
        assert_eq!(a, b);
        assert_eq!(a.mhz(), 100.0);
    }

    #[test]
    fn rounded_keys_keep_decimals() {
        let a = FreqKey::rounded(99.96, 1);
        let b = FreqKey::rounded(100.04, 1);
        assert_ne!(a, b);
        assert_eq!(b.mhz(), 100.0);
    }

    #[test]
    fn freq_keys_sort_ascending() {
        let mut keys = vec![FreqKey::new(300.0), FreqKey::new(100.0), FreqKey::new(200.0)];
        keys.sort();
        let mhz: Vec<f64> = keys.iter().map(FreqKey::mhz).collect();
        assert_eq!(mhz, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn matrix_max_signal_scans_all_rows() {
        let m = AggregatedMatrix {
            source: "test".into(),
            angles_deg: vec![0.0, 120.0, 360.0],
            frequencies: vec![FreqKey::new(100.0)],
            signal: vec![vec![1.0], vec![7.5], vec![1.0]],
            noise: vec![vec![0.0], vec![2.0], vec![0.0]],
        };
        assert_eq!(m.max_signal(), Some(7.5));
        assert_eq!(m.angle_count(), 2);
    }

    #[test]
    fn containment_max_radius_prefers_upper_bound() {
        let t = ContainmentTable {
            source: "test".into(),
            entries: vec![
                ContainmentEntry {
                    angle_deg: 0.0,
                    main: 9.5,
                    lower: 6.6,
                    upper: Some(12.4),
                },
                ContainmentEntry {
                    angle_deg: 90.0,
                    main: 11.0,
                    lower: 6.0,
                    upper: None,
                },
            ],
        };
        assert_eq!(t.max_radius(), Some(12.4));
    }
}
