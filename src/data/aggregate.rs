use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::grid::unify_grids;
use super::impute::Imputer;
use super::loader::{angle_from_filename, list_measurement_files, list_tree_files, radius_from_filename, read_sweep};
use super::model::{AggregatedMatrix, FreqKey, FrequencySummaryRow, LevelSummary};
use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do with a measurement file that holds no data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFilePolicy {
    /// Log a warning and let the file contribute nothing (its angle is
    /// dropped unless another file covers it).
    #[default]
    Skip,
    /// Raise [`ScanError::EmptyFile`].
    Fail,
}

/// Immutable per-dataset settings shared by the aggregators.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Noise floor in dB; no output cell ends up below it.
    pub floor_db: f64,
    /// Decimal places the repeated-measurement variant rounds frequencies to
    /// before keying, collapsing near-duplicate readings across runs.
    pub freq_decimals: u32,
    /// Coverage factor for expanded uncertainty intervals (≈95% at 2).
    pub coverage_factor: f64,
    pub empty_file: EmptyFilePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            floor_db: 0.0,
            freq_decimals: 0,
            coverage_factor: 2.0,
            empty_file: EmptyFilePolicy::Skip,
        }
    }
}

/// Cross-run mean levels are reported to one decimal place.
const MEAN_DECIMALS: u32 = 1;

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Aggregator seam
// ---------------------------------------------------------------------------

/// A dataset reducer: consumes one measurement directory, owns the result.
/// The four concrete variants (single/repeated × level/containment) differ
/// only in their `Output` and in how they walk the directory.
pub trait MeasurementAggregator {
    type Output;

    fn build(&self) -> Result<Self::Output>;
}

// ---------------------------------------------------------------------------
// Single-shot level aggregation: one file per angle
// ---------------------------------------------------------------------------

/// Aggregates a directory holding exactly one measurement file per angle
/// (single run, single interface, single polarization) into an
/// [`AggregatedMatrix`].
#[derive(Debug, Clone)]
pub struct SingleLevelAggregator {
    dir: PathBuf,
    config: ScanConfig,
}

impl SingleLevelAggregator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, ScanConfig::default())
    }

    pub fn with_config(dir: impl Into<PathBuf>, config: ScanConfig) -> Self {
        SingleLevelAggregator {
            dir: dir.into(),
            config,
        }
    }
}

impl MeasurementAggregator for SingleLevelAggregator {
    type Output = AggregatedMatrix;

    fn build(&self) -> Result<AggregatedMatrix> {
        let source = source_name(&self.dir);
        let files = list_measurement_files(&self.dir)?;
        if files.is_empty() {
            info!("{}: no measurement files, yielding empty matrix", source);
            return Ok(AggregatedMatrix::empty(source));
        }

        // Sparse (angle → frequency → value) cells; duplicate frequencies
        // within one file keep the last reading, as do duplicate angles
        // across files (sorted filename order makes both deterministic).
        let mut signal_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>> = BTreeMap::new();
        let mut noise_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>> = BTreeMap::new();

        for path in &files {
            let angle = angle_from_filename(path)?;
            let rows = read_sweep(path, None)?;
            if rows.is_empty() && !tolerate_empty(path, self.config.empty_file)? {
                continue;
            }
            let signal_row = signal_cells.entry(angle).or_default();
            let noise_row = noise_cells.entry(angle).or_default();
            for row in rows {
                signal_row.insert(row.freq, row.signal);
                noise_row.insert(row.freq, row.noise);
            }
        }

        Ok(assemble_matrix(
            source,
            signal_cells,
            noise_cells,
            self.config.floor_db,
        ))
    }
}

// ---------------------------------------------------------------------------
// Repeated-measurement level aggregation: runs × interfaces × polarizations
// ---------------------------------------------------------------------------

/// Matrix plus the reduced per-frequency table produced from a
/// repeated-measurement tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatedLevelResult {
    pub matrix: AggregatedMatrix,
    pub summary: LevelSummary,
}

/// Aggregates a `root/<run>/<interface polarization>/<file>` tree.
///
/// Within a run the worst case (maximum) across interface × polarization
/// combinations is taken per (angle, frequency); across runs the mean is
/// reported. The per-file containment radius rides along so the summary can
/// carry the ceiling of the largest mean radius.
#[derive(Debug, Clone)]
pub struct RepeatedLevelAggregator {
    root: PathBuf,
    config: ScanConfig,
}

impl RepeatedLevelAggregator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, ScanConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        RepeatedLevelAggregator {
            root: root.into(),
            config,
        }
    }
}

/// Per-(run, angle, frequency) worst case across interface × polarization.
#[derive(Debug, Clone, Copy)]
struct WorstCase {
    signal: f64,
    noise: f64,
    r2: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct MeanAcc {
    signal: f64,
    noise: f64,
    r2: f64,
    n: usize,
}

impl MeasurementAggregator for RepeatedLevelAggregator {
    type Output = RepeatedLevelResult;

    fn build(&self) -> Result<RepeatedLevelResult> {
        let source = source_name(&self.root);
        let leaves = list_tree_files(&self.root)?;
        if leaves.is_empty() {
            info!("{}: no measurement files, yielding empty result", source);
            return Ok(RepeatedLevelResult {
                matrix: AggregatedMatrix::empty(source),
                summary: LevelSummary {
                    per_frequency: Vec::new(),
                    max_r2: 0,
                },
            });
        }

        // Stage 1: worst case per (run, angle, frequency). All interface ×
        // polarization combinations of a run collapse here.
        let mut worst: BTreeMap<(String, u32, FreqKey), WorstCase> = BTreeMap::new();
        for (ctx, path) in &leaves {
            let angle = angle_from_filename(path)?;
            let r2 = radius_from_filename(path)?;
            let rows = read_sweep(path, Some(self.config.freq_decimals))?;
            if rows.is_empty() && !tolerate_empty(path, self.config.empty_file)? {
                continue;
            }
            debug!(
                "{}: run {:?} {} {} angle {}°, {} rows",
                source,
                ctx.run,
                ctx.interface,
                ctx.polarization,
                angle,
                rows.len()
            );
            for row in rows {
                worst
                    .entry((ctx.run.clone(), angle, row.freq))
                    .and_modify(|w| {
                        w.signal = w.signal.max(row.signal);
                        w.noise = w.noise.max(row.noise);
                        w.r2 = w.r2.max(r2);
                    })
                    .or_insert(WorstCase {
                        signal: row.signal,
                        noise: row.noise,
                        r2,
                    });
            }
        }

        // Stage 2: mean across runs per (angle, frequency).
        let mut acc: BTreeMap<(u32, FreqKey), MeanAcc> = BTreeMap::new();
        for ((_, angle, freq), w) in &worst {
            let cell = acc.entry((*angle, *freq)).or_default();
            cell.signal += w.signal;
            cell.noise += w.noise;
            cell.r2 += w.r2;
            cell.n += 1;
        }

        let mut signal_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>> = BTreeMap::new();
        let mut noise_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>> = BTreeMap::new();
        // Reduced per-frequency table: worst case over angles of the means,
        // and the largest mean radius.
        let mut per_freq: BTreeMap<FreqKey, (f64, f64)> = BTreeMap::new();
        let mut max_mean_r2 = f64::NEG_INFINITY;

        for ((angle, freq), cell) in &acc {
            let n = cell.n as f64;
            let signal = round_to(cell.signal / n, MEAN_DECIMALS);
            let noise = round_to(cell.noise / n, MEAN_DECIMALS);
            signal_cells.entry(*angle).or_default().insert(*freq, signal);
            noise_cells.entry(*angle).or_default().insert(*freq, noise);

            per_freq
                .entry(*freq)
                .and_modify(|(s, nz)| {
                    *s = s.max(signal);
                    *nz = nz.max(noise);
                })
                .or_insert((signal, noise));
            max_mean_r2 = max_mean_r2.max(cell.r2 / n);
        }

        let summary = LevelSummary {
            per_frequency: per_freq
                .into_iter()
                .map(|(freq, (signal, noise))| FrequencySummaryRow {
                    freq: freq.mhz(),
                    signal,
                    noise,
                })
                .collect(),
            max_r2: max_mean_r2.ceil() as u32,
        };

        Ok(RepeatedLevelResult {
            matrix: assemble_matrix(source, signal_cells, noise_cells, self.config.floor_db),
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Shared assembly
// ---------------------------------------------------------------------------

pub(crate) fn source_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Apply the empty-file policy; `Ok(false)` means "skip this file".
fn tolerate_empty(path: &Path, policy: EmptyFilePolicy) -> Result<bool> {
    match policy {
        EmptyFilePolicy::Skip => {
            warn!("{}: no data rows, skipping", path.display());
            Ok(false)
        }
        EmptyFilePolicy::Fail => Err(ScanError::EmptyFile {
            path: path.to_path_buf(),
        }),
    }
}

/// Turn sparse per-angle cells into the final dense matrix: unify the grid,
/// impute gaps, sort both axes, and append the closing duplicate row.
fn assemble_matrix(
    source: String,
    signal_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>>,
    noise_cells: BTreeMap<u32, BTreeMap<FreqKey, f64>>,
    floor_db: f64,
) -> AggregatedMatrix {
    if signal_cells.is_empty() {
        return AggregatedMatrix::empty(source);
    }

    let grid = unify_grids(
        signal_cells
            .values()
            .map(|row| row.keys().copied().collect::<Vec<_>>()),
    );
    // BTreeMap iteration gives angles already ascending.
    let angles: Vec<u32> = signal_cells.keys().copied().collect();

    let to_dense = |cells: &BTreeMap<u32, BTreeMap<FreqKey, f64>>| -> Vec<Vec<Option<f64>>> {
        angles
            .iter()
            .map(|angle| {
                let row = &cells[angle];
                grid.iter().map(|freq| row.get(freq).copied()).collect()
            })
            .collect()
    };

    let imputer = Imputer { floor_db };
    let (mut signal, mut noise) = imputer.fill(to_dense(&signal_cells), to_dense(&noise_cells));

    // Close the polar loop: repeat the first row at +360°.
    let mut angles_deg: Vec<f64> = angles.iter().map(|&a| f64::from(a)).collect();
    angles_deg.push(angles_deg[0] + 360.0);
    signal.push(signal[0].clone());
    noise.push(noise[0].clone());

    AggregatedMatrix {
        source,
        angles_deg,
        frequencies: grid,
        signal,
        noise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn write_level_file(dir: &Path, name: &str, rows: &[(f64, f64, f64)]) {
        let mut content = String::from("N\tF, MHz\tSignal\tNoise\n");
        for (i, (freq, signal, noise)) in rows.iter().enumerate() {
            content.push_str(&format!("{}\t{freq}\t{signal}\t{noise}\n", i + 1));
        }
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn complete_single_dataset_passes_through_unchanged() {
        // Scenario A: three angles, two shared frequencies, no gaps.
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[(100.0, 20.0, 5.0), (200.0, 30.0, 6.0)]);
        write_level_file(dir.path(), "m (120).txt", &[(100.0, 21.0, 5.5), (200.0, 31.0, 6.5)]);
        write_level_file(dir.path(), "m (240).txt", &[(100.0, 22.0, 5.2), (200.0, 32.0, 6.2)]);

        let matrix = SingleLevelAggregator::new(dir.path()).build().unwrap();
        assert_eq!(matrix.angles_deg, vec![0.0, 120.0, 240.0, 360.0]);
        assert_eq!(matrix.frequencies.len(), 2);
        assert_eq!(matrix.signal[0], vec![20.0, 30.0]);
        assert_eq!(matrix.signal[1], vec![21.0, 31.0]);
        assert_eq!(matrix.noise[2], vec![5.2, 6.2]);
        // Closing duplicate equals the first row.
        assert_eq!(matrix.signal[3], matrix.signal[0]);
        assert_eq!(matrix.noise[3], matrix.noise[0]);
    }

    #[test]
    fn missing_reading_is_imputed_from_noise_floor() {
        // Scenario B: the 120° file lacks the 200 MHz row.
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[(100.0, 20.0, 4.0), (200.0, 30.0, 5.0)]);
        write_level_file(dir.path(), "m (120).txt", &[(100.0, 21.0, 4.5)]);
        write_level_file(dir.path(), "m (240).txt", &[(100.0, 22.0, 4.2), (200.0, 32.0, 8.0)]);

        let matrix = SingleLevelAggregator::new(dir.path()).build().unwrap();
        let col = matrix.frequency_index(FreqKey::new(200.0)).unwrap();
        // Noise: max across other angles = 8; signal: min(0, 8−10) clamped to 0.
        assert_eq!(matrix.noise[1][col], 8.0);
        assert_eq!(matrix.signal[1][col], 0.0);
    }

    #[test]
    fn floor_clamp_holds_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[(100.0, -3.0, -7.0)]);
        write_level_file(dir.path(), "m (90).txt", &[(100.0, 12.0, 2.0)]);

        let matrix = SingleLevelAggregator::new(dir.path()).build().unwrap();
        for row in matrix.signal.iter().chain(matrix.noise.iter()) {
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn empty_directory_yields_empty_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = SingleLevelAggregator::new(dir.path()).build().unwrap();
        assert!(matrix.is_empty());
    }

    #[test]
    fn filename_without_angle_token_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "no token.txt", &[(100.0, 20.0, 5.0)]);
        let err = SingleLevelAggregator::new(dir.path()).build().unwrap_err();
        assert!(matches!(err, ScanError::MissingAngleToken { .. }));
    }

    #[test]
    fn empty_file_policy_fail_raises() {
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[]);
        write_level_file(dir.path(), "m (90).txt", &[(100.0, 12.0, 2.0)]);

        let config = ScanConfig {
            empty_file: EmptyFilePolicy::Fail,
            ..ScanConfig::default()
        };
        let err = SingleLevelAggregator::with_config(dir.path(), config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::EmptyFile { .. }));
    }

    #[test]
    fn empty_file_policy_skip_drops_the_angle() {
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[]);
        write_level_file(dir.path(), "m (90).txt", &[(100.0, 12.0, 2.0)]);

        let matrix = SingleLevelAggregator::new(dir.path()).build().unwrap();
        assert_eq!(matrix.angles_deg, vec![90.0, 450.0]);
    }

    #[test]
    fn rebuilding_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_level_file(dir.path(), "m (0).txt", &[(100.0, 20.3, 4.1), (200.0, 30.7, 5.9)]);
        write_level_file(dir.path(), "m (180).txt", &[(100.0, 21.1, 4.4)]);

        let a = SingleLevelAggregator::new(dir.path()).build().unwrap();
        let b = SingleLevelAggregator::new(dir.path()).build().unwrap();
        assert_eq!(a, b);
    }

    fn write_tree_file(root: &Path, run: &str, combo: &str, name: &str, rows: &[(f64, f64, f64)]) {
        let dir = root.join(run).join(combo);
        std::fs::create_dir_all(&dir).unwrap();
        write_level_file(&dir, name, rows);
    }

    #[test]
    fn repeated_tree_takes_worst_case_then_mean() {
        let root = tempfile::tempdir().unwrap();
        // Run 1: two polarizations at 0°, worst case signal 26 / noise 7.
        write_tree_file(root.path(), "1. run", "DVI H", "(0) 12.txt", &[(100.0, 20.0, 5.0)]);
        write_tree_file(root.path(), "1. run", "DVI V", "(0) 12.txt", &[(100.0, 26.0, 7.0)]);
        // Run 2: one polarization, 24 / 5.
        write_tree_file(root.path(), "2. run", "DVI H", "(0) 12.txt", &[(100.0, 24.0, 5.0)]);

        let result = RepeatedLevelAggregator::new(root.path()).build().unwrap();
        let matrix = &result.matrix;
        assert_eq!(matrix.angles_deg, vec![0.0, 360.0]);
        // Mean of per-run worst cases: (26 + 24)/2 and (7 + 5)/2.
        assert_eq!(matrix.signal[0], vec![25.0]);
        assert_eq!(matrix.noise[0], vec![6.0]);
        assert_eq!(result.summary.max_r2, 12);
    }

    #[test]
    fn frequency_jitter_collapses_across_runs() {
        let root = tempfile::tempdir().unwrap();
        write_tree_file(root.path(), "1. run", "DVI H", "(0) 10.txt", &[(100.2, 20.0, 5.0)]);
        write_tree_file(root.path(), "2. run", "DVI H", "(0) 10.txt", &[(99.8, 30.0, 5.0)]);

        let result = RepeatedLevelAggregator::new(root.path()).build().unwrap();
        assert_eq!(result.matrix.frequencies.len(), 1);
        assert_eq!(result.matrix.frequencies[0].mhz(), 100.0);
        assert_eq!(result.matrix.signal[0], vec![25.0]);
    }

    #[test]
    fn summary_reports_per_frequency_worst_case_of_means() {
        let root = tempfile::tempdir().unwrap();
        write_tree_file(
            root.path(),
            "1. run",
            "DVI H",
            "(0) 9.txt",
            &[(100.0, 20.0, 5.0), (200.0, 18.0, 3.0)],
        );
        write_tree_file(
            root.path(),
            "1. run",
            "DVI H",
            "(90) 11.txt",
            &[(100.0, 28.0, 4.0), (200.0, 10.0, 6.0)],
        );

        let result = RepeatedLevelAggregator::new(root.path()).build().unwrap();
        let rows = &result.summary.per_frequency;
        assert_eq!(rows.len(), 2);
        // Per frequency the worst case over angles, per column independently.
        assert_eq!(rows[0].signal, 28.0);
        assert_eq!(rows[0].noise, 5.0);
        assert_eq!(rows[1].signal, 18.0);
        assert_eq!(rows[1].noise, 6.0);
        assert_eq!(result.summary.max_r2, 11);
    }

    #[test]
    fn mean_levels_are_rounded_to_one_decimal() {
        let root = tempfile::tempdir().unwrap();
        write_tree_file(root.path(), "1. run", "DVI H", "(0) 10.txt", &[(100.0, 20.01, 5.0)]);
        write_tree_file(root.path(), "2. run", "DVI H", "(0) 10.txt", &[(100.0, 20.02, 5.0)]);

        let result = RepeatedLevelAggregator::new(root.path()).build().unwrap();
        assert_eq!(result.matrix.signal[0], vec![20.0]);
    }
}
