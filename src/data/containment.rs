use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{info, warn};

use super::aggregate::{source_name, MeasurementAggregator, ScanConfig};
use super::loader::{angle_from_filename, list_measurement_files, list_tree_files, radius_from_filename};
use super::model::{ContainmentEntry, ContainmentTable};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Rounding granularity of the reporting instrument
// ---------------------------------------------------------------------------

/// Lower edge of the interval a reported radius was rounded from. The
/// instrument reports to 1 m granularity up to 10 m and 5 m above that.
pub fn lower_r2(r2: f64) -> f64 {
    if r2 <= 10.0 {
        r2 - 1.0
    } else {
        r2 - 5.0
    }
}

/// Standard uncertainty of the rounding step, treating the reported interval
/// as a rectangular distribution: half-width over √3, halved again because
/// the value is recentered to the interval midpoint.
fn rounding_uncertainty(r2: f64) -> f64 {
    ((r2 - lower_r2(r2)) / 2.0) / 3f64.sqrt()
}

/// Reported radius recentered to the midpoint of `[lower, r2]`.
fn recenter(r2: f64) -> f64 {
    r2 - (r2 - lower_r2(r2)) / 2.0
}

// ---------------------------------------------------------------------------
// Single-run containment: one file per angle, radius in the filename
// ---------------------------------------------------------------------------

/// Reads one containment radius per angle from the filenames of a flat
/// directory. Bounds are deterministic: `lower` comes from the rounding
/// granularity, no statistical spread exists from a single sample so no
/// upper bound is produced.
#[derive(Debug, Clone)]
pub struct SingleContainmentAggregator {
    dir: PathBuf,
}

impl SingleContainmentAggregator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SingleContainmentAggregator { dir: dir.into() }
    }
}

impl MeasurementAggregator for SingleContainmentAggregator {
    type Output = ContainmentTable;

    fn build(&self) -> Result<ContainmentTable> {
        let source = source_name(&self.dir);
        let files = list_measurement_files(&self.dir)?;
        if files.is_empty() {
            info!("{}: no measurement files, yielding empty table", source);
            return Ok(ContainmentTable::empty(source));
        }

        let mut by_angle: BTreeMap<u32, f64> = BTreeMap::new();
        for path in &files {
            let angle = angle_from_filename(path)?;
            let r2 = radius_from_filename(path)?;
            by_angle.insert(angle, r2);
        }

        let entries = by_angle
            .into_iter()
            .map(|(angle, r2)| ContainmentEntry {
                angle_deg: f64::from(angle),
                main: r2,
                lower: lower_r2(r2),
                upper: None,
            })
            .collect();

        Ok(ContainmentTable { source, entries })
    }
}

// ---------------------------------------------------------------------------
// Repeated-run containment: propagated uncertainty across runs
// ---------------------------------------------------------------------------

/// Reduces a repeated-measurement tree to one containment radius per angle
/// with an expanded confidence interval.
///
/// Per file: the reported radius is recentered to the midpoint of its
/// rounding interval and tagged with the rounding uncertainty. Per
/// (run, angle): the worst case across interface × polarization. Per angle:
/// the cross-run mean with
/// `U = k·√((std/√n)² + mean(u_round)²)` and bounds `main ± U`.
#[derive(Debug, Clone)]
pub struct RepeatedContainmentAggregator {
    root: PathBuf,
    config: ScanConfig,
}

impl RepeatedContainmentAggregator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, ScanConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        RepeatedContainmentAggregator {
            root: root.into(),
            config,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RunWorst {
    r2: f64,
    rounding: f64,
}

impl MeasurementAggregator for RepeatedContainmentAggregator {
    type Output = ContainmentTable;

    fn build(&self) -> Result<ContainmentTable> {
        let source = source_name(&self.root);
        let leaves = list_tree_files(&self.root)?;
        if leaves.is_empty() {
            info!("{}: no measurement files, yielding empty table", source);
            return Ok(ContainmentTable::empty(source));
        }

        // Worst case per (run, angle) across interface × polarization,
        // tracked independently for the radius and its rounding term.
        let mut worst: BTreeMap<(String, u32), RunWorst> = BTreeMap::new();
        for (ctx, path) in &leaves {
            let angle = angle_from_filename(path)?;
            let r2 = radius_from_filename(path)?;
            let sample = RunWorst {
                r2: recenter(r2),
                rounding: rounding_uncertainty(r2),
            };
            worst
                .entry((ctx.run.clone(), angle))
                .and_modify(|w| {
                    w.r2 = w.r2.max(sample.r2);
                    w.rounding = w.rounding.max(sample.rounding);
                })
                .or_insert(sample);
        }

        // Cross-run samples per angle.
        let mut samples: BTreeMap<u32, Vec<RunWorst>> = BTreeMap::new();
        for ((_, angle), w) in worst {
            samples.entry(angle).or_default().push(w);
        }

        let k = self.config.coverage_factor;
        let entries = samples
            .into_iter()
            .map(|(angle, runs)| {
                let n = runs.len() as f64;
                let mean = runs.iter().map(|w| w.r2).sum::<f64>() / n;
                let rounding_mean = runs.iter().map(|w| w.rounding).sum::<f64>() / n;

                // Standard uncertainty of the mean; a single contributing run
                // leaves the sample deviation undefined, so the statistical
                // term is dropped rather than propagating NaN into bounds.
                let u_mean = if runs.len() > 1 {
                    let var = runs
                        .iter()
                        .map(|w| (w.r2 - mean).powi(2))
                        .sum::<f64>()
                        / (n - 1.0);
                    var.sqrt() / n.sqrt()
                } else {
                    warn!(
                        "{}: angle {}° has a single run, statistical uncertainty set to zero",
                        source, angle
                    );
                    0.0
                };

                let expanded = k * (u_mean.powi(2) + rounding_mean.powi(2)).sqrt();
                ContainmentEntry {
                    angle_deg: f64::from(angle),
                    main: mean,
                    lower: mean - expanded,
                    upper: Some(mean + expanded),
                }
            })
            .collect();

        Ok(ContainmentTable { source, entries })
    }
}
