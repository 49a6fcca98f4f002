use std::path::{Path, PathBuf};

use log::info;

use super::model::LevelSummary;
use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// CSV export of the reduced per-frequency table
// ---------------------------------------------------------------------------

/// Write the repeated-measurement summary next to its source directory.
///
/// When `path` is `None` the conventional name is used:
/// `<source-directory> [R2=<max_r2>].csv`. Returns the path written.
pub fn write_summary_csv(
    summary: &LevelSummary,
    source_dir: &Path,
    path: Option<&Path>,
) -> Result<PathBuf> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(format!(
            "{} [R2={}].csv",
            source_dir.display(),
            summary.max_r2
        )),
    };

    let mut writer = csv::Writer::from_path(&target).map_err(|source| ScanError::Csv {
        path: target.clone(),
        source,
    })?;
    for row in &summary.per_frequency {
        writer.serialize(row).map_err(|source| ScanError::Csv {
            path: target.clone(),
            source,
        })?;
    }
    writer.flush().map_err(|source| ScanError::Io {
        path: target.clone(),
        source,
    })?;

    info!(
        "wrote {} summary rows to {}",
        summary.per_frequency.len(),
        target.display()
    );
    Ok(target)
}
