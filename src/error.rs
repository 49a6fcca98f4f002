use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while scanning and aggregating measurement directories.
///
/// Parse errors are fatal for the whole aggregation: a matrix needs complete
/// angle coverage, so there is no partial-file skip policy. An empty
/// directory is *not* an error — it yields an empty matrix the caller can
/// detect.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {}", path.display(), source)]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Filename carries no `"(<angle>)"` token.
    #[error("{}: filename has no \"(angle)\" token", path.display())]
    MissingAngleToken { path: PathBuf },

    /// Filename carries no `") <radius>"` token.
    #[error("{}: filename has no \") radius\" token", path.display())]
    MissingRadiusToken { path: PathBuf },

    /// A repeated-measurement leaf is not laid out as
    /// `root/<run>/<interface polarization>/<file>.txt`.
    #[error("{}: expected <run>/<interface polarization>/<file> below {}", path.display(), root.display())]
    BadTreeLayout { root: PathBuf, path: PathBuf },

    /// A data row could not be parsed as `(frequency, signal, noise)`.
    #[error("{} row {}: {}", path.display(), row, reason)]
    BadRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    /// A measurement file contains no data rows and the dataset is
    /// configured with [`EmptyFilePolicy::Fail`](crate::data::aggregate::EmptyFilePolicy).
    #[error("{}: no data rows", path.display())]
    EmptyFile { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ScanError>;
