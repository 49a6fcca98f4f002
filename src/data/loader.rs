use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use encoding_rs::WINDOWS_1251;
use regex::Regex;

use super::model::{FreqKey, SweepRow};
use crate::error::{Result, ScanError};

// ---------------------------------------------------------------------------
// Filename token contract
// ---------------------------------------------------------------------------

/// Angle is the first parenthesized integer in the filename: `"... (45) ..."`.
static ANGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("valid angle pattern"));

/// Containment radius follows a `") "` token: `"(45) 12.txt"` → 12.
static RADIUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\) (\d+)").expect("valid radius pattern"));

/// Parse the measurement angle (degrees) out of a filename.
pub fn angle_from_filename(path: &Path) -> Result<u32> {
    let name = filename_str(path);
    ANGLE_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ScanError::MissingAngleToken {
            path: path.to_path_buf(),
        })
}

/// Parse the containment radius out of a filename.
pub fn radius_from_filename(path: &Path) -> Result<f64> {
    let name = filename_str(path);
    RADIUS_RE
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ScanError::MissingRadiusToken {
            path: path.to_path_buf(),
        })
}

fn filename_str(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Directory scans
// ---------------------------------------------------------------------------

/// List the `.txt` measurement files directly inside `dir`, sorted by name
/// so that repeated aggregations are deterministic.
pub fn list_measurement_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in read_dir(dir)? {
        let path = entry
            .map_err(|source| ScanError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_file() && is_txt(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run, interface, and polarization of one repeated-measurement leaf,
/// decoded from the two path segments between the dataset root and the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeContext {
    pub run: String,
    pub interface: String,
    pub polarization: String,
}

/// Walk a repeated-measurement tree `root/<run>/<interface polarization>/*.txt`
/// and return every leaf with its decoded context, sorted by path.
///
/// Non-directory entries at the root level are ignored (the root may carry
/// stray exports); a `.txt` file sitting where a polarization directory
/// should be, or a second-level directory whose name does not split into
/// `<interface> <polarization>`, is a structural error.
pub fn list_tree_files(root: &Path) -> Result<Vec<(TreeContext, PathBuf)>> {
    let mut leaves = Vec::new();

    let mut run_dirs: Vec<PathBuf> = Vec::new();
    for entry in read_dir(root)? {
        let path = entry
            .map_err(|source| ScanError::Io {
                path: root.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            run_dirs.push(path);
        }
    }
    run_dirs.sort();

    for run_dir in run_dirs {
        let run = dir_name(&run_dir);
        let mut combo_dirs: Vec<PathBuf> = Vec::new();
        for entry in read_dir(&run_dir)? {
            let path = entry
                .map_err(|source| ScanError::Io {
                    path: run_dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_dir() {
                combo_dirs.push(path);
            } else if is_txt(&path) {
                return Err(ScanError::BadTreeLayout {
                    root: root.to_path_buf(),
                    path,
                });
            }
        }
        combo_dirs.sort();

        for combo_dir in combo_dirs {
            let combo = dir_name(&combo_dir);
            let mut tokens = combo.split_whitespace();
            let (interface, polarization) = match (tokens.next(), tokens.next()) {
                (Some(i), Some(p)) => (i.to_string(), p.to_string()),
                _ => {
                    return Err(ScanError::BadTreeLayout {
                        root: root.to_path_buf(),
                        path: combo_dir,
                    })
                }
            };

            let mut files = Vec::new();
            for entry in read_dir(&combo_dir)? {
                let path = entry
                    .map_err(|source| ScanError::Io {
                        path: combo_dir.to_path_buf(),
                        source,
                    })?
                    .path();
                if path.is_file() && is_txt(&path) {
                    files.push(path);
                }
            }
            files.sort();

            for path in files {
                leaves.push((
                    TreeContext {
                        run: run.clone(),
                        interface: interface.clone(),
                        polarization: polarization.clone(),
                    },
                    path,
                ));
            }
        }
    }

    Ok(leaves)
}

fn read_dir(dir: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(dir).map_err(|source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn is_txt(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Sweep reading
// ---------------------------------------------------------------------------

/// Read the (frequency, signal, noise) rows of one measurement file.
///
/// The file is tab-separated Windows-1251 text with a leading row-number
/// column: `<n> <freq MHz> <signal dB> <noise dB>`. Producers emit one or
/// two header rows, so leading rows that do not parse as numbers are
/// skipped; once data has started, an unparsable row is an error.
///
/// `decimals` rounds the frequency before keying (repeated-measurement
/// datasets); `None` keeps the raw value as an exact key.
pub fn read_sweep(path: &Path, decimals: Option<u32>) -> Result<Vec<SweepRow>> {
    let bytes = std::fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (text, _, _) = WINDOWS_1251.decode(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|source| ScanError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        match parse_record(&record) {
            Some((freq, signal, noise)) => {
                let freq = match decimals {
                    Some(d) => FreqKey::rounded(freq, d),
                    None => FreqKey::new(freq),
                };
                rows.push(SweepRow {
                    freq,
                    signal,
                    noise,
                });
            }
            None if rows.is_empty() => continue, // header row
            None => {
                return Err(ScanError::BadRow {
                    path: path.to_path_buf(),
                    row: i + 1,
                    reason: format!("expected numeric (freq, signal, noise), got {record:?}"),
                })
            }
        }
    }

    Ok(rows)
}

/// Columns 1..3 of a record as floats; `None` when any of them is missing
/// or non-numeric.
fn parse_record(record: &csv::StringRecord) -> Option<(f64, f64, f64)> {
    let field = |idx: usize| -> Option<f64> { record.get(idx)?.trim().parse().ok() };
    Some((field(1)?, field(2)?, field(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn angle_token_parses() {
        assert_eq!(
            angle_from_filename(Path::new("meas (30) 15.txt")).unwrap(),
            30
        );
        assert_eq!(
            angle_from_filename(Path::new("DVI H (120).txt")).unwrap(),
            120
        );
    }

    #[test]
    fn missing_angle_token_is_an_error() {
        let err = angle_from_filename(Path::new("no token here.txt")).unwrap_err();
        assert!(matches!(err, ScanError::MissingAngleToken { .. }));
    }

    #[test]
    fn radius_token_parses() {
        assert_eq!(
            radius_from_filename(Path::new("meas (30) 15.txt")).unwrap(),
            15.0
        );
        let err = radius_from_filename(Path::new("meas (30).txt")).unwrap_err();
        assert!(matches!(err, ScanError::MissingRadiusToken { .. }));
    }

    #[test]
    fn sweep_skips_header_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "(0) 5.txt",
            b"Title line\n\xb9\tF, MHz\tSignal\tNoise\n1\t100.5\t20.0\t5.0\n2\t200.0\t30.0\t6.0\n",
        );
        let rows = read_sweep(&path, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].freq.mhz(), 100.5);
        assert_eq!(rows[0].signal, 20.0);
        assert_eq!(rows[1].noise, 6.0);
    }

    #[test]
    fn sweep_rounds_frequency_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "(0) 5.txt",
            b"h\th\th\th\n1\t100.4\t20.0\t5.0\n",
        );
        let rows = read_sweep(&path, Some(0)).unwrap();
        assert_eq!(rows[0].freq.mhz(), 100.0);
    }

    #[test]
    fn bad_row_after_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "(0) 5.txt",
            b"1\t100.0\t20.0\t5.0\n2\tgarbage\t30.0\t6.0\n",
        );
        let err = read_sweep(&path, None).unwrap_err();
        assert!(matches!(err, ScanError::BadRow { row: 2, .. }));
    }

    #[test]
    fn cp1251_content_decodes() {
        // "МГц" in Windows-1251 in the header; data rows unaffected.
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "(0) 5.txt",
            b"\xb9\t\xcc\xc3\xf6\tS\tN\n1\t100.0\t20.0\t5.0\n",
        );
        let rows = read_sweep(&path, None).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn tree_scan_decodes_run_interface_polarization() {
        let dir = tempfile::tempdir().unwrap();
        let combo = dir.path().join("1. run").join("DVI H");
        std::fs::create_dir_all(&combo).unwrap();
        write_file(&combo, "(0) 10.txt", b"1\t100\t20\t5\n");
        write_file(&combo, "(90) 10.txt", b"1\t100\t21\t5\n");

        let leaves = list_tree_files(dir.path()).unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(
            leaves[0].0,
            TreeContext {
                run: "1. run".into(),
                interface: "DVI".into(),
                polarization: "H".into(),
            }
        );
    }

    #[test]
    fn txt_file_at_run_level_is_structural_error() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("1. run");
        std::fs::create_dir_all(&run).unwrap();
        write_file(&run, "(0) 10.txt", b"1\t100\t20\t5\n");

        let err = list_tree_files(dir.path()).unwrap_err();
        assert!(matches!(err, ScanError::BadTreeLayout { .. }));
    }

    #[test]
    fn combo_dir_without_polarization_is_structural_error() {
        let dir = tempfile::tempdir().unwrap();
        let combo = dir.path().join("1. run").join("DVI");
        std::fs::create_dir_all(&combo).unwrap();

        let err = list_tree_files(dir.path()).unwrap_err();
        assert!(matches!(err, ScanError::BadTreeLayout { .. }));
    }
}
