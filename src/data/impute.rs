// ---------------------------------------------------------------------------
// Imputation policy: fill every unobserved (angle, frequency) cell
// ---------------------------------------------------------------------------

/// Fills the gaps of a sparse angle × frequency matrix pair.
///
/// A frequency missing from one angle's file means "nothing detected above
/// the noise floor observed elsewhere", so instead of leaving a hole:
///
/// * a missing **noise** cell takes the maximum noise recorded for that
///   frequency across the other angles;
/// * a missing **signal** cell takes `min(floor, max_noise_at_freq − 10)`;
/// * every cell, observed or substituted, is then clamped up to the floor.
///
/// The cross-angle maximum is computed once per frequency column, then a
/// single pass fills the gaps.
#[derive(Debug, Clone, Copy)]
pub struct Imputer {
    /// Minimum meaningful reading, dB. Values below are raised to it.
    pub floor_db: f64,
}

impl Default for Imputer {
    fn default() -> Self {
        Imputer { floor_db: 0.0 }
    }
}

impl Imputer {
    /// Margin below the noise maximum used for absent signal readings, dB.
    const SIGNAL_MARGIN: f64 = 10.0;

    /// Fill both matrices. Rows are angles, columns follow the canonical
    /// frequency grid; `None` marks an unobserved cell. Every column must
    /// hold at least one observed noise value, which the grid unifier
    /// guarantees since the grid is drawn from observations.
    pub fn fill(
        &self,
        signal: Vec<Vec<Option<f64>>>,
        noise: Vec<Vec<Option<f64>>>,
    ) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let cols = noise.first().map_or(0, Vec::len);

        // Cross-angle noise maximum per frequency column. Clamping can only
        // raise values, so the post-clamp maximum is max(raw, floor).
        let max_noise: Vec<f64> = (0..cols)
            .map(|c| {
                noise
                    .iter()
                    .filter_map(|row| row[c])
                    .fold(self.floor_db, f64::max)
            })
            .collect();

        let noise_filled = noise
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, cell)| cell.unwrap_or(max_noise[c]).max(self.floor_db))
                    .collect()
            })
            .collect();

        let signal_filled = signal
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, cell)| {
                        cell.unwrap_or_else(|| {
                            self.floor_db.min(max_noise[c] - Self::SIGNAL_MARGIN)
                        })
                        .max(self.floor_db)
                    })
                    .collect()
            })
            .collect();

        (signal_filled, noise_filled)
    }
}
