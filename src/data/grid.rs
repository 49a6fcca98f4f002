use std::collections::BTreeSet;

use super::model::{FreqKey, SweepRow};

// ---------------------------------------------------------------------------
// Frequency grid unification
// ---------------------------------------------------------------------------

/// Merge any number of frequency axes into one ascending, duplicate-free
/// grid. The result is the canonical column ordering for every matrix built
/// from the same dataset.
///
/// Rounding (when a dataset needs it) happens at read time, before the keys
/// reach this function, so dedup here is exact.
pub fn unify_grids<I, J>(axes: I) -> Vec<FreqKey>
where
    I: IntoIterator<Item = J>,
    J: IntoIterator<Item = FreqKey>,
{
    let mut set = BTreeSet::new();
    for axis in axes {
        set.extend(axis);
    }
    set.into_iter().collect()
}

/// Canonical grid for a set of per-file sweeps. Files with zero rows simply
/// contribute nothing; whether they are tolerated at all is decided earlier
/// by the aggregator's empty-file policy.
pub fn unify_sweeps<'a, I>(sweeps: I) -> Vec<FreqKey>
where
    I: IntoIterator<Item = &'a [SweepRow]>,
{
    unify_grids(
        sweeps
            .into_iter()
            .map(|rows| rows.iter().map(|r| r.freq).collect::<Vec<_>>()),
    )
}
