// Change point detection for a single metric
//
// Pipeline per metric:
// 1. fill_missing: repair gaps (forward fill, then back fill leading gaps)
// 2. edivisive::split: windowed E-Divisive search, relaxed threshold
//    (10 x max_pvalue), stats recomputed against all candidates
// 3. merge::merge: bottom-up pruning down to candidates that are significant
//    at max_pvalue and larger than min_magnitude
//
// Everything here works on plain `&[f64]` slices and is independent of the
// Series model, so metrics can be analyzed in parallel.

mod edivisive;
mod fill;
mod merge;
mod options;
mod significance;
mod stats;

pub use fill::fill_missing;
pub use options::{AnalysisOptions, MAX_WINDOW_LEN};
pub use significance::{
    MannWhitneyTester, PermutationTester, SignificanceTester, TTestTester, TesterKind,
    DEFAULT_PERMUTATIONS,
};
pub use stats::{is_significant, ComparativeStats};

use crate::error::Result;

/// Factor by which the windowed search relaxes `max_pvalue`
const SPLIT_PVALUE_FACTOR: f64 = 10.0;

/// A change point index together with the stats of the segments around it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub stats: ComparativeStats,
}

/// Finds the change points of one gap-free value sequence.
///
/// Returns candidates sorted by index. Each candidate's stats compare the
/// segment between the previous change point (or the start) and this one
/// with the segment up to the next change point (or the end).
///
/// # Example
/// ```
/// use hunter::analysis::{compute_change_points, AnalysisOptions, TTestTester};
///
/// let values = [1.0, 1.1, 0.9, 1.0, 1.05, 5.0, 5.1, 4.9, 5.0, 5.05];
/// let found = compute_change_points(&values, &AnalysisOptions::default(), &TTestTester).unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].index, 5);
/// ```
pub fn compute_change_points(
    values: &[f64],
    options: &AnalysisOptions,
    tester: &dyn SignificanceTester,
) -> Result<Vec<Candidate>> {
    options.validate()?;

    let candidates = edivisive::split(
        values,
        options.window_len,
        options.max_pvalue * SPLIT_PVALUE_FACTOR,
        tester,
    )?;
    tracing::debug!(
        points = values.len(),
        candidates = candidates.len(),
        tester = tester.name(),
        "windowed search done"
    );

    merge::merge(
        candidates,
        values,
        options.max_pvalue,
        options.min_magnitude,
        tester,
    )
}
