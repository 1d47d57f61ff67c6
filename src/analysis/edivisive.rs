// Windowed E-Divisive search for candidate change points
//
// The divisive search picks the split maximizing the energy-distance
// statistic qhat, keeps it if the tester finds it significant and recurses
// into both halves. Its cost is quadratic in the segment length and it tends
// to miss changes in the middle of long, busy series, so it never runs on the
// whole series: it runs inside overlapping windows and the results are
// unioned.

use crate::analysis::significance::SignificanceTester;
use crate::analysis::stats::is_significant;
use crate::analysis::Candidate;
use crate::error::Result;

/// Smallest number of points on either side of a candidate split
const MIN_SIDE_LEN: usize = 2;

/// Energy-distance statistic for a split of `segment` at `split`.
///
/// Left is `segment[..split]` (n points), right is `segment[split..]`
/// (m points):
///
/// `qhat = mn/(m+n) * (2/(mn) * sum|x-y| - 1/n^2 * sum|x-x'| - 1/m^2 * sum|y-y'|)`
///
/// where the within-side sums run over ordered pairs.
#[cfg(test)]
fn qhat_at(segment: &[f64], split: usize) -> f64 {
    let (left, right) = segment.split_at(split);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let between: f64 = left
        .iter()
        .map(|x| right.iter().map(|y| (x - y).abs()).sum::<f64>())
        .sum();
    let within = |side: &[f64]| -> f64 {
        side.iter()
            .map(|x| side.iter().map(|y| (x - y).abs()).sum::<f64>())
            .sum()
    };
    scale_qhat(left.len(), right.len(), between, within(left) / 2.0, within(right) / 2.0)
}

/// qhat for every split position of `segment`.
///
/// Positions leaving fewer than two points on a side hold negative
/// infinity, so they never win an argmax. Runs in O(L^2) using running
/// sums of the within-side distances.
pub(crate) fn qhat_values(segment: &[f64]) -> Vec<f64> {
    let len = segment.len();
    let mut values = vec![f64::NEG_INFINITY; len];
    if len < 2 * MIN_SIDE_LEN {
        return values;
    }

    // left_pairs[n]: sum over i < k < n of |x_i - x_k|
    let mut left_pairs = vec![0.0; len + 1];
    for n in 1..=len {
        let added: f64 = segment[..n - 1]
            .iter()
            .map(|x| (x - segment[n - 1]).abs())
            .sum();
        left_pairs[n] = left_pairs[n - 1] + added;
    }

    // right_pairs[n]: sum over n <= j < k < len of |x_j - x_k|
    let mut right_pairs = vec![0.0; len + 1];
    for n in (0..len).rev() {
        let added: f64 = segment[n + 1..]
            .iter()
            .map(|x| (x - segment[n]).abs())
            .sum();
        right_pairs[n] = right_pairs[n + 1] + added;
    }

    let total = left_pairs[len];
    for (split, value) in values
        .iter_mut()
        .enumerate()
        .take(len - MIN_SIDE_LEN + 1)
        .skip(MIN_SIDE_LEN)
    {
        let between = total - left_pairs[split] - right_pairs[split];
        *value = scale_qhat(
            split,
            len - split,
            between,
            left_pairs[split],
            right_pairs[split],
        );
    }
    values
}

/// Combines the pair sums; `within_*` are sums over unordered pairs.
fn scale_qhat(n: usize, m: usize, between: f64, within_left: f64, within_right: f64) -> f64 {
    let (n, m) = (n as f64, m as f64);
    let stat = 2.0 * between / (m * n) - 2.0 * within_left / (n * n) - 2.0 * within_right / (m * m);
    stat * (m * n / (m + n))
}

/// Index of the largest qhat in `segment`; the first maximum wins.
fn best_split(segment: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (split, value) in qhat_values(segment).into_iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((split, value)),
        }
    }
    best.map(|(split, _)| split)
}

/// Recursive divisive search over one window of a series
pub(crate) struct DivisiveSplitter<'a> {
    tester: &'a dyn SignificanceTester,
    max_pvalue: f64,
}

impl<'a> DivisiveSplitter<'a> {
    pub(crate) fn new(tester: &'a dyn SignificanceTester, max_pvalue: f64) -> Self {
        Self { tester, max_pvalue }
    }

    /// Sorted split indexes (relative to `series`) that tested significant
    pub(crate) fn change_points(&self, series: &[f64]) -> Result<Vec<usize>> {
        let mut found = Vec::new();
        let mut pending = vec![(0, series.len())];

        while let Some((start, end)) = pending.pop() {
            let segment = &series[start..end];
            let Some(split) = best_split(segment) else {
                continue;
            };
            let stats = self.tester.compare(&segment[..split], &segment[split..])?;
            if !is_significant(stats.pvalue, self.max_pvalue) {
                continue;
            }
            let index = start + split;
            found.push(index);
            pending.push((start, index));
            pending.push((index, end));
        }

        found.sort_unstable();
        Ok(found)
    }
}

/// Runs the divisive search in half-overlapping windows of `window_len`
/// points and returns every candidate with stats computed against its
/// neighbours in the union of all windows.
pub(crate) fn split(
    series: &[f64],
    window_len: usize,
    max_pvalue: f64,
    tester: &dyn SignificanceTester,
) -> Result<Vec<Candidate>> {
    let splitter = DivisiveSplitter::new(tester, max_pvalue);
    let step = (window_len / 2).max(1);
    let mut indexes: Vec<usize> = Vec::new();
    let mut start = 0;

    while start < series.len() {
        let end = (start + window_len).min(series.len());
        let found = splitter.change_points(&series[start..end])?;
        tracing::trace!(start, end, found = found.len(), "searched window");

        let last = found.last().map_or(0, |i| i + start);
        indexes.extend(found.into_iter().map(|i| i + start));
        // A cluster at the tail of a window must not stall progress.
        start = last.max(start + step);
    }

    candidates_between(series, &indexes, tester)
}

/// Stats for each index against the neighbouring boundaries in `indexes`
///
/// `indexes` must be sorted, distinct and lie strictly inside the series.
pub(crate) fn candidates_between(
    series: &[f64],
    indexes: &[usize],
    tester: &dyn SignificanceTester,
) -> Result<Vec<Candidate>> {
    let mut boundaries = Vec::with_capacity(indexes.len() + 2);
    boundaries.push(0);
    boundaries.extend_from_slice(indexes);
    boundaries.push(series.len());

    boundaries
        .windows(3)
        .map(|w| {
            let stats = tester.compare(&series[w[0]..w[1]], &series[w[1]..w[2]])?;
            Ok(Candidate { index: w[1], stats })
        })
        .collect()
}
