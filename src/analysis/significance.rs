// Significance testers for candidate splits
//
// A tester compares two adjacent, gap-free sample slices and reports their
// summary statistics together with a two-sided p-value. The divisive search
// and the merger only see the `SignificanceTester` trait, so the concrete
// test is chosen by configuration.
//
// - Student's t-test (default): works with tiny samples (<10 points),
//   assumes roughly normal data between change points
// - Mann-Whitney U: rank based, distribution free, needs ~30 points per side
// - qhat permutation test: resamples the energy statistic, non-deterministic
//   unless seeded

use crate::analysis::edivisive::qhat_values;
use crate::analysis::stats::{mean, population_std, ComparativeStats};
use crate::error::{HunterError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Number of shuffles the permutation tester performs by default
pub const DEFAULT_PERMUTATIONS: usize = 100;

/// Strategy computing the statistics of a split
pub trait SignificanceTester: Send + Sync {
    /// Compare `left` against `right`.
    ///
    /// Fails with `InsufficientData` when either side is empty.
    fn compare(&self, left: &[f64], right: &[f64]) -> Result<ComparativeStats>;

    fn name(&self) -> &'static str;
}

/// Selects the tester used by an analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum TesterKind {
    /// Two-sided Student's t-test on the summary statistics
    #[default]
    #[serde(rename = "ttest")]
    #[value(name = "ttest")]
    TTest,
    /// Two-sided Mann-Whitney U test (normal approximation)
    #[serde(rename = "mann-whitney")]
    #[value(name = "mann-whitney")]
    MannWhitney,
    /// qhat permutation test
    #[serde(rename = "permutation")]
    #[value(name = "permutation")]
    Permutation,
}

impl TesterKind {
    pub fn build(self, seed: Option<u64>) -> Box<dyn SignificanceTester> {
        match self {
            TesterKind::TTest => Box::new(TTestTester),
            TesterKind::MannWhitney => Box::new(MannWhitneyTester),
            TesterKind::Permutation => Box::new(PermutationTester::new(DEFAULT_PERMUTATIONS, seed)),
        }
    }
}

struct Summary {
    mean: f64,
    std: f64,
    len: usize,
}

fn summarize(values: &[f64]) -> Summary {
    let mean = mean(values);
    Summary {
        mean,
        std: population_std(values, mean),
        len: values.len(),
    }
}

fn check_non_empty(left: &[f64], right: &[f64]) -> Result<()> {
    if left.is_empty() || right.is_empty() {
        return Err(HunterError::insufficient_data(format!(
            "cannot compare samples of sizes {} and {}",
            left.len(),
            right.len()
        )));
    }
    Ok(())
}

/// Two-sided Student's t-test computed from means, deviations and counts
#[derive(Debug, Clone, Copy, Default)]
pub struct TTestTester;

impl SignificanceTester for TTestTester {
    fn compare(&self, left: &[f64], right: &[f64]) -> Result<ComparativeStats> {
        check_non_empty(left, right)?;
        let l = summarize(left);
        let r = summarize(right);
        let pvalue = if l.len + r.len > 2 {
            ttest_from_stats(&l, &r)
        } else {
            1.0
        };
        Ok(ComparativeStats {
            mean_1: l.mean,
            mean_2: r.mean,
            std_1: l.std,
            std_2: r.std,
            pvalue,
        })
    }

    fn name(&self) -> &'static str {
        "ttest"
    }
}

/// Pooled-variance t-test; the deviations are used as given (population).
fn ttest_from_stats(l: &Summary, r: &Summary) -> f64 {
    let (n1, n2) = (l.len as f64, r.len as f64);
    let df = n1 + n2 - 2.0;
    let pooled_var = ((n1 - 1.0) * l.std * l.std + (n2 - 1.0) * r.std * r.std) / df;
    let std_err = (pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt();

    // Zero spread on both sides: any difference of means is certain.
    if std_err == 0.0 || !std_err.is_finite() {
        return if l.mean == r.mean { 1.0 } else { 0.0 };
    }

    let t = (l.mean - r.mean) / std_err;
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.cdf(-t.abs())).min(1.0),
        Err(e) => {
            tracing::warn!("Student's t distribution unavailable (df={}): {}", df, e);
            1.0
        }
    }
}

/// Two-sided Mann-Whitney U test, tie and continuity corrected
#[derive(Debug, Clone, Copy, Default)]
pub struct MannWhitneyTester;

impl SignificanceTester for MannWhitneyTester {
    fn compare(&self, left: &[f64], right: &[f64]) -> Result<ComparativeStats> {
        check_non_empty(left, right)?;
        let l = summarize(left);
        let r = summarize(right);
        let pvalue = if l.len + r.len > 2 {
            mann_whitney_pvalue(left, right)
        } else {
            1.0
        };
        Ok(ComparativeStats {
            mean_1: l.mean,
            mean_2: r.mean,
            std_1: l.std,
            std_2: r.std,
            pvalue,
        })
    }

    fn name(&self) -> &'static str {
        "mann-whitney"
    }
}

fn mann_whitney_pvalue(left: &[f64], right: &[f64]) -> f64 {
    let n1 = left.len() as f64;
    let n2 = right.len() as f64;
    let n = n1 + n2;

    // (value, belongs to left)
    let mut pooled: Vec<(f64, bool)> = left
        .iter()
        .map(|&v| (v, true))
        .chain(right.iter().map(|&v| (v, false)))
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum_left = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i + 1;
        while j < pooled.len() && pooled[j].0 == pooled[i].0 {
            j += 1;
        }
        let ties = (j - i) as f64;
        // Ranks are 1-based; tied values share the average rank.
        let avg_rank = (i + j + 1) as f64 / 2.0;
        rank_sum_left += avg_rank * pooled[i..j].iter().filter(|p| p.1).count() as f64;
        tie_term += ties * ties * ties - ties;
        i = j;
    }

    let u1 = rank_sum_left - n1 * (n1 + 1.0) / 2.0;
    let mu = n1 * n2 / 2.0;
    let sigma = (n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)))).sqrt();
    if sigma == 0.0 || !sigma.is_finite() {
        return 1.0;
    }

    let z = ((u1 - mu).abs() - 0.5).max(0.0) / sigma;
    match Normal::new(0.0, 1.0) {
        Ok(dist) => (2.0 * dist.cdf(-z)).min(1.0),
        Err(e) => {
            tracing::warn!("standard normal distribution unavailable: {}", e);
            1.0
        }
    }
}

/// Energy-statistic permutation test
///
/// Both sides are pooled and the best qhat over all splits of the pooled
/// sample is compared with the best qhat of each shuffle. The p-value is
/// `shuffles reaching the observed best / (permutations + 1)`, so a
/// clear change gets a p-value of 0.
///
/// Without a seed every call draws fresh entropy and results differ between
/// runs. With a seed, the generator of each call is seeded from the seed
/// and the two side lengths, so the result only depends on the input.
#[derive(Debug, Clone, Copy)]
pub struct PermutationTester {
    permutations: usize,
    seed: Option<u64>,
}

impl PermutationTester {
    pub fn new(permutations: usize, seed: Option<u64>) -> Self {
        Self {
            permutations: permutations.max(1),
            seed,
        }
    }

    fn rng(&self, left_len: usize, right_len: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mixed = seed
                    ^ (left_len as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
                    ^ (right_len as u64).rotate_left(32);
                StdRng::seed_from_u64(mixed)
            }
            None => StdRng::from_entropy(),
        }
    }
}

fn best_qhat(pooled: &[f64]) -> f64 {
    qhat_values(pooled)
        .into_iter()
        .fold(f64::NEG_INFINITY, f64::max)
}

impl SignificanceTester for PermutationTester {
    fn compare(&self, left: &[f64], right: &[f64]) -> Result<ComparativeStats> {
        check_non_empty(left, right)?;
        let l = summarize(left);
        let r = summarize(right);

        let mut pooled: Vec<f64> = left.iter().chain(right.iter()).copied().collect();
        let pvalue = if pooled.len() < 4 {
            1.0
        } else {
            let observed = best_qhat(&pooled);
            let mut rng = self.rng(left.len(), right.len());
            let mut at_least_as_extreme = 0usize;
            for _ in 0..self.permutations {
                pooled.shuffle(&mut rng);
                if best_qhat(&pooled) >= observed {
                    at_least_as_extreme += 1;
                }
            }
            at_least_as_extreme as f64 / (self.permutations + 1) as f64
        };

        Ok(ComparativeStats {
            mean_1: l.mean,
            mean_2: r.mean,
            std_1: l.std,
            std_2: r.std,
            pvalue,
        })
    }

    fn name(&self) -> &'static str {
        "permutation"
    }
}
