// Summary statistics of two adjacent sample sets
//
// Every tester produces a `ComparativeStats`: means and population standard
// deviations of both sides plus the p-value of the split. The derived relative
// changes are what reports show and what the merger uses as "magnitude".

use serde::{Deserialize, Serialize};

/// Means, deviations and significance of a left/right split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparativeStats {
    /// Mean of the left (earlier) side
    pub mean_1: f64,
    /// Mean of the right (later) side
    pub mean_2: f64,
    /// Population standard deviation of the left side (0.0 below 2 points)
    pub std_1: f64,
    /// Population standard deviation of the right side (0.0 below 2 points)
    pub std_2: f64,
    /// Two-sided p-value of the difference
    pub pvalue: f64,
}

impl ComparativeStats {
    /// `mean_2 / mean_1 - 1`
    pub fn forward_rel_change(&self) -> f64 {
        self.mean_2 / self.mean_1 - 1.0
    }

    /// `mean_1 / mean_2 - 1`
    pub fn backward_rel_change(&self) -> f64 {
        self.mean_1 / self.mean_2 - 1.0
    }

    /// Larger of the absolute forward and backward relative changes
    ///
    /// A drop from 1.0 to 0.5 is -50% forward but +100% backward, so the
    /// magnitude treats halving and doubling alike.
    pub fn change_magnitude(&self) -> f64 {
        self.forward_rel_change()
            .abs()
            .max(self.backward_rel_change().abs())
    }

    pub fn is_significant(&self, max_pvalue: f64) -> bool {
        is_significant(self.pvalue, max_pvalue)
    }
}

/// Significance decision shared by every tester
pub fn is_significant(pvalue: f64, threshold: f64) -> bool {
    pvalue <= threshold
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than 2 points
pub(crate) fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}
