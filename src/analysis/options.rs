// Tuning knobs of a change point analysis

use crate::analysis::significance::TesterKind;
use crate::error::{HunterError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound for `window_len`; the search is quadratic in it
pub const MAX_WINDOW_LEN: usize = 1000;

/// Options passed by value into every analysis
///
/// # Example
/// ```
/// use hunter::analysis::AnalysisOptions;
///
/// let options = AnalysisOptions::default();
/// assert_eq!(options.window_len, 50);
/// assert_eq!(options.max_pvalue, 0.001);
/// assert_eq!(options.min_magnitude, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Number of points searched at once by the divisive search
    ///
    /// Consecutive windows overlap by half. Larger windows see longer
    /// trends but cost O(window_len^2) per window.
    pub window_len: usize,

    /// Largest p-value a reported change point may have
    ///
    /// The windowed search accepts candidates up to ten times this value;
    /// the merger then enforces it.
    pub max_pvalue: f64,

    /// Smallest relative change a reported change point must exceed
    ///
    /// 0.0 keeps every significant change; 0.05 drops changes below 5%.
    pub min_magnitude: f64,

    /// Significance test used for splitting and pruning
    pub tester: TesterKind,

    /// Seed for the permutation tester; ignored by the others
    ///
    /// Each comparison seeds its generator from this value and the sizes of
    /// the compared sides, so a seeded analysis is repeatable.
    pub seed: Option<u64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            window_len: 50,
            max_pvalue: 0.001,
            min_magnitude: 0.0,
            tester: TesterKind::TTest,
            seed: None,
        }
    }
}

impl AnalysisOptions {
    pub fn with_window_len(mut self, window_len: usize) -> Self {
        self.window_len = window_len;
        self
    }

    pub fn with_max_pvalue(mut self, max_pvalue: f64) -> Self {
        self.max_pvalue = max_pvalue;
        self
    }

    pub fn with_min_magnitude(mut self, min_magnitude: f64) -> Self {
        self.min_magnitude = min_magnitude;
        self
    }

    pub fn with_tester(mut self, tester: TesterKind) -> Self {
        self.tester = tester;
        self
    }

    /// Validate options
    pub fn validate(&self) -> Result<()> {
        if self.window_len < 2 || self.window_len > MAX_WINDOW_LEN {
            return Err(HunterError::invalid_options(format!(
                "window_len must be in [2, {}], got {}",
                MAX_WINDOW_LEN, self.window_len
            )));
        }

        if !(0.0..=1.0).contains(&self.max_pvalue) {
            return Err(HunterError::invalid_options(format!(
                "max_pvalue must be in [0, 1], got {}",
                self.max_pvalue
            )));
        }

        if !(self.min_magnitude >= 0.0) {
            return Err(HunterError::invalid_options(format!(
                "min_magnitude must be non-negative, got {}",
                self.min_magnitude
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AnalysisOptions::default();
        assert_eq!(options.window_len, 50);
        assert_eq!(options.max_pvalue, 0.001);
        assert_eq!(options.min_magnitude, 0.0);
        assert_eq!(options.tester, TesterKind::TTest);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_window_len() {
        assert!(AnalysisOptions::default()
            .with_window_len(1)
            .validate()
            .is_err());
        assert!(AnalysisOptions::default()
            .with_window_len(MAX_WINDOW_LEN + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_max_pvalue() {
        let err = AnalysisOptions::default()
            .with_max_pvalue(1.5)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_pvalue"));
    }

    #[test]
    fn test_invalid_min_magnitude() {
        assert!(AnalysisOptions::default()
            .with_min_magnitude(-0.1)
            .validate()
            .is_err());
        assert!(AnalysisOptions::default()
            .with_min_magnitude(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let options: AnalysisOptions = toml::from_str("window_len = 30\ntester = \"mann-whitney\"").unwrap();
        assert_eq!(options.window_len, 30);
        assert_eq!(options.max_pvalue, 0.001);
        assert_eq!(options.tester, TesterKind::MannWhitney);
    }
}
