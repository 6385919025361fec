// src/credibility/rating.rs
//! # Credibility Rating
//! Pure scoring helpers: sample-size confidence, adjusted score and rating
//! buckets. No I/O, suitable for unit tests.
//!
//! The default [`ConfidenceModel::Step`] is a coarse trust discount, not a
//! statistical interval. [`ConfidenceModel::Wilson`] is available where a
//! proper estimator is wanted; it rates on the lower bound of the Wilson
//! score interval instead.

use serde::{Deserialize, Serialize};

/// Five-level rating derived from the adjusted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CredibilityRating {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CredibilityRating {
    /// Bucket an adjusted score on the 0–100 scale.
    pub fn from_adjusted(score: f64) -> Self {
        if score >= 90.0 {
            Self::VeryHigh
        } else if score >= 70.0 {
            Self::High
        } else if score >= 50.0 {
            Self::Moderate
        } else if score >= 30.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// Human-readable label for UI consumers.
    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
            Self::VeryLow => "Very Low",
        }
    }
}

/// How sample size turns into a trust discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfidenceModel {
    /// `<=5 → 0.5, <=10 → 0.7, <=20 → 0.8, <=50 → 0.9, else 1.0`
    #[default]
    Step,
    /// Wilson score interval with the given z (1.96 ≈ 95%).
    Wilson { z: f64 },
}

/// Scores for one domain, computed together so they stay consistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub real_percentage: f64,
    pub confidence_score: f64,
    pub rating: CredibilityRating,
}

impl ConfidenceModel {
    pub fn score(&self, total: u64, real: u64) -> Scored {
        let real_percentage = real_percentage(total, real);
        match *self {
            Self::Step => {
                let confidence_score = step_confidence(total);
                Scored {
                    real_percentage,
                    confidence_score,
                    rating: CredibilityRating::from_adjusted(real_percentage * confidence_score),
                }
            }
            Self::Wilson { z } => {
                let (lower, upper) = wilson_interval(total, real, z);
                Scored {
                    real_percentage,
                    confidence_score: (1.0 - (upper - lower)).clamp(0.0, 1.0),
                    rating: CredibilityRating::from_adjusted(lower * 100.0),
                }
            }
        }
    }
}

/// `real / total * 100`, 0 for an empty sample.
///
/// Multiplies first so whole percentages come out exact.
pub fn real_percentage(total: u64, real: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    real as f64 * 100.0 / total as f64
}

/// Non-decreasing step function of sample size.
pub fn step_confidence(total: u64) -> f64 {
    match total {
        0..=5 => 0.5,
        6..=10 => 0.7,
        11..=20 => 0.8,
        21..=50 => 0.9,
        _ => 1.0,
    }
}

/// Wilson score interval for `real` successes out of `total`, as proportions.
pub fn wilson_interval(total: u64, real: u64, z: f64) -> (f64, f64) {
    if total == 0 {
        return (0.0, 1.0);
    }
    let n = total as f64;
    let p = real as f64 / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    ((center - half).max(0.0), (center + half).min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_confidence_boundaries() {
        assert_eq!(step_confidence(1), 0.5);
        assert_eq!(step_confidence(5), 0.5);
        assert_eq!(step_confidence(6), 0.7);
        assert_eq!(step_confidence(10), 0.7);
        assert_eq!(step_confidence(20), 0.8);
        assert_eq!(step_confidence(50), 0.9);
        assert_eq!(step_confidence(51), 1.0);
    }

    #[test]
    fn step_confidence_is_non_decreasing() {
        let mut prev = 0.0;
        for n in 0..200 {
            let c = step_confidence(n);
            assert!(c >= prev, "confidence dropped at n={n}");
            prev = c;
        }
    }

    #[test]
    fn discount_changes_bucket() {
        // 54/60 = 90%, full confidence
        let big = ConfidenceModel::Step.score(60, 54);
        assert!((big.real_percentage - 90.0).abs() < 1e-9);
        assert_eq!(big.rating, CredibilityRating::VeryHigh);

        // same percentage on a tiny sample: 90 * 0.5 = 45
        let small = ConfidenceModel::Step.score(10, 9);
        assert!((small.real_percentage - 90.0).abs() < 1e-9);
        assert_eq!(small.confidence_score, 0.7);
        assert_eq!(CredibilityRating::from_adjusted(90.0 * 0.5), CredibilityRating::Low);
    }

    #[test]
    fn rating_buckets() {
        assert_eq!(CredibilityRating::from_adjusted(90.0), CredibilityRating::VeryHigh);
        assert_eq!(CredibilityRating::from_adjusted(89.9), CredibilityRating::High);
        assert_eq!(CredibilityRating::from_adjusted(70.0), CredibilityRating::High);
        assert_eq!(CredibilityRating::from_adjusted(50.0), CredibilityRating::Moderate);
        assert_eq!(CredibilityRating::from_adjusted(30.0), CredibilityRating::Low);
        assert_eq!(CredibilityRating::from_adjusted(29.99), CredibilityRating::VeryLow);
        assert_eq!(CredibilityRating::VeryHigh.label(), "Very High");
    }

    #[test]
    fn wilson_interval_narrows_with_samples() {
        let (l1, u1) = wilson_interval(10, 9, 1.96);
        let (l2, u2) = wilson_interval(1000, 900, 1.96);
        assert!(u1 - l1 > u2 - l2);
        assert!(l1 < 0.9 && u1 > 0.9);
        assert!(l2 < 0.9 && u2 > 0.9);
    }

    #[test]
    fn wilson_model_rates_on_lower_bound() {
        let m = ConfidenceModel::Wilson { z: 1.96 };
        let small = m.score(3, 3);
        let big = m.score(500, 500);
        assert!(small.confidence_score < big.confidence_score);
        assert!(small.rating < big.rating);
        assert_eq!(big.rating, CredibilityRating::VeryHigh);
    }
}
