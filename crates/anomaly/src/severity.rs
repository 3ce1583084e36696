use serde::{Deserialize, Serialize};

use kilnwatch_core::Severity;

/// Band one flagged sample's confidence against the batch average.
///
/// Either value crossing a band is enough.
pub fn classify(confidence: f64, batch_average: f64) -> Severity {
    if confidence > 2.5 || batch_average > 1.5 {
        Severity::Critical
    } else if confidence > 1.5 || batch_average > 1.0 {
        Severity::High
    } else if confidence > 0.8 || batch_average > 0.6 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Severity summary over the rows flagged in one detection call.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSeverity {
    pub level: Severity,
    pub count: usize,
    pub max_confidence: f64,
    pub average_confidence: f64,
}

impl BatchSeverity {
    pub fn none() -> Self {
        Self {
            level: Severity::Normal,
            count: 0,
            max_confidence: 0.0,
            average_confidence: 0.0,
        }
    }

    /// Summarise the confidences of flagged rows.
    pub fn from_confidences(confidences: &[f64]) -> Self {
        if confidences.is_empty() {
            return Self::none();
        }
        let max = confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = confidences.iter().sum::<f64>() / confidences.len() as f64;
        Self {
            level: classify(max, avg),
            count: confidences.len(),
            max_confidence: max,
            average_confidence: avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands() {
        assert_eq!(classify(2.6, 0.0), Severity::Critical);
        assert_eq!(classify(0.1, 1.6), Severity::Critical);
        assert_eq!(classify(1.6, 0.0), Severity::High);
        assert_eq!(classify(0.9, 0.0), Severity::Medium);
        assert_eq!(classify(0.1, 0.7), Severity::Medium);
        assert_eq!(classify(0.5, 0.5), Severity::Low);
        // Thresholds are strict.
        assert_eq!(classify(2.5, 1.5), Severity::High);
    }

    #[test]
    fn batch_summary() {
        assert_eq!(BatchSeverity::from_confidences(&[]).level, Severity::Normal);
        let s = BatchSeverity::from_confidences(&[0.7, 0.9]);
        assert_eq!(s.count, 2);
        assert_eq!(s.max_confidence, 0.9);
        assert!((s.average_confidence - 0.8).abs() < 1e-12);
        assert_eq!(s.level, Severity::Medium);
    }
}
