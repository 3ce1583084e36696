//! Shared vocabulary across subsystems (severity, status, grade, priority).

use serde::{Deserialize, Serialize};

/// Ordinal severity of an alert (`normal < low < medium < high < critical`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall plant status derived once per inference cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Optimal,
    Alert,
    Warning,
    Critical,
    Error,
}

/// Product quality grade, 1 (excellent) to 4 (poor).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QualityGrade {
    Excellent = 1,
    Good = 2,
    Acceptable = 3,
    Poor = 4,
}

impl QualityGrade {
    /// Bucket an overall 0–100 quality score.
    pub fn from_score(overall_score: f64) -> Self {
        if overall_score >= 90.0 {
            QualityGrade::Excellent
        } else if overall_score >= 75.0 {
            QualityGrade::Good
        } else if overall_score >= 60.0 {
            QualityGrade::Acceptable
        } else {
            QualityGrade::Poor
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<QualityGrade> for u8 {
    fn from(value: QualityGrade) -> Self {
        value.as_u8()
    }
}

impl TryFrom<u8> for QualityGrade {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(QualityGrade::Excellent),
            2 => Ok(QualityGrade::Good),
            3 => Ok(QualityGrade::Acceptable),
            4 => Ok(QualityGrade::Poor),
            other => Err(format!("quality grade must be 1..=4, got {other}")),
        }
    }
}

/// Priority of a correction plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    High,
}
