//! Grade results for generated answers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of grading one generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Useful,
    NotGrounded,
    NotUseful,
    Error,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grade::Useful => "USEFUL",
            Grade::NotGrounded => "NOT_GROUNDED",
            Grade::NotUseful => "NOT_USEFUL",
            Grade::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Immutable grade for one generation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub grade: Grade,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub rationale: String,
    /// Set when the grade was produced by failing open on an error
    #[serde(default)]
    pub fail_open: bool,
}

impl GradeResult {
    pub fn new(grade: Grade, confidence: f32, rationale: impl Into<String>) -> Self {
        Self {
            grade,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            rationale: rationale.into(),
            fail_open: false,
        }
    }

    pub fn useful(confidence: f32, rationale: impl Into<String>) -> Self {
        Self::new(Grade::Useful, confidence, rationale)
    }

    pub fn not_grounded(confidence: f32, rationale: impl Into<String>) -> Self {
        Self::new(Grade::NotGrounded, confidence, rationale)
    }

    pub fn not_useful(confidence: f32, rationale: impl Into<String>) -> Self {
        Self::new(Grade::NotUseful, confidence, rationale)
    }

    pub fn error(rationale: impl Into<String>) -> Self {
        Self::new(Grade::Error, 0.0, rationale)
    }

    /// Permissive grade substituted for an `ERROR`
    pub fn fail_open(rationale: impl Into<String>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(Grade::Useful, 0.0, rationale)
        }
    }

    pub fn is_useful(&self) -> bool {
        self.grade == Grade::Useful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(GradeResult::useful(1.7, "ok").confidence, 1.0);
        assert_eq!(GradeResult::not_useful(f32::NAN, "nan").confidence, 0.0);
    }

    #[test]
    fn test_fail_open_is_useful() {
        let grade = GradeResult::fail_open("judge returned garbage");
        assert!(grade.is_useful());
        assert!(grade.fail_open);
        assert_eq!(grade.grade.to_string(), "USEFUL");
    }
}
