//! Scoring rules for quiz sessions.
//!
//! Two rules exist and a deployment picks exactly one. A session never mixes
//! them: the rule is fixed when the session is created.

use serde::{Deserialize, Serialize};

/// Points awarded for a correct answer under [`ScoringRule::Points`].
pub const POINTS_CORRECT: i64 = 50;

/// Points awarded (negative) for an incorrect answer under [`ScoringRule::Points`].
pub const POINTS_INCORRECT: i64 = -20;

/// How answers turn into score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringRule {
    /// Point-weighted: +50 correct, −20 incorrect. Score may go negative.
    #[default]
    Points,
    /// One point per correct answer, displayed as `score/total`.
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scoring rule: {0}")]
pub struct UnknownScoringRule(String);

impl std::str::FromStr for ScoringRule {
    type Err = UnknownScoringRule;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "points" => Ok(Self::Points),
            "binary" => Ok(Self::Binary),
            _ => Err(UnknownScoringRule(raw.to_owned())),
        }
    }
}

impl ScoringRule {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Binary => "binary",
        }
    }

    /// Score change for one answer.
    #[must_use]
    pub fn delta(self, correct: bool) -> i64 {
        match (self, correct) {
            (Self::Points, true) => POINTS_CORRECT,
            (Self::Points, false) => POINTS_INCORRECT,
            (Self::Binary, true) => 1,
            (Self::Binary, false) => 0,
        }
    }

    /// Human-readable score line shown on the result screen.
    #[must_use]
    pub fn display(self, score: i64, total: usize) -> String {
        match self {
            Self::Points => format!("{score} points"),
            Self::Binary => format!("{score}/{total}"),
        }
    }
}
