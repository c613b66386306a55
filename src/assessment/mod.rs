//! The per-fact judgment and its invariants.
//!
//! An [`Assessment`] is created by the judge, checked by [`Assessment::validate`] before
//! the orchestrator commits it, and never mutated afterwards.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::FactCatalog;
use crate::constants::{MAX_SCORE, MIN_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown confidence level: {}", other)),
        }
    }
}

/// Qualitative band of a support score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    /// 1-20: no evidence or contradictory evidence.
    NoSupport,
    /// 21-40: weak or indirect support.
    Weak,
    /// 41-60: some direct evidence.
    Moderate,
    /// 61-80: multiple sources with good evidence.
    Strong,
    /// 81-100: extensive evidence across sources.
    VeryStrong,
}

impl SupportLevel {
    /// Maps a score to its band. Scores outside `1..=100` are clamped into the edge bands.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=20 => Self::NoSupport,
            21..=40 => Self::Weak,
            41..=60 => Self::Moderate,
            61..=80 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoSupport => "no support",
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very strong",
        }
    }
}

/// Structured literature-support judgment for one fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub fact_id: u32,
    /// Support score in `1..=100`.
    pub score: u8,
    pub confidence: Confidence,
    /// Document identifiers cited as support, most relevant first.
    pub supporting_papers: Vec<String>,
    #[serde(default)]
    pub contradicting_papers: Vec<String>,
    pub evidence_summary: String,
    /// Number of evidence passages shown to the model.
    #[serde(default)]
    pub passages_reviewed: u32,
    /// Identifier of the model that produced the judgment.
    #[serde(default)]
    pub model: String,
    pub reviewed_at: DateTime<Utc>,
}

impl Assessment {
    pub fn support_level(&self) -> SupportLevel {
        SupportLevel::from_score(self.score)
    }

    /// Checks the invariants that must hold before the assessment is committed.
    pub fn validate(
        &self,
        expected_fact_id: u32,
        catalog: &FactCatalog,
    ) -> Result<(), ValidationError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(ValidationError::ScoreOutOfRange { score: self.score });
        }
        if self.fact_id != expected_fact_id {
            return Err(ValidationError::FactMismatch {
                expected: expected_fact_id,
                actual: self.fact_id,
            });
        }
        if !catalog.contains(self.fact_id) {
            return Err(ValidationError::UnknownFact {
                fact_id: self.fact_id,
            });
        }
        if self.supporting_papers.iter().any(|p| p.trim().is_empty()) {
            return Err(ValidationError::BlankCitation);
        }
        Ok(())
    }
}

/// A judgment that is well-formed but semantically unacceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("score {score} is outside 1..=100")]
    ScoreOutOfRange { score: u8 },

    #[error("assessment is for fact {actual}, expected fact {expected}")]
    FactMismatch { expected: u32, actual: u32 },

    #[error("fact {fact_id} is not in the catalog")]
    UnknownFact { fact_id: u32 },

    #[error("supporting papers contain a blank identifier")]
    BlankCitation,
}
