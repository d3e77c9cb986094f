//! Match outcome model.
//!
//! Every finder reports its matches as [`MatchedCandidate`] values: a golden record reference,
//! the [`MatchOutcome`] classifying how strong the match is, and the [`CandidateStrategy`] that
//! produced it.

use crate::constants::MAX_CONFIDENCE;
use crate::{InternalId, MatchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Match-quality tier.
///
/// Variants are declared weakest first so the derived `Ord` ranks
/// `ExternalIdMatch > ScoredMatch > PossibleMatch > NoMatch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchTier {
    NoMatch,
    PossibleMatch,
    ScoredMatch,
    ExternalIdMatch,
}

impl MatchTier {
    fn as_wire(self) -> &'static str {
        match self {
            MatchTier::NoMatch => "NO_MATCH",
            MatchTier::PossibleMatch => "POSSIBLE_MATCH",
            MatchTier::ScoredMatch => "SCORED_MATCH",
            MatchTier::ExternalIdMatch => "EXTERNAL_ID_MATCH",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Classification of a match between a base record and a golden record.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub tier: MatchTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl MatchOutcome {
    /// Deterministic external identifier match.
    pub const EXTERNAL_ID_MATCH: MatchOutcome = MatchOutcome {
        tier: MatchTier::ExternalIdMatch,
        score: Some(MAX_CONFIDENCE),
    };

    pub const NO_MATCH: MatchOutcome = MatchOutcome {
        tier: MatchTier::NoMatch,
        score: None,
    };

    pub fn new(tier: MatchTier, score: Option<f64>) -> Self {
        Self { tier, score }
    }

    /// Returns false only for `NO_MATCH` outcomes.
    pub fn is_match(&self) -> bool {
        self.tier != MatchTier::NoMatch
    }
}

/// Identity of a candidate-finding strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStrategy {
    /// Golden records sharing an external identifier with the base record.
    ExternalId,
    /// Golden records found by weighted field similarity.
    Scored,
    /// The golden record the base record is already linked to.
    Link,
}

impl CandidateStrategy {
    fn as_wire(self) -> &'static str {
        match self {
            CandidateStrategy::ExternalId => "EXTERNAL_ID",
            CandidateStrategy::Scored => "SCORED",
            CandidateStrategy::Link => "LINK",
        }
    }
}

impl fmt::Display for CandidateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for CandidateStrategy {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EXTERNAL_ID" => Ok(CandidateStrategy::ExternalId),
            "SCORED" => Ok(CandidateStrategy::Scored),
            "LINK" => Ok(CandidateStrategy::Link),
            other => Err(MatchError::InvalidConfig(format!(
                "unknown candidate strategy '{other}' (expected EXTERNAL_ID, SCORED or LINK)"
            ))),
        }
    }
}

/// A golden record proposed as a match for a base record.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedCandidate {
    pub candidate: InternalId,
    pub outcome: MatchOutcome,
    pub strategy: CandidateStrategy,
}

impl MatchedCandidate {
    pub fn new(candidate: InternalId, outcome: MatchOutcome, strategy: CandidateStrategy) -> Self {
        Self {
            candidate,
            outcome,
            strategy,
        }
    }

    pub fn tier(&self) -> MatchTier {
        self.outcome.tier
    }
}

impl fmt::Display for MatchedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} via {}", self.candidate, self.outcome.tier, self.strategy)?;
        if let Some(score) = self.outcome.score {
            write!(f, " (score {score:.3})")?;
        }
        Ok(())
    }
}
