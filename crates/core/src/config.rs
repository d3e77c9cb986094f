//! Matching configuration.
//!
//! Configuration is resolved once (from an MDM rules document, CLI flags, or code) and then
//! shared with the aggregator and finders behind an `Arc`. Nothing in this module reads
//! environment variables; callers pass any overrides in explicitly.

use crate::constants::{DEFAULT_CERTAIN_THRESHOLD, DEFAULT_POSSIBLE_THRESHOLD, RULES_VERSION};
use crate::eid::EidExtractor;
use crate::{CandidateStrategy, EntityType, MatchError, MatchResult, MatchTier};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Confidence thresholds for the scored strategy.
///
/// `confidence >= certain` is a `SCORED_MATCH`, `possible <= confidence < certain` is a
/// `POSSIBLE_MATCH`, anything lower is not a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchThresholds {
    certain: f64,
    possible: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            certain: DEFAULT_CERTAIN_THRESHOLD,
            possible: DEFAULT_POSSIBLE_THRESHOLD,
        }
    }
}

impl MatchThresholds {
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] unless `0 <= possible <= certain <= 1`.
    pub fn new(certain: f64, possible: f64) -> MatchResult<Self> {
        let thresholds = Self { certain, possible };
        thresholds.validate()?;
        Ok(thresholds)
    }

    fn validate(&self) -> MatchResult<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(self.certain) || !in_range(self.possible) {
            return Err(MatchError::InvalidConfig(format!(
                "thresholds must be within [0, 1], got certain={} possible={}",
                self.certain, self.possible
            )));
        }
        if self.possible > self.certain {
            return Err(MatchError::InvalidConfig(format!(
                "possible threshold {} exceeds certain threshold {}",
                self.possible, self.certain
            )));
        }
        Ok(())
    }

    pub fn certain(&self) -> f64 {
        self.certain
    }

    pub fn possible(&self) -> f64 {
        self.possible
    }

    /// Maps a confidence to a candidate tier, or `None` below the possible threshold.
    pub fn classify(&self, confidence: f64) -> Option<MatchTier> {
        if confidence >= self.certain {
            Some(MatchTier::ScoredMatch)
        } else if confidence >= self.possible {
            Some(MatchTier::PossibleMatch)
        } else {
            None
        }
    }
}

fn default_version() -> String {
    RULES_VERSION.to_string()
}

fn default_strategies() -> Vec<CandidateStrategy> {
    vec![CandidateStrategy::ExternalId, CandidateStrategy::Scored]
}

/// Wire form of the MDM rules document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MdmRules {
    #[serde(default = "default_version")]
    pub version: String,

    /// Entity types managed by MDM. Records of any other type are rejected.
    pub mdm_types: Vec<EntityType>,

    /// Finders to run, in priority order.
    #[serde(default = "default_strategies")]
    pub candidate_strategies: Vec<CandidateStrategy>,

    /// Enterprise EID systems per entity type (`*` for all types).
    #[serde(default)]
    pub eid_systems: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub thresholds: MatchThresholds,

    #[serde(default)]
    pub parallel_finders: bool,
}

impl MdmRules {
    /// Parse a rules document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] naming the failing path when the document does not
    /// match the schema.
    pub fn parse(yaml_text: &str) -> MatchResult<Self> {
        parse_yaml(yaml_text, "MDM rules")
    }
}

/// Deserializes a YAML document, reporting schema errors as [`MatchError::InvalidConfig`]
/// with the path of the failing field.
pub(crate) fn parse_yaml<T: DeserializeOwned>(yaml_text: &str, document: &str) -> MatchResult<T> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
    serde_path_to_error::deserialize::<_, T>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() {
            "<root>".to_string()
        } else {
            path
        };
        MatchError::InvalidConfig(format!("{document} schema mismatch at {path}: {source}"))
    })
}

/// Validated matching configuration.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    mdm_types: BTreeSet<EntityType>,
    strategies: Vec<CandidateStrategy>,
    extractor: EidExtractor,
    thresholds: MatchThresholds,
    parallel_finders: bool,
}

impl MatchConfig {
    /// Create a new `MatchConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] if:
    /// - no MDM type or no strategy is configured,
    /// - a strategy is listed twice,
    /// - the thresholds are out of range,
    /// - the EID system mapping is invalid.
    pub fn new(
        mdm_types: Vec<EntityType>,
        strategies: Vec<CandidateStrategy>,
        extractor: EidExtractor,
        thresholds: MatchThresholds,
    ) -> MatchResult<Self> {
        if mdm_types.is_empty() {
            return Err(MatchError::InvalidConfig(
                "at least one MDM type must be configured".into(),
            ));
        }
        if strategies.is_empty() {
            return Err(MatchError::InvalidConfig(
                "at least one candidate strategy must be configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for strategy in &strategies {
            if !seen.insert(*strategy) {
                return Err(MatchError::InvalidConfig(format!(
                    "candidate strategy {strategy} is listed more than once"
                )));
            }
        }
        thresholds.validate()?;

        Ok(Self {
            mdm_types: mdm_types.into_iter().collect(),
            strategies,
            extractor,
            thresholds,
            parallel_finders: false,
        })
    }

    /// Builds a validated configuration from a rules document.
    pub fn from_rules(rules: MdmRules) -> MatchResult<Self> {
        if rules.version.trim() != RULES_VERSION {
            return Err(MatchError::InvalidConfig(format!(
                "unsupported MDM rules version '{}' (expected '{RULES_VERSION}')",
                rules.version
            )));
        }

        let extractor = EidExtractor::new(rules.eid_systems)?;
        let cfg = Self::new(
            rules.mdm_types,
            rules.candidate_strategies,
            extractor,
            rules.thresholds,
        )?;
        Ok(cfg.with_parallel_finders(rules.parallel_finders))
    }

    /// Parses and validates a rules document.
    pub fn parse_rules(yaml_text: &str) -> MatchResult<Self> {
        Self::from_rules(MdmRules::parse(yaml_text)?)
    }

    pub fn with_parallel_finders(mut self, parallel: bool) -> Self {
        self.parallel_finders = parallel;
        self
    }

    /// Replaces the scored-strategy thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] if the thresholds are out of range.
    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> MatchResult<Self> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(self)
    }

    pub fn is_supported_type(&self, entity_type: &EntityType) -> bool {
        self.mdm_types.contains(entity_type)
    }

    pub fn mdm_types(&self) -> impl Iterator<Item = &EntityType> {
        self.mdm_types.iter()
    }

    pub fn strategies(&self) -> &[CandidateStrategy] {
        &self.strategies
    }

    pub fn extractor(&self) -> &EidExtractor {
        &self.extractor
    }

    pub fn thresholds(&self) -> MatchThresholds {
        self.thresholds
    }

    pub fn parallel_finders(&self) -> bool {
        self.parallel_finders
    }
}

/// Apply threshold overrides given as optional string values.
///
/// `None`, empty or whitespace-only values leave the corresponding threshold of `base` in place.
///
/// # Errors
///
/// Returns [`MatchError::InvalidConfig`] if a value is not a number or the resulting pair is
/// invalid.
pub fn thresholds_from_values(
    base: MatchThresholds,
    certain: Option<String>,
    possible: Option<String>,
) -> MatchResult<MatchThresholds> {
    fn parse(name: &str, value: Option<String>) -> MatchResult<Option<f64>> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>().map_err(|e| {
                    MatchError::InvalidConfig(format!("invalid {name} threshold '{v}': {e}"))
                })
            })
            .transpose()
    }

    let certain = parse("certain", certain)?.unwrap_or(base.certain);
    let possible = parse("possible", possible)?.unwrap_or(base.possible);
    MatchThresholds::new(certain, possible)
}
