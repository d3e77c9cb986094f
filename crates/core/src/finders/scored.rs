//! Weighted field-similarity strategy.
//!
//! How confidences are computed belongs to the [`SimilarityIndex`]; this finder only turns
//! ranked `(golden record, confidence)` pairs into candidates using the configured thresholds.

use super::{resolve, CandidateFinder, CandidateList};
use crate::error::Collaborator;
use crate::{
    BaseRecord, CandidateStrategy, InternalIdResolver, MatchError, MatchOutcome, MatchResult,
    MatchThresholds, MatchedCandidate, SimilarityIndex,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ScoredCandidateFinder {
    index: Arc<dyn SimilarityIndex>,
    resolver: Arc<dyn InternalIdResolver>,
    thresholds: MatchThresholds,
}

impl ScoredCandidateFinder {
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        resolver: Arc<dyn InternalIdResolver>,
        thresholds: MatchThresholds,
    ) -> Self {
        Self {
            index,
            resolver,
            thresholds,
        }
    }
}

impl CandidateFinder for ScoredCandidateFinder {
    fn strategy(&self) -> CandidateStrategy {
        CandidateStrategy::Scored
    }

    fn find_candidates(&self, record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>> {
        let ranked = self
            .index
            .search(record)
            .map_err(|e| MatchError::lookup(Collaborator::SimilarityIndex, e))?;

        let mut candidates = CandidateList::new(self.strategy());

        for hit in ranked {
            if !hit.confidence.is_finite() {
                return Err(MatchError::lookup(
                    Collaborator::SimilarityIndex,
                    format!("non-finite confidence for {}", hit.handle).into(),
                ));
            }

            // Below the possible threshold is "no match", which is never reported.
            let Some(tier) = self.thresholds.classify(hit.confidence) else {
                continue;
            };

            let Some(internal_id) = resolve(self.resolver.as_ref(), &hit.handle)? else {
                continue;
            };

            candidates.push(internal_id, MatchOutcome::new(tier, Some(hit.confidence)));
        }

        Ok(candidates.into_vec())
    }
}
