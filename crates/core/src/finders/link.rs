//! Existing-link strategy.
//!
//! A base record that was matched before keeps pointing at its golden record through the link
//! written by the linking workflow. That golden record is reported with the outcome stored on
//! the link.

use super::{resolve, CandidateFinder, CandidateList};
use crate::error::Collaborator;
use crate::{
    BaseRecord, CandidateStrategy, InternalIdResolver, LinkLookup, MatchError, MatchResult,
    MatchedCandidate,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct LinkedCandidateFinder {
    links: Arc<dyn LinkLookup>,
    resolver: Arc<dyn InternalIdResolver>,
}

impl LinkedCandidateFinder {
    pub fn new(links: Arc<dyn LinkLookup>, resolver: Arc<dyn InternalIdResolver>) -> Self {
        Self { links, resolver }
    }
}

impl CandidateFinder for LinkedCandidateFinder {
    fn strategy(&self) -> CandidateStrategy {
        CandidateStrategy::Link
    }

    fn find_candidates(&self, record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>> {
        // A record that was never persisted cannot have been linked.
        let Some(source) = record.internal_id() else {
            return Ok(Vec::new());
        };

        let link = self
            .links
            .matched_golden_record(source, record.entity_type())
            .map_err(|e| MatchError::lookup(Collaborator::LinkLookup, e))?;

        let mut candidates = CandidateList::new(self.strategy());

        if let Some(link) = link.filter(|l| l.outcome.is_match()) {
            if let Some(internal_id) = resolve(self.resolver.as_ref(), &link.golden)? {
                tracing::debug!(
                    golden_record = %link.golden,
                    source = %source,
                    "found existing link to {}",
                    link.golden
                );
                candidates.push(internal_id, link.outcome);
            }
        }

        Ok(candidates.into_vec())
    }
}
