//! Candidate finders.
//!
//! A finder is one matching strategy: it consumes a base record and returns the golden records
//! it considers candidates, in its own priority order. Finders are composed by the
//! [`CandidateAggregator`](crate::CandidateAggregator); they never see each other's output.
//!
//! Every finder shares two rules:
//! - golden records without an internal id (transient) are skipped, never returned
//! - a golden record is reported at most once per call; the first match wins

mod eid;
mod link;
mod scored;

pub use eid::ExternalIdCandidateFinder;
pub use link::LinkedCandidateFinder;
pub use scored::ScoredCandidateFinder;

use crate::error::Collaborator;
use crate::{
    BaseRecord, CandidateStrategy, GoldenRecordHandle, InternalId, InternalIdResolver, MatchError,
    MatchOutcome, MatchResult, MatchedCandidate,
};
use std::collections::HashSet;

/// A candidate-finding strategy.
pub trait CandidateFinder: Send + Sync {
    /// Identity of this strategy, used for configuration and diagnostics.
    fn strategy(&self) -> CandidateStrategy;

    /// Returns the golden-record candidates for `record`.
    ///
    /// An empty list means this strategy found nothing; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::LookupFailure`] if a collaborator fails. No partial list is
    /// returned in that case.
    fn find_candidates(&self, record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>>;
}

/// Accumulates one finder's output, enforcing first-match-wins per golden record.
pub(crate) struct CandidateList {
    strategy: CandidateStrategy,
    seen: HashSet<InternalId>,
    candidates: Vec<MatchedCandidate>,
}

impl CandidateList {
    pub(crate) fn new(strategy: CandidateStrategy) -> Self {
        Self {
            strategy,
            seen: HashSet::new(),
            candidates: Vec::new(),
        }
    }

    /// Appends a candidate unless `id` is already present. Returns whether it was added.
    pub(crate) fn push(&mut self, id: InternalId, outcome: MatchOutcome) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.candidates
            .push(MatchedCandidate::new(id, outcome, self.strategy));
        true
    }

    pub(crate) fn into_vec(self) -> Vec<MatchedCandidate> {
        self.candidates
    }
}

/// Resolves a handle, mapping resolver errors to [`MatchError::LookupFailure`].
pub(crate) fn resolve(
    resolver: &dyn InternalIdResolver,
    handle: &GoldenRecordHandle,
) -> MatchResult<Option<InternalId>> {
    resolver
        .resolve_internal_id(handle)
        .map_err(|e| MatchError::lookup(Collaborator::InternalIdResolver, e))
}
