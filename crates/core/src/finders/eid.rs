//! Exact external-identifier strategy.

use super::{resolve, CandidateFinder, CandidateList};
use crate::constants::TROUBLESHOOTING_TARGET;
use crate::eid::EidExtractor;
use crate::error::Collaborator;
use crate::{
    BaseRecord, CandidateStrategy, GoldenRecordLookup, InternalIdResolver, MatchError,
    MatchOutcome, MatchResult, MatchedCandidate,
};
use std::sync::Arc;

/// Matches a base record against golden records tagged with one of its EIDs.
///
/// Identifiers are tried in record order, so when two EIDs point at the same golden record the
/// first one is the one reported.
#[derive(Clone)]
pub struct ExternalIdCandidateFinder {
    extractor: EidExtractor,
    lookup: Arc<dyn GoldenRecordLookup>,
    resolver: Arc<dyn InternalIdResolver>,
}

impl ExternalIdCandidateFinder {
    pub fn new(
        extractor: EidExtractor,
        lookup: Arc<dyn GoldenRecordLookup>,
        resolver: Arc<dyn InternalIdResolver>,
    ) -> Self {
        Self {
            extractor,
            lookup,
            resolver,
        }
    }
}

impl CandidateFinder for ExternalIdCandidateFinder {
    fn strategy(&self) -> CandidateStrategy {
        CandidateStrategy::ExternalId
    }

    fn find_candidates(&self, record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>> {
        let eids = self.extractor.extract(record);
        if eids.is_empty() {
            return Ok(Vec::new());
        }

        let entity_type = record.entity_type();
        let mut candidates = CandidateList::new(self.strategy());

        for eid in &eids {
            let found = self
                .lookup
                .lookup_by_external_id(eid, entity_type)
                .map_err(|e| MatchError::lookup(Collaborator::GoldenRecordLookup, e))?;

            let Some(golden) = found else {
                continue;
            };

            let Some(internal_id) = resolve(self.resolver.as_ref(), &golden)? else {
                tracing::debug!(
                    target: TROUBLESHOOTING_TARGET,
                    golden_record = %golden,
                    eid = %eid,
                    "skipping transient golden record matched by EID"
                );
                continue;
            };

            if candidates.push(internal_id, MatchOutcome::EXTERNAL_ID_MATCH) {
                tracing::debug!(
                    target: TROUBLESHOOTING_TARGET,
                    golden_record = %golden,
                    internal_id = %internal_id,
                    eid = %eid,
                    entity_type = %entity_type,
                    "matched {} by EID {}",
                    golden,
                    eid
                );
            }
        }

        Ok(candidates.into_vec())
    }
}
