//! Stub collaborators shared by unit tests.

use crate::error::CollaboratorError;
use crate::{
    BaseRecord, CandidateFinder, CandidateStrategy, EntityType, ExistingLink, ExternalIdentifier,
    GoldenRecordHandle, GoldenRecordLookup, InternalId, InternalIdResolver, LinkLookup,
    MatchError, MatchOutcome, MatchResult, MatchTier, MatchedCandidate, NonEmptyText, ScoredHandle,
    SimilarityIndex,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn patient_type() -> EntityType {
    EntityType::parse("Patient").unwrap()
}

pub(crate) fn handle(id: &str) -> GoldenRecordHandle {
    GoldenRecordHandle::new(patient_type(), NonEmptyText::new(id).unwrap())
}

pub(crate) fn eid(system: &str, value: &str) -> ExternalIdentifier {
    ExternalIdentifier::new(system, value).unwrap()
}

pub(crate) fn patient_with(eids: &[(&str, &str)]) -> BaseRecord {
    eids.iter()
        .fold(BaseRecord::new(patient_type()), |record, (system, value)| {
            record.with_identifier(eid(system, value))
        })
}

#[derive(Default)]
pub(crate) struct StubLookup {
    entries: HashMap<ExternalIdentifier, GoldenRecordHandle>,
    fail_on: Option<ExternalIdentifier>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub(crate) fn with(mut self, system: &str, value: &str, golden: &str) -> Self {
        self.entries.insert(eid(system, value), handle(golden));
        self
    }

    pub(crate) fn failing_on(mut self, system: &str, value: &str) -> Self {
        self.fail_on = Some(eid(system, value));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GoldenRecordLookup for StubLookup {
    fn lookup_by_external_id(
        &self,
        eid: &ExternalIdentifier,
        _entity_type: &EntityType,
    ) -> Result<Option<GoldenRecordHandle>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.as_ref() == Some(eid) {
            return Err("golden record store unavailable".into());
        }
        Ok(self.entries.get(eid).cloned())
    }
}

#[derive(Default)]
pub(crate) struct StubResolver {
    ids: HashMap<GoldenRecordHandle, InternalId>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubResolver {
    pub(crate) fn with(mut self, golden: &str, id: u64) -> Self {
        self.ids.insert(handle(golden), InternalId::new(id));
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InternalIdResolver for StubResolver {
    fn resolve_internal_id(
        &self,
        handle: &GoldenRecordHandle,
    ) -> Result<Option<InternalId>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("id service unreachable".into());
        }
        Ok(self.ids.get(handle).copied())
    }
}

#[derive(Default)]
pub(crate) struct StubIndex {
    results: Vec<ScoredHandle>,
    fail: bool,
}

impl StubIndex {
    pub(crate) fn with(mut self, golden: &str, confidence: f64) -> Self {
        self.results.push(ScoredHandle {
            handle: handle(golden),
            confidence,
        });
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl SimilarityIndex for StubIndex {
    fn search(&self, _record: &BaseRecord) -> Result<Vec<ScoredHandle>, CollaboratorError> {
        if self.fail {
            return Err("index offline".into());
        }
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub(crate) struct StubLinks {
    links: HashMap<InternalId, ExistingLink>,
    calls: AtomicUsize,
}

impl StubLinks {
    pub(crate) fn with(mut self, source: u64, golden: &str, outcome: MatchOutcome) -> Self {
        self.links.insert(
            InternalId::new(source),
            ExistingLink {
                golden: handle(golden),
                outcome,
            },
        );
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LinkLookup for StubLinks {
    fn matched_golden_record(
        &self,
        source: InternalId,
        _entity_type: &EntityType,
    ) -> Result<Option<ExistingLink>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.links.get(&source).cloned())
    }
}

/// A finder returning a fixed list, for aggregator tests.
pub(crate) struct StubFinder {
    strategy: CandidateStrategy,
    output: Vec<MatchedCandidate>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubFinder {
    pub(crate) fn new(strategy: CandidateStrategy, output: &[(u64, MatchTier)]) -> Self {
        let output = output
            .iter()
            .map(|(id, tier)| {
                MatchedCandidate::new(
                    InternalId::new(*id),
                    MatchOutcome::new(*tier, None),
                    strategy,
                )
            })
            .collect();
        Self {
            strategy,
            output,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(strategy: CandidateStrategy) -> Self {
        Self {
            fail: true,
            ..Self::new(strategy, &[])
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CandidateFinder for StubFinder {
    fn strategy(&self) -> CandidateStrategy {
        self.strategy
    }

    fn find_candidates(&self, _record: &BaseRecord) -> MatchResult<Vec<MatchedCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MatchError::lookup(
                crate::error::Collaborator::GoldenRecordLookup,
                "lookup timed out".into(),
            ));
        }
        Ok(self.output.clone())
    }
}
