//! In-memory collaborators.
//!
//! [`InMemoryGoldenStore`] and [`InMemorySimilarityIndex`] back the CLI and end-to-end tests.
//! Both can be loaded from YAML fixtures:
//!
//! ```yaml
//! goldenRecords:
//!   - pid: 1001
//!     resource:
//!       resourceType: Patient
//!       id: g1
//!       identifier:
//!         - system: http://example.org/enterprise-id
//!           value: E-1
//! links:
//!   - source: 55
//!     golden: Patient/g1
//!     tier: SCORED_MATCH
//!     score: 0.93
//! ```
//!
//! A golden record without `pid` is transient. One with `redirected: true`, or carrying the
//! redirect tag, has been merged away and is hidden from EID lookups.

use crate::config::parse_yaml;
use crate::error::CollaboratorError;
use crate::{
    BaseRecord, EntityType, ExistingLink, ExternalIdentifier, GoldenRecordHandle,
    GoldenRecordLookup, InternalId, InternalIdResolver, LinkLookup, MatchError, MatchOutcome,
    MatchResult, MatchTier, NonEmptyText, ScoredHandle, SimilarityIndex,
};
use fhir::ResourceData;
use serde::Deserialize;
use std::collections::HashMap;

/// Errors raised by the in-memory collaborators at lookup time.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{count} active {entity_type} golden records carry EID {eid}")]
    DuplicateEid {
        entity_type: EntityType,
        eid: ExternalIdentifier,
        count: usize,
    },
}

/// A golden record held by [`InMemoryGoldenStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct GoldenRecordEntry {
    pub handle: GoldenRecordHandle,
    /// `None` for transient records.
    pub internal_id: Option<InternalId>,
    pub identifiers: Vec<ExternalIdentifier>,
    pub redirected: bool,
}

/// Golden records and links kept in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGoldenStore {
    entries: Vec<GoldenRecordEntry>,
    by_handle: HashMap<GoldenRecordHandle, usize>,
    links: HashMap<(InternalId, EntityType), ExistingLink>,
}

impl InMemoryGoldenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a golden record, replacing any entry with the same handle.
    pub fn insert(&mut self, entry: GoldenRecordEntry) {
        match self.by_handle.get(&entry.handle) {
            Some(&at) => self.entries[at] = entry,
            None => {
                self.by_handle
                    .insert(entry.handle.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Adds a golden record from a parsed resource.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidRecord`] if the resource has no id or an unusable type.
    pub fn insert_resource(
        &mut self,
        resource: ResourceData,
        internal_id: Option<InternalId>,
    ) -> MatchResult<GoldenRecordHandle> {
        let resource_id = resource
            .id
            .as_deref()
            .map(NonEmptyText::new)
            .transpose()
            .map_err(|e| MatchError::InvalidRecord(format!("golden record id: {e}")))?
            .ok_or_else(|| MatchError::InvalidRecord("golden record has no id".into()))?;
        let redirected = resource.is_redirected();
        if !resource.is_golden_record() {
            tracing::debug!(
                "{} is not tagged as a golden record; storing it anyway",
                resource.qualified_id().unwrap_or_default()
            );
        }

        let record = BaseRecord::from_resource(resource)?;
        let handle = GoldenRecordHandle::new(record.entity_type().clone(), resource_id);
        self.insert(GoldenRecordEntry {
            handle: handle.clone(),
            internal_id,
            identifiers: record.identifiers().to_vec(),
            redirected,
        });
        Ok(handle)
    }

    /// Records that `source` is linked to `link.golden`.
    pub fn link(&mut self, source: InternalId, link: ExistingLink) {
        let entity_type = link.golden.entity_type().clone();
        self.links.insert((source, entity_type), link);
    }

    pub fn entries(&self) -> &[GoldenRecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a store from a YAML fixture.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] naming the failing path when the fixture does not
    /// match its schema, and the resource or reference errors of the entries otherwise.
    pub fn from_fixture(yaml_text: &str) -> MatchResult<Self> {
        let fixture: StoreFixture = parse_yaml(yaml_text, "fixture")?;
        let mut store = Self::new();

        for record in fixture.golden_records {
            let resource = fhir::Resource::from_value(record.resource)?;
            let handle = store.insert_resource(resource, record.pid)?;
            if record.redirected {
                if let Some(&at) = store.by_handle.get(&handle) {
                    store.entries[at].redirected = true;
                }
            }
        }

        for link in fixture.links {
            let golden: GoldenRecordHandle = link.golden.parse()?;
            store.link(
                link.source,
                ExistingLink {
                    golden,
                    outcome: MatchOutcome::new(link.tier, link.score),
                },
            );
        }

        tracing::debug!(
            "loaded {} golden record(s) and {} link(s)",
            store.entries.len(),
            store.links.len()
        );
        Ok(store)
    }
}

impl GoldenRecordLookup for InMemoryGoldenStore {
    fn lookup_by_external_id(
        &self,
        eid: &ExternalIdentifier,
        entity_type: &EntityType,
    ) -> Result<Option<GoldenRecordHandle>, CollaboratorError> {
        let mut matches = self.entries.iter().filter(|entry| {
            !entry.redirected
                && entry.handle.entity_type() == entity_type
                && entry.identifiers.contains(eid)
        });

        let Some(first) = matches.next() else {
            return Ok(None);
        };
        let others = matches.count();
        if others > 0 {
            return Err(Box::new(StoreError::DuplicateEid {
                entity_type: entity_type.clone(),
                eid: eid.clone(),
                count: others + 1,
            }));
        }
        Ok(Some(first.handle.clone()))
    }
}

impl InternalIdResolver for InMemoryGoldenStore {
    fn resolve_internal_id(
        &self,
        handle: &GoldenRecordHandle,
    ) -> Result<Option<InternalId>, CollaboratorError> {
        Ok(self
            .by_handle
            .get(handle)
            .and_then(|&at| self.entries[at].internal_id))
    }
}

impl LinkLookup for InMemoryGoldenStore {
    fn matched_golden_record(
        &self,
        source: InternalId,
        entity_type: &EntityType,
    ) -> Result<Option<ExistingLink>, CollaboratorError> {
        Ok(self.links.get(&(source, entity_type.clone())).cloned())
    }
}

/// Precomputed similarity results, keyed by the base record's resource id.
#[derive(Clone, Debug, Default)]
pub struct InMemorySimilarityIndex {
    results: HashMap<String, Vec<ScoredHandle>>,
}

impl InMemorySimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource_id: impl Into<String>, result: ScoredHandle) {
        self.results
            .entry(resource_id.into())
            .or_default()
            .push(result);
    }

    /// Loads results from a YAML fixture of the form
    /// `scores: { <resource id>: [{ golden: Type/id, confidence: 0.9 }] }`.
    pub fn from_fixture(yaml_text: &str) -> MatchResult<Self> {
        let fixture: ScoresFixture = parse_yaml(yaml_text, "fixture")?;
        let mut index = Self::new();
        for (resource_id, scores) in fixture.scores {
            for score in scores {
                index.insert(
                    resource_id.clone(),
                    ScoredHandle {
                        handle: score.golden.parse()?,
                        confidence: score.confidence,
                    },
                );
            }
        }
        Ok(index)
    }
}

impl SimilarityIndex for InMemorySimilarityIndex {
    fn search(&self, record: &BaseRecord) -> Result<Vec<ScoredHandle>, CollaboratorError> {
        let Some(resource_id) = record.resource_id() else {
            return Ok(Vec::new());
        };
        Ok(self.results.get(resource_id).cloned().unwrap_or_default())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct StoreFixture {
    #[serde(default)]
    golden_records: Vec<GoldenRecordFixture>,
    #[serde(default)]
    links: Vec<LinkFixture>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GoldenRecordFixture {
    #[serde(default)]
    pid: Option<InternalId>,
    #[serde(default)]
    redirected: bool,
    resource: serde_yaml::Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkFixture {
    source: InternalId,
    golden: String,
    tier: MatchTier,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoresFixture {
    #[serde(default)]
    scores: HashMap<String, Vec<ScoreFixture>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoreFixture {
    golden: String,
    confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::CandidateAggregator;
    use crate::config::MatchConfig;
    use crate::finders::{
        CandidateFinder, ExternalIdCandidateFinder, LinkedCandidateFinder, ScoredCandidateFinder,
    };
    use crate::testing::{eid, handle, patient_type};
    use crate::{CandidateStrategy, Collaborator};
    use std::sync::Arc;

    const STORE: &str = r#"goldenRecords:
  - pid: 1001
    resource:
      resourceType: Patient
      id: g1
      meta:
        tag:
          - system: http://hapifhir.io/fhir/NamingSystem/mdm-record-status
            code: GOLDEN_RECORD
      identifier:
        - system: http://example.org/enterprise-id
          value: E-1
  - pid: 1002
    resource:
      resourceType: Patient
      id: g2
      identifier:
        - system: http://example.org/enterprise-id
          value: E-2
  - resource:
      resourceType: Patient
      id: g3
      identifier:
        - system: http://example.org/enterprise-id
          value: E-3
  - pid: 1004
    redirected: true
    resource:
      resourceType: Patient
      id: g4
      identifier:
        - system: http://example.org/enterprise-id
          value: E-1
links:
  - source: 55
    golden: Patient/g2
    tier: SCORED_MATCH
    score: 0.93
"#;

    const RULES: &str = r#"mdmTypes: [Patient]
candidateStrategies: [EXTERNAL_ID, LINK, SCORED]
eidSystems:
  Patient: [http://example.org/enterprise-id]
"#;

    const ENTERPRISE: &str = "http://example.org/enterprise-id";

    #[test]
    fn fixture_loads_transient_and_redirected_records() {
        let store = InMemoryGoldenStore::from_fixture(STORE).expect("fixture should load");
        assert_eq!(store.len(), 4);

        let g3 = &store.entries()[2];
        assert_eq!(g3.internal_id, None);
        assert!(store.entries()[3].redirected);
        assert_eq!(
            store.resolve_internal_id(&handle("g1")).unwrap(),
            Some(InternalId::new(1001))
        );
        assert_eq!(store.resolve_internal_id(&handle("g3")).unwrap(), None);
    }

    #[test]
    fn lookup_skips_redirected_records_and_other_types() {
        let store = InMemoryGoldenStore::from_fixture(STORE).unwrap();

        let found = store
            .lookup_by_external_id(&eid(ENTERPRISE, "E-1"), &patient_type())
            .unwrap();
        assert_eq!(found, Some(handle("g1")));

        let practitioner = EntityType::parse("Practitioner").unwrap();
        assert_eq!(
            store
                .lookup_by_external_id(&eid(ENTERPRISE, "E-1"), &practitioner)
                .unwrap(),
            None
        );
    }

    #[test]
    fn lookup_matches_system_and_value() {
        let store = InMemoryGoldenStore::from_fixture(STORE).unwrap();
        let found = store
            .lookup_by_external_id(&eid("http://other.org/ids", "E-1"), &patient_type())
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn two_active_golden_records_with_one_eid_is_an_error() {
        let mut store = InMemoryGoldenStore::new();
        for (id, pid) in [("a", 1), ("b", 2)] {
            store.insert(GoldenRecordEntry {
                handle: handle(id),
                internal_id: Some(InternalId::new(pid)),
                identifiers: vec![eid(ENTERPRISE, "E-9")],
                redirected: false,
            });
        }

        let err = store
            .lookup_by_external_id(&eid(ENTERPRISE, "E-9"), &patient_type())
            .unwrap_err();
        assert!(err.to_string().contains("2 active Patient golden records"));
    }

    #[test]
    fn fixture_errors_name_the_failing_path() {
        let bad = "goldenRecords:\n  - pid: 1\n    resource: {resourceType: Patient, id: g1}\n    extra: true\n";
        let err = InMemoryGoldenStore::from_fixture(bad).unwrap_err();
        match err {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("goldenRecords[0]"), "{msg}"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }

        let no_id = "goldenRecords:\n  - resource: {resourceType: Patient}\n";
        assert!(matches!(
            InMemoryGoldenStore::from_fixture(no_id),
            Err(MatchError::InvalidRecord(_))
        ));
    }

    #[test]
    fn similarity_index_is_keyed_by_resource_id() {
        let index = InMemorySimilarityIndex::from_fixture(
            "scores:\n  incoming-1:\n    - golden: Patient/g2\n      confidence: 0.7\n",
        )
        .unwrap();

        let keyed = BaseRecord::new(patient_type()).with_resource_id("incoming-1");
        let hits = index.search(&keyed).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].handle, handle("g2"));

        assert!(index.search(&BaseRecord::new(patient_type())).unwrap().is_empty());
    }

    fn aggregator(store: Arc<InMemoryGoldenStore>, index: InMemorySimilarityIndex) -> CandidateAggregator {
        let cfg = Arc::new(MatchConfig::parse_rules(RULES).unwrap());
        let finders: Vec<Arc<dyn CandidateFinder>> = vec![
            Arc::new(ExternalIdCandidateFinder::new(
                cfg.extractor().clone(),
                store.clone(),
                store.clone(),
            )),
            Arc::new(LinkedCandidateFinder::new(store.clone(), store.clone())),
            Arc::new(ScoredCandidateFinder::new(
                Arc::new(index),
                store,
                cfg.thresholds(),
            )),
        ];
        CandidateAggregator::new(cfg, finders).unwrap()
    }

    #[test]
    fn full_pass_over_in_memory_collaborators() {
        let store = Arc::new(InMemoryGoldenStore::from_fixture(STORE).unwrap());
        let mut index = InMemorySimilarityIndex::new();
        index.insert(
            "incoming-1",
            ScoredHandle {
                handle: handle("g1"),
                confidence: 0.95,
            },
        );
        index.insert(
            "incoming-1",
            ScoredHandle {
                handle: handle("g2"),
                confidence: 0.65,
            },
        );

        let record = BaseRecord::new(patient_type())
            .with_resource_id("incoming-1")
            .with_internal_id(InternalId::new(55))
            .with_identifier(eid(ENTERPRISE, "E-1"))
            .with_identifier(eid(ENTERPRISE, "E-3"))
            .with_identifier(eid(ENTERPRISE, "E-404"));

        let out = aggregator(store, index).find_candidates(&record).unwrap();
        let summary: Vec<(u64, MatchTier, CandidateStrategy)> = out
            .iter()
            .map(|c| (c.candidate.get(), c.tier(), c.strategy))
            .collect();

        assert_eq!(
            summary,
            vec![
                (1001, MatchTier::ExternalIdMatch, CandidateStrategy::ExternalId),
                (1002, MatchTier::ScoredMatch, CandidateStrategy::Link),
            ]
        );
        assert_eq!(out[1].outcome.score, Some(0.93));
    }

    #[test]
    fn duplicate_eid_surfaces_as_lookup_failure() {
        let mut store = InMemoryGoldenStore::new();
        for (id, pid) in [("a", 1), ("b", 2)] {
            store.insert(GoldenRecordEntry {
                handle: handle(id),
                internal_id: Some(InternalId::new(pid)),
                identifiers: vec![eid(ENTERPRISE, "E-9")],
                redirected: false,
            });
        }

        let record = BaseRecord::new(patient_type()).with_identifier(eid(ENTERPRISE, "E-9"));
        let err = aggregator(Arc::new(store), InMemorySimilarityIndex::new())
            .find_candidates(&record)
            .unwrap_err();
        assert_eq!(err.collaborator(), Some(Collaborator::GoldenRecordLookup));
    }
}
