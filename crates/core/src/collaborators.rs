//! Interfaces to the external collaborators matching depends on.
//!
//! Stores, indexes and id services live outside this crate. Finders only see them through the
//! traits below, which must be safe to call from several matching passes at once.

use crate::error::CollaboratorError;
use crate::{
    BaseRecord, EntityType, ExternalIdentifier, InternalId, MatchError, MatchOutcome, MatchResult,
    NonEmptyText,
};
use std::fmt;
use std::str::FromStr;

/// A loaded golden record, as returned by a lookup or index.
///
/// The core never inspects the record itself; it only hands the handle to the
/// [`InternalIdResolver`] and names it in diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GoldenRecordHandle {
    entity_type: EntityType,
    resource_id: NonEmptyText,
}

impl GoldenRecordHandle {
    pub fn new(entity_type: EntityType, resource_id: NonEmptyText) -> Self {
        Self {
            entity_type,
            resource_id,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }
}

impl FromStr for GoldenRecordHandle {
    type Err = MatchError;

    /// Parses the `Type/id` form produced by `Display`.
    fn from_str(s: &str) -> MatchResult<Self> {
        let invalid = |reason: String| {
            MatchError::InvalidRecord(format!("invalid golden record reference '{s}': {reason}"))
        };
        let (entity_type, resource_id) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected Type/id".into()))?;
        let entity_type = EntityType::parse(entity_type).map_err(|e| invalid(e.to_string()))?;
        let resource_id = NonEmptyText::new(resource_id).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::new(entity_type, resource_id))
    }
}

impl fmt::Display for GoldenRecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.resource_id)
    }
}

/// Finds the golden record currently tagged with an external identifier.
pub trait GoldenRecordLookup: Send + Sync {
    /// Returns `Ok(None)` when no golden record of `entity_type` carries `eid`.
    fn lookup_by_external_id(
        &self,
        eid: &ExternalIdentifier,
        entity_type: &EntityType,
    ) -> Result<Option<GoldenRecordHandle>, CollaboratorError>;
}

/// Translates a loaded golden record into its stable internal id.
pub trait InternalIdResolver: Send + Sync {
    /// Returns `Ok(None)` for transient (not yet persisted) records.
    fn resolve_internal_id(
        &self,
        handle: &GoldenRecordHandle,
    ) -> Result<Option<InternalId>, CollaboratorError>;
}

/// A golden record returned by a similarity search.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredHandle {
    pub handle: GoldenRecordHandle,
    /// Normalised similarity, higher is more similar.
    pub confidence: f64,
}

/// Searchable index of golden records for field-similarity matching.
pub trait SimilarityIndex: Send + Sync {
    /// Returns golden records similar to `record`, best first.
    fn search(&self, record: &BaseRecord) -> Result<Vec<ScoredHandle>, CollaboratorError>;
}

/// An existing link between a source record and a golden record.
#[derive(Clone, Debug, PartialEq)]
pub struct ExistingLink {
    pub golden: GoldenRecordHandle,
    /// Outcome recorded when the link was written.
    pub outcome: MatchOutcome,
}

/// Reads links written by the linking workflow.
pub trait LinkLookup: Send + Sync {
    /// Returns the golden record `source` is currently matched to, if any.
    fn matched_golden_record(
        &self,
        source: InternalId,
        entity_type: &EntityType,
    ) -> Result<Option<ExistingLink>, CollaboratorError>;
}
