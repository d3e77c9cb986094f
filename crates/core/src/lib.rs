//! # MDM Core
//!
//! Candidate matching for master data management.
//!
//! Given a base record, this crate finds the golden records it may belong to:
//! - [`ExternalIdCandidateFinder`] matches on enterprise external identifiers
//! - [`ScoredCandidateFinder`] grades similarity search results against thresholds
//! - [`LinkedCandidateFinder`] returns the golden record the base record is already linked to
//! - [`CandidateAggregator`] runs the configured finders and merges their candidates
//!
//! **No storage concerns**: golden record stores, similarity indexes and id services are reached
//! through the traits in [`collaborators`]. The in-memory implementations in [`memory`] back
//! the CLI and tests.

pub mod aggregator;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod eid;
pub mod error;
pub mod finders;
pub mod memory;
pub mod outcome;
pub mod record;

#[cfg(test)]
mod testing;

pub use mdm_types::{EntityType, InternalId, NonEmptyText, TextError};

pub use aggregator::{merge_candidates, CandidateAggregator};
pub use cache::{CachingGoldenRecordLookup, GoldenRecordChange};
pub use collaborators::{
    ExistingLink, GoldenRecordHandle, GoldenRecordLookup, InternalIdResolver, LinkLookup,
    ScoredHandle, SimilarityIndex,
};
pub use config::{thresholds_from_values, MatchConfig, MatchThresholds, MdmRules};
pub use eid::EidExtractor;
pub use error::{Collaborator, CollaboratorError, MatchError, MatchResult};
pub use finders::{
    CandidateFinder, ExternalIdCandidateFinder, LinkedCandidateFinder, ScoredCandidateFinder,
};
pub use memory::{GoldenRecordEntry, InMemoryGoldenStore, InMemorySimilarityIndex, StoreError};
pub use outcome::{CandidateStrategy, MatchOutcome, MatchTier, MatchedCandidate};
pub use record::{BaseRecord, ExternalIdentifier};
