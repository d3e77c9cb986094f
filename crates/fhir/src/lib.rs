//! FHIR wire/boundary support for MDM matching.
//!
//! This crate provides **wire models** and **translation helpers** for resources that are
//! matched against golden records:
//! - YAML resources carrying an `identifier` list and `meta.tag` codings
//!
//! This crate focuses on:
//! - FHIR semantic alignment (without FHIR JSON/REST transport)
//! - deserialisation with path-reporting errors
//! - translation between domain primitives and wire structs
//!
//! It is type-agnostic: any resource type can be read, and fields that matching
//! does not interpret are carried through as opaque values.

pub mod resource;

// Re-export facade
pub use resource::Resource;

// Re-export public domain-level types
pub use resource::{Coding, IdentifierData, ResourceData};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
