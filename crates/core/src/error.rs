use std::fmt;

/// Error raised by an external collaborator (lookup, id resolution, index search).
///
/// Collaborators are implemented outside this crate, so their errors are carried opaquely.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The external collaborator a [`MatchError::LookupFailure`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collaborator {
    GoldenRecordLookup,
    InternalIdResolver,
    SimilarityIndex,
    LinkLookup,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::GoldenRecordLookup => "golden record lookup",
            Collaborator::InternalIdResolver => "internal id resolver",
            Collaborator::SimilarityIndex => "similarity index",
            Collaborator::LinkLookup => "link lookup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("{collaborator} failed: {source}")]
    LookupFailure {
        collaborator: Collaborator,
        #[source]
        source: CollaboratorError,
    },
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
}

impl MatchError {
    pub fn lookup(collaborator: Collaborator, source: CollaboratorError) -> Self {
        MatchError::LookupFailure {
            collaborator,
            source,
        }
    }

    /// Returns the failing collaborator for lookup failures.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            MatchError::LookupFailure { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}

pub type MatchResult<T> = std::result::Result<T, MatchError>;
