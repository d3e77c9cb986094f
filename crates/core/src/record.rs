//! Base records and external identifiers.

use crate::{EntityType, InternalId, MatchError, MatchResult, NonEmptyText};
use fhir::ResourceData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An identity assertion `(system, value)` from an external system of record.
///
/// Equality and hashing are structural over both parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalIdentifier {
    system: NonEmptyText,
    value: NonEmptyText,
}

impl ExternalIdentifier {
    /// # Errors
    ///
    /// Returns [`mdm_types::TextError::Empty`] if either part is blank.
    pub fn new(
        system: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, mdm_types::TextError> {
        Ok(Self {
            system: NonEmptyText::new(system)?,
            value: NonEmptyText::new(value)?,
        })
    }

    pub fn system(&self) -> &str {
        self.system.as_str()
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }
}

impl fmt::Display for ExternalIdentifier {
    /// FHIR token form: `system|value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.value)
    }
}

/// An incoming record evaluated for linkage to a golden record.
///
/// Immutable for the duration of a matching pass; the core only borrows it.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseRecord {
    entity_type: EntityType,
    resource_id: Option<String>,
    internal_id: Option<InternalId>,
    identifiers: Vec<ExternalIdentifier>,
    fields: BTreeMap<String, serde_json::Value>,
}

impl BaseRecord {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            resource_id: None,
            internal_id: None,
            identifiers: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Builds a base record from a parsed resource.
    ///
    /// Identifiers lacking a system or a value carry no identity assertion and are dropped here;
    /// the rest keep their order on the resource.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidRecord`] if the resource type is blank or malformed.
    pub fn from_resource(resource: ResourceData) -> MatchResult<Self> {
        let entity_type = EntityType::parse(&resource.resource_type).map_err(|e| {
            MatchError::InvalidRecord(format!("resource has no usable entity type: {e}"))
        })?;

        let identifiers = resource
            .identifiers
            .iter()
            .filter_map(|i| match (i.system.as_deref(), i.value.as_deref()) {
                (Some(system), Some(value)) => ExternalIdentifier::new(system, value).ok(),
                _ => None,
            })
            .collect();

        Ok(Self {
            entity_type,
            resource_id: resource.id,
            internal_id: None,
            identifiers,
            fields: resource.fields,
        })
    }

    /// Parses a YAML resource and builds a base record from it.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Fhir`] for malformed YAML and [`MatchError::InvalidRecord`] for an
    /// unusable resource type.
    pub fn parse(yaml_text: &str) -> MatchResult<Self> {
        let resource = fhir::Resource::parse(yaml_text)?;
        Self::from_resource(resource)
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the internal id the base record itself was persisted under.
    pub fn with_internal_id(mut self, internal_id: InternalId) -> Self {
        self.internal_id = Some(internal_id);
        self
    }

    pub fn with_identifier(mut self, identifier: ExternalIdentifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn internal_id(&self) -> Option<InternalId> {
        self.internal_id
    }

    /// All well-formed identifiers on the record, in record order.
    pub fn identifiers(&self) -> &[ExternalIdentifier] {
        &self.identifiers
    }

    /// Domain fields, opaque to the core.
    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }
}

impl TryFrom<ResourceData> for BaseRecord {
    type Error = MatchError;

    fn try_from(resource: ResourceData) -> Result<Self, Self::Error> {
        BaseRecord::from_resource(resource)
    }
}
