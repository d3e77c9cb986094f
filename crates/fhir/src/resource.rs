//! FHIR-aligned resource wire models for records taking part in matching.
//!
//! MDM only needs a thin, type-agnostic view of a resource:
//! - the resource type and logical id
//! - the `identifier` list (external identity assertions)
//! - `meta.tag` codings, used to mark golden records and redirected (merged-away) golden records
//! - everything else, kept as opaque fields for scoring collaborators
//!
//! Notes:
//! - Identifier and meta objects carry other FHIR keys (`use`, `period`, `lastUpdated`, ...)
//!   that matching does not read; they are ignored rather than modelled

use crate::{FhirError, FhirResult};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Tag system marking MDM-managed records.
pub const MDM_RECORD_STATUS_SYSTEM: &str = "http://hapifhir.io/fhir/NamingSystem/mdm-record-status";

/// Tag code carried by golden records.
pub const GOLDEN_RECORD_CODE: &str = "GOLDEN_RECORD";

/// Tag system marking golden records merged into another golden record.
pub const GOLDEN_RECORD_REDIRECT_SYSTEM: &str =
    "http://hapifhir.io/fhir/NamingSystem/mdm-golden-record-status";

/// Tag code carried by redirected golden records.
pub const REDIRECT_CODE: &str = "REDIRECT";

// ============================================================================
// Public domain-level types
// ============================================================================

/// An identifier as carried on a resource.
///
/// FHIR allows both `system` and `value` to be absent; consumers decide what a usable
/// identifier is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierData {
    pub system: Option<String>,
    pub value: Option<String>,
}

/// A `meta.tag` coding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
}

impl Coding {
    fn is(&self, system: &str, code: &str) -> bool {
        self.system.as_deref() == Some(system) && self.code.as_deref() == Some(code)
    }
}

/// Domain-level carrier for a resource taking part in matching.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceData {
    /// FHIR resource type, e.g. `Patient`. Not validated here.
    pub resource_type: String,

    /// Logical id of the resource, if assigned.
    pub id: Option<String>,

    /// Identifiers in the order they appear on the resource.
    pub identifiers: Vec<IdentifierData>,

    /// `meta.tag` codings.
    pub tags: Vec<Coding>,

    /// All other top-level fields, untouched.
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ResourceData {
    /// Returns true if the resource is tagged as an MDM golden record.
    pub fn is_golden_record(&self) -> bool {
        self.tags
            .iter()
            .any(|t| t.is(MDM_RECORD_STATUS_SYSTEM, GOLDEN_RECORD_CODE))
    }

    /// Returns true if the resource is a golden record that has been merged into another.
    pub fn is_redirected(&self) -> bool {
        self.tags
            .iter()
            .any(|t| t.is(GOLDEN_RECORD_REDIRECT_SYSTEM, REDIRECT_CODE))
    }

    /// Returns `ResourceType/id`, or `None` when the resource has no id.
    pub fn qualified_id(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("{}/{}", self.resource_type, id))
    }
}

// ============================================================================
// Public Resource operations
// ============================================================================

/// Resource operations.
///
/// This is a zero-sized type used for namespacing resource-related operations.
pub struct Resource;

impl Resource {
    /// Parse a resource from YAML text.
    ///
    /// Uses `serde_path_to_error` to report the path of the failing field (e.g.
    /// `identifier[0].system`).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if the YAML does not match the wire schema.
    pub fn parse(yaml_text: &str) -> FhirResult<ResourceData> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        Ok(deserialize_wire(deserializer)?.into())
    }

    /// Translate an already-parsed YAML value (for example an entry of a fixture list).
    ///
    /// # Errors
    ///
    /// Same as [`Resource::parse`].
    pub fn from_value(value: serde_yaml::Value) -> FhirResult<ResourceData> {
        Ok(deserialize_wire(value)?.into())
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResourceWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    meta: Option<MetaWire>,

    #[serde(default)]
    identifier: Vec<IdentifierWire>,

    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MetaWire {
    #[serde(default)]
    tag: Vec<CodingWire>,
}

#[derive(Debug, Deserialize)]
struct CodingWire {
    #[serde(default)]
    system: Option<String>,

    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifierWire {
    #[serde(default)]
    system: Option<String>,

    #[serde(default)]
    value: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn deserialize_wire<'de, D>(deserializer: D) -> FhirResult<ResourceWire>
where
    D: serde::Deserializer<'de>,
{
    serde_path_to_error::deserialize::<_, ResourceWire>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() {
            "<root>".to_string()
        } else {
            path
        };
        FhirError::Translation(format!("Resource schema mismatch at {path}: {source}"))
    })
}

impl From<ResourceWire> for ResourceData {
    fn from(wire: ResourceWire) -> Self {
        let identifiers = wire
            .identifier
            .into_iter()
            .map(|i| IdentifierData {
                system: i.system,
                value: i.value,
            })
            .collect();

        let tags = wire
            .meta
            .map(|meta| meta.tag)
            .unwrap_or_default()
            .into_iter()
            .map(|t| Coding {
                system: t.system,
                code: t.code,
            })
            .collect();

        ResourceData {
            resource_type: wire.resource_type,
            id: wire.id,
            identifiers,
            tags,
            fields: wire.fields,
        }
    }
}
