//! External identifier (EID) extraction.
//!
//! Only identifiers issued by a configured enterprise EID system count as identity assertions
//! for matching. Every other identifier on the record (local MRNs, insurance numbers, ...) is
//! ignored by the exact-identifier strategy.

use crate::constants::ANY_ENTITY_TYPE;
use crate::{BaseRecord, EntityType, ExternalIdentifier, MatchError, MatchResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Extracts the recognized external identifiers from a base record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EidExtractor {
    // Keyed by entity type name, or `*` for systems recognized on every type.
    systems: BTreeMap<String, BTreeSet<String>>,
}

impl EidExtractor {
    /// Builds an extractor from an `entity type -> systems` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidConfig`] if a key is neither `*` nor a valid entity type, or
    /// if a system URI is blank.
    pub fn new(eid_systems: BTreeMap<String, Vec<String>>) -> MatchResult<Self> {
        let mut systems = BTreeMap::new();

        for (entity_type, uris) in eid_systems {
            let key = entity_type.trim().to_string();
            if key != ANY_ENTITY_TYPE {
                EntityType::parse(&key).map_err(|e| {
                    MatchError::InvalidConfig(format!("eidSystems key '{entity_type}': {e}"))
                })?;
            }

            let mut set = BTreeSet::new();
            for uri in uris {
                let uri = uri.trim();
                if uri.is_empty() {
                    return Err(MatchError::InvalidConfig(format!(
                        "eidSystems for '{key}' contains a blank system"
                    )));
                }
                set.insert(uri.to_string());
            }
            systems.entry(key).or_insert_with(BTreeSet::new).extend(set);
        }

        Ok(Self { systems })
    }

    /// Returns true if `system` is an enterprise EID system for `entity_type`.
    pub fn is_recognized(&self, entity_type: &EntityType, system: &str) -> bool {
        [entity_type.as_str(), ANY_ENTITY_TYPE]
            .iter()
            .filter_map(|key| self.systems.get(*key))
            .any(|set| set.contains(system))
    }

    /// Returns true if no system is configured for any entity type.
    pub fn is_empty(&self) -> bool {
        self.systems.values().all(BTreeSet::is_empty)
    }

    /// Returns the recognized identifiers of `record`, in record order.
    ///
    /// Exact repeats of an identifier are reported once, at their first position.
    pub fn extract(&self, record: &BaseRecord) -> Vec<ExternalIdentifier> {
        let mut seen = HashSet::new();
        record
            .identifiers()
            .iter()
            .filter(|eid| self.is_recognized(record.entity_type(), eid.system()))
            .filter(|eid| seen.insert(*eid))
            .cloned()
            .collect()
    }
}
