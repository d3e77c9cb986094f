//! Cached external-identifier lookups.
//!
//! Wrapping a [`GoldenRecordLookup`] in [`CachingGoldenRecordLookup`] lets repeated matching
//! passes skip the store. Entries stay valid until the owner reports a golden-record change
//! through [`CachingGoldenRecordLookup::invalidate`]; there is no time-based expiry.

use crate::error::CollaboratorError;
use crate::{EntityType, ExternalIdentifier, GoldenRecordHandle, GoldenRecordLookup};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// A change to the golden records of one entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GoldenRecordChange {
    /// A golden record was created, so a previously absent EID may now resolve.
    Created { entity_type: EntityType },
    /// Golden records were merged, so an EID may now resolve to a different record.
    Merged { entity_type: EntityType },
}

impl GoldenRecordChange {
    pub fn entity_type(&self) -> &EntityType {
        match self {
            GoldenRecordChange::Created { entity_type }
            | GoldenRecordChange::Merged { entity_type } => entity_type,
        }
    }
}

type CacheKey = (EntityType, ExternalIdentifier);

/// Identifies the state of one entity type's entries. A lookup only stores its result if the
/// generation it started under is still current.
type Generation = (u64, u64);

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Option<GoldenRecordHandle>>,
    // Bumped by `invalidate`, per entity type.
    generations: HashMap<EntityType, u64>,
    // Bumped by `clear`.
    epoch: u64,
}

impl CacheState {
    fn generation(&self, entity_type: &EntityType) -> Generation {
        (
            self.epoch,
            self.generations.get(entity_type).copied().unwrap_or(0),
        )
    }
}

/// Memoizes lookups of an inner [`GoldenRecordLookup`].
///
/// Both hits and misses are cached. Errors are not: the next call goes to the store again.
/// A lookup that was in flight while its entity type was invalidated returns its result but
/// does not cache it.
pub struct CachingGoldenRecordLookup<L> {
    inner: L,
    state: RwLock<CacheState>,
}

impl<L: GoldenRecordLookup> CachingGoldenRecordLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Drops every cached entry for the entity type named by `change`.
    pub fn invalidate(&self, change: &GoldenRecordChange) {
        let entity_type = change.entity_type();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.generations.entry(entity_type.clone()).or_insert(0) += 1;
        let before = state.entries.len();
        state
            .entries
            .retain(|(cached_type, _), _| cached_type != entity_type);
        tracing::debug!(
            "invalidated {} cached EID lookup(s) for {}",
            before - state.entries.len(),
            entity_type
        );
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.epoch += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: GoldenRecordLookup> GoldenRecordLookup for CachingGoldenRecordLookup<L> {
    fn lookup_by_external_id(
        &self,
        eid: &ExternalIdentifier,
        entity_type: &EntityType,
    ) -> Result<Option<GoldenRecordHandle>, CollaboratorError> {
        let key = (entity_type.clone(), eid.clone());
        let started_under = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = state.entries.get(&key) {
                return Ok(cached.clone());
            }
            state.generation(entity_type)
        };

        let found = self.inner.lookup_by_external_id(eid, entity_type)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation(entity_type) == started_under {
            state.entries.insert(key, found.clone());
        } else {
            tracing::debug!(
                "not caching lookup of {} for {}: invalidated while in flight",
                eid,
                entity_type
            );
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eid, handle, patient_type, StubLookup};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    /// Answers from a mutable slot. The first call pauses after reading it until released.
    struct PausingLookup {
        golden: Mutex<Option<GoldenRecordHandle>>,
        pause_next: AtomicBool,
        read_done: Barrier,
        release: Barrier,
    }

    impl PausingLookup {
        fn new() -> Self {
            Self {
                golden: Mutex::new(None),
                pause_next: AtomicBool::new(true),
                read_done: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl GoldenRecordLookup for PausingLookup {
        fn lookup_by_external_id(
            &self,
            _eid: &ExternalIdentifier,
            _entity_type: &EntityType,
        ) -> Result<Option<GoldenRecordHandle>, CollaboratorError> {
            let found = self.golden.lock().unwrap().clone();
            if self.pause_next.swap(false, Ordering::SeqCst) {
                self.read_done.wait();
                self.release.wait();
            }
            Ok(found)
        }
    }

    /// Runs `change` while a miss for `sys:mrn|1` is in flight, then looks the EID up again.
    fn lookup_after_change_during_miss(
        change: impl FnOnce(&CachingGoldenRecordLookup<PausingLookup>),
    ) -> Option<GoldenRecordHandle> {
        let cache = CachingGoldenRecordLookup::new(PausingLookup::new());
        let patient = patient_type();
        let mrn = eid("sys:mrn", "1");

        thread::scope(|s| {
            let pending = s.spawn(|| cache.lookup_by_external_id(&mrn, &patient));

            cache.inner().read_done.wait();
            *cache.inner().golden.lock().unwrap() = Some(handle("g1"));
            change(&cache);
            cache.inner().release.wait();

            let stale = pending.join().unwrap().unwrap();
            assert_eq!(stale, None);
        });

        assert!(cache.is_empty(), "in-flight miss must not be cached");
        cache.lookup_by_external_id(&mrn, &patient).unwrap()
    }

    #[test]
    fn miss_in_flight_during_invalidation_is_not_cached() {
        let found = lookup_after_change_during_miss(|cache| {
            cache.invalidate(&GoldenRecordChange::Created {
                entity_type: patient_type(),
            })
        });
        assert_eq!(found, Some(handle("g1")));
    }

    #[test]
    fn miss_in_flight_during_clear_is_not_cached() {
        let found = lookup_after_change_during_miss(|cache| cache.clear());
        assert_eq!(found, Some(handle("g1")));
    }

    #[test]
    fn invalidating_another_type_keeps_in_flight_result() {
        let cache = CachingGoldenRecordLookup::new(PausingLookup::new());
        let patient = patient_type();
        let mrn = eid("sys:mrn", "1");

        thread::scope(|s| {
            let pending = s.spawn(|| cache.lookup_by_external_id(&mrn, &patient));
            cache.inner().read_done.wait();
            cache.invalidate(&GoldenRecordChange::Merged {
                entity_type: EntityType::parse("Practitioner").unwrap(),
            });
            cache.inner().release.wait();
            pending.join().unwrap().unwrap();
        });

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hits_and_misses_are_served_from_cache() {
        let cache = CachingGoldenRecordLookup::new(StubLookup::default().with("sys:mrn", "1", "g1"));
        let patient = patient_type();

        for _ in 0..3 {
            let hit = cache
                .lookup_by_external_id(&eid("sys:mrn", "1"), &patient)
                .unwrap();
            assert_eq!(hit, Some(handle("g1")));
            let miss = cache
                .lookup_by_external_id(&eid("sys:mrn", "2"), &patient)
                .unwrap();
            assert_eq!(miss, None);
        }

        assert_eq!(cache.inner().calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache =
            CachingGoldenRecordLookup::new(StubLookup::default().failing_on("sys:mrn", "1"));
        let patient = patient_type();

        assert!(cache
            .lookup_by_external_id(&eid("sys:mrn", "1"), &patient)
            .is_err());
        assert!(cache
            .lookup_by_external_id(&eid("sys:mrn", "1"), &patient)
            .is_err());

        assert_eq!(cache.inner().calls(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidation_only_drops_the_changed_entity_type() {
        let cache = CachingGoldenRecordLookup::new(StubLookup::default().with("sys:mrn", "1", "g1"));
        let patient = patient_type();
        let practitioner = EntityType::parse("Practitioner").unwrap();

        cache
            .lookup_by_external_id(&eid("sys:mrn", "1"), &patient)
            .unwrap();
        cache
            .lookup_by_external_id(&eid("sys:npi", "9"), &practitioner)
            .unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate(&GoldenRecordChange::Merged {
            entity_type: patient.clone(),
        });
        assert_eq!(cache.len(), 1);

        cache
            .lookup_by_external_id(&eid("sys:mrn", "1"), &patient)
            .unwrap();
        assert_eq!(cache.inner().calls(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }
}
