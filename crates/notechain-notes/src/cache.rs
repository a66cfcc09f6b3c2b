//! Materialized change states keyed by chain tip.
//!
//! The key embeds the tip commit id, so an entry can never go stale: a new
//! update produces a new tip and therefore a new key. Eviction only costs a
//! later re-walk.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use notechain_types::{ChangeId, ChangeState, EntityId, ObjectId, ProjectName};
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::NotesResult;

/// `(project, change, tip)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateCacheKey {
    pub project: ProjectName,
    pub change: ChangeId,
    pub tip: ObjectId,
}

impl StateCacheKey {
    pub fn new(entity: &EntityId, tip: ObjectId) -> Self {
        Self {
            project: entity.project.clone(),
            change: entity.change,
            tip,
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of times the loader actually ran.
    pub loads: u64,
    /// Entries currently held.
    pub len: usize,
}

type InFlight = Arc<OnceCell<Arc<ChangeState>>>;

/// Bounded, concurrent cache of change states.
///
/// Concurrent [`StateCache::get_or_load`] calls for one key run the loader
/// once; calls for different keys never wait on each other's loaders.
pub struct StateCache {
    entries: Mutex<LruCache<StateCacheKey, Arc<ChangeState>>>,
    in_flight: Mutex<HashMap<StateCacheKey, InFlight>>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

impl StateCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(&self, key: &StateCacheKey) -> Option<Arc<ChangeState>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: StateCacheKey, state: Arc<ChangeState>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, state);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            loads: self.loads.load(Ordering::SeqCst),
            len: self.len(),
        }
    }

    /// Return the cached state for `key`, running `load` on a miss.
    ///
    /// Callers that miss while another caller is loading the same key wait
    /// for that load and share its result. A failed load is not cached.
    pub fn get_or_load<F>(&self, key: StateCacheKey, load: F) -> NotesResult<Arc<ChangeState>>
    where
        F: FnOnce() -> NotesResult<ChangeState>,
    {
        if let Some(state) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            trace!(
                project = %key.project,
                change = %key.change,
                tip = %key.tip.short_hex(),
                "state cache hit"
            );
            return Ok(state);
        }
        self.misses.fetch_add(1, Ordering::SeqCst);

        let slot = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();

        let result = slot
            .get_or_try_init(|| {
                // Another caller may have finished between our miss and
                // joining the slot.
                if let Some(state) = self.get(&key) {
                    return Ok(state);
                }
                self.loads.fetch_add(1, Ordering::SeqCst);
                debug!(
                    project = %key.project,
                    change = %key.change,
                    tip = %key.tip.short_hex(),
                    "state cache miss, loading"
                );
                let state = Arc::new(load()?);
                self.put(key.clone(), Arc::clone(&state));
                Ok(state)
            })
            .cloned();

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            in_flight.remove(&key);
        }
        result
    }
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("stats", &self.stats())
            .finish()
    }
}
