use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use notechain_types::ObjectId;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};
use crate::object::{CommitObject, ObjectKind, StoredObject};
use crate::traits::{ObjectStore, RefUpdate};

/// Number of read operations served by an [`InMemoryObjectStore`].
///
/// Tests use these to observe how many chain walks and ref lookups actually
/// reached the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadCounters {
    pub ref_reads: u64,
    pub commit_reads: u64,
    pub blob_reads: u64,
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects live behind a `RwLock`, refs
/// behind a `Mutex` so that compare-and-swap is a single critical section.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
    refs: Mutex<HashMap<String, ObjectId>>,
    ref_reads: AtomicU64,
    commit_reads: AtomicU64,
    blob_reads: AtomicU64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            refs: Mutex::new(HashMap::new()),
            ref_reads: AtomicU64::new(0),
            commit_reads: AtomicU64::new(0),
            blob_reads: AtomicU64::new(0),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Returns `true` if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counters(&self) -> ReadCounters {
        ReadCounters {
            ref_reads: self.ref_reads.load(Ordering::SeqCst),
            commit_reads: self.commit_reads.load(Ordering::SeqCst),
            blob_reads: self.blob_reads.load(Ordering::SeqCst),
        }
    }

    pub fn commit_reads(&self) -> u64 {
        self.commit_reads.load(Ordering::SeqCst)
    }

    pub fn blob_reads(&self) -> u64 {
        self.blob_reads.load(Ordering::SeqCst)
    }

    pub fn ref_reads(&self) -> u64 {
        self.ref_reads.load(Ordering::SeqCst)
    }

    /// Remove an object, as garbage collection would.
    ///
    /// Returns `true` if the object existed. Removing a reachable object
    /// corrupts any chain that references it.
    pub fn remove_object(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut map = self.objects.write().map_err(poisoned)?;
        Ok(map.remove(id).is_some())
    }

    /// Point `name` at `id` unconditionally, without checking that the
    /// target exists. For repair tooling and tests.
    pub fn force_ref(&self, name: &str, id: ObjectId) -> StoreResult<()> {
        let mut refs = self.refs.lock().map_err(poisoned)?;
        refs.insert(name.to_string(), id);
        Ok(())
    }

    /// Return a sorted list of all ref names.
    pub fn ref_names(&self) -> StoreResult<Vec<String>> {
        let refs = self.refs.lock().map_err(poisoned)?;
        let mut names: Vec<String> = refs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read_object(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().map_err(poisoned)?;
        Ok(map.get(id).cloned())
    }

    fn write_object(&self, object: StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let mut map = self.objects.write().map_err(poisoned)?;
        // Idempotent: the same ID always maps to the same content.
        map.entry(id).or_insert_with(|| {
            trace!(id = %id.short_hex(), kind = %object.kind, "stored object");
            object
        });
        Ok(id)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn resolve_ref(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        self.ref_reads.fetch_add(1, Ordering::SeqCst);
        let refs = self.refs.lock().map_err(poisoned)?;
        Ok(refs.get(name).copied())
    }

    fn read_commit(&self, id: &ObjectId) -> StoreResult<Option<CommitObject>> {
        self.commit_reads.fetch_add(1, Ordering::SeqCst);
        match self.read_object(id)? {
            Some(obj) => CommitObject::from_stored_object(&obj).map(Some),
            None => Ok(None),
        }
    }

    fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        self.blob_reads.fetch_add(1, Ordering::SeqCst);
        match self.read_object(id)? {
            Some(obj) if obj.kind == ObjectKind::Blob => Ok(Some(obj.data)),
            Some(obj) => Err(StoreError::CorruptObject {
                id: *id,
                reason: format!("expected blob, got {}", obj.kind),
            }),
            None => Ok(None),
        }
    }

    fn write_commit(&self, commit: &CommitObject) -> StoreResult<ObjectId> {
        self.write_object(commit.to_stored_object()?)
    }

    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.write_object(StoredObject::new(ObjectKind::Blob, data.to_vec()))
    }

    fn update_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> StoreResult<RefUpdate> {
        if new.is_null() {
            return Err(StoreError::NullObjectId(name.to_string()));
        }
        if self.read_object(&new)?.is_none() {
            return Err(StoreError::MissingTarget {
                name: name.to_string(),
                id: new,
            });
        }

        let mut refs = self.refs.lock().map_err(poisoned)?;
        let actual = refs.get(name).copied();
        if actual != expected {
            debug!(%name, ?expected, ?actual, "ref update rejected");
            return Ok(RefUpdate::Conflict { actual });
        }
        refs.insert(name.to_string(), new);
        debug!(%name, new = %new.short_hex(), "ref updated");
        Ok(RefUpdate::Updated)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("counters", &self.counters())
            .finish()
    }
}
