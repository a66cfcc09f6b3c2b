use notechain_types::ObjectId;

use crate::error::StoreResult;
use crate::object::CommitObject;

/// Outcome of a compare-and-swap ref update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefUpdate {
    /// The ref now points at the new value.
    Updated,
    /// The ref did not hold the expected old value; nothing was changed.
    Conflict {
        /// What the ref actually pointed at (`None` if absent).
        actual: Option<ObjectId>,
    },
}

impl RefUpdate {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

/// The object store consumed by notechain: one repository.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same content always produces
///   the same ID.
/// - Concurrent reads are always safe.
/// - `update_ref` is atomic: it either moves the ref from exactly
///   `expected` to `new`, or changes nothing and reports a conflict.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Resolve a ref name to the commit it points at.
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn resolve_ref(&self, name: &str) -> StoreResult<Option<ObjectId>>;

    /// Read a commit by ID.
    ///
    /// Returns `Ok(None)` if no object with this ID exists.
    fn read_commit(&self, id: &ObjectId) -> StoreResult<Option<CommitObject>>;

    /// Read a blob's raw bytes by ID.
    ///
    /// Returns `Ok(None)` if no object with this ID exists.
    fn read_blob(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>>;

    /// Write a commit and return its content-addressed ID. Idempotent.
    fn write_commit(&self, commit: &CommitObject) -> StoreResult<ObjectId>;

    /// Write a blob and return its content-addressed ID. Idempotent.
    fn write_blob(&self, data: &[u8]) -> StoreResult<ObjectId>;

    /// Atomically move `name` from `expected` to `new`.
    ///
    /// `expected = None` means the ref must not exist yet.
    fn update_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> StoreResult<RefUpdate>;
}
