use notechain_types::{AccountId, ObjectId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Opaque payload bytes.
    Blob,
    /// Serialized [`CommitObject`].
    Commit,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// A stored object: kind tag + serialized data.
///
/// `StoredObject` is the unit of storage. The store never interprets the
/// contents of the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        ContentHasher::for_kind(self.kind).hash(&self.data)
    }
}

// ---------------------------------------------------------------------------
// CommitObject
// ---------------------------------------------------------------------------

/// One step of an update chain.
///
/// The structured fields of an update live as `Key: value` footer lines at
/// the end of `message`; the store treats the message as opaque text. Every
/// commit has at most one parent, so a chain is a simple list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    /// Previous commit in the chain; `None` for the root.
    pub parent: Option<ObjectId>,
    pub author: AccountId,
    pub timestamp: Timestamp,
    pub message: String,
    /// Revision note blob attached to this update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ObjectId>,
}

impl CommitObject {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Convert into a `StoredObject` for storage.
    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Commit, data))
    }

    /// Decode from a `StoredObject`.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Commit {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected commit, got {}", obj.kind),
            });
        }
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: obj.compute_id(),
            reason: e.to_string(),
        })
    }
}
