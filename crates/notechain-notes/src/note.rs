//! Revision notes: the structured payload blob attached to an update commit.
//!
//! A note is a JSON document of tagged records:
//!
//! ```json
//! {
//!   "kind": "human",
//!   "patch_set": 1,
//!   "records": [{ "type": "comment", "key": { ... }, "message": "typo", ... }],
//!   "push_cert": "-----BEGIN PGP SIGNATURE-----..."
//! }
//! ```
//!
//! Human notes carry comments, submit-requirement results and at most one
//! push certificate. Robot notes carry robot comments only.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use notechain_store::{ObjectStore, StoreError};
use notechain_types::{
    Comment, EntityId, ObjectId, PatchSetId, RobotComment, SubmitRequirementResult,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{NotesError, NotesResult};

/// Who produced a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Human,
    Robot,
}

/// One record in a revision note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteRecord {
    Comment(Comment),
    RobotComment(RobotComment),
    SubmitRequirement(SubmitRequirementResult),
}

/// A decoded revision note.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevisionNote {
    pub kind: NoteKind,
    pub patch_set: PatchSetId,
    #[serde(default)]
    pub records: Vec<NoteRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_cert: Option<String>,
}

impl RevisionNote {
    pub fn human(patch_set: PatchSetId) -> Self {
        Self {
            kind: NoteKind::Human,
            patch_set,
            records: Vec::new(),
            push_cert: None,
        }
    }

    pub fn robot(patch_set: PatchSetId) -> Self {
        Self {
            kind: NoteKind::Robot,
            ..Self::human(patch_set)
        }
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> + '_ {
        self.records.iter().filter_map(|r| match r {
            NoteRecord::Comment(c) => Some(c),
            _ => None,
        })
    }

    pub fn robot_comments(&self) -> impl Iterator<Item = &RobotComment> + '_ {
        self.records.iter().filter_map(|r| match r {
            NoteRecord::RobotComment(c) => Some(c),
            _ => None,
        })
    }

    pub fn submit_requirements(&self) -> impl Iterator<Item = &SubmitRequirementResult> + '_ {
        self.records.iter().filter_map(|r| match r {
            NoteRecord::SubmitRequirement(sr) => Some(sr),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.push_cert.is_none()
    }

    /// Check that the records match the note kind.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            NoteKind::Robot => {
                if self.push_cert.is_some() {
                    return Err("robot note carries a push certificate".into());
                }
                if self
                    .records
                    .iter()
                    .any(|r| !matches!(r, NoteRecord::RobotComment(_)))
                {
                    return Err("robot note carries a non-robot record".into());
                }
            }
            NoteKind::Human => {
                if self.robot_comments().next().is_some() {
                    return Err("human note carries a robot comment".into());
                }
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode and validate raw blob bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let note: Self = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        note.validate()?;
        Ok(note)
    }
}

type NoteSlot = Arc<OnceCell<Arc<RevisionNote>>>;

/// Memoizing reader of revision notes, keyed by blob id.
///
/// Each blob is read and decoded at most once while it stays in the memo.
/// Concurrent first reads of the same blob wait on a single decode.
pub struct NoteParser {
    slots: Mutex<LruCache<ObjectId, NoteSlot>>,
    parsed: AtomicU64,
}

impl NoteParser {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            parsed: AtomicU64::new(0),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    /// Number of blobs decoded so far.
    pub fn parsed_count(&self) -> u64 {
        self.parsed.load(Ordering::SeqCst)
    }

    /// Return the decoded note stored in `blob`.
    ///
    /// A blob missing from the store is [`NotesError::MissingObject`]; bytes
    /// that do not decode are [`NotesError::MalformedPayload`].
    pub fn parse<S: ObjectStore + ?Sized>(
        &self,
        repo: &S,
        entity: &EntityId,
        blob: ObjectId,
    ) -> NotesResult<Arc<RevisionNote>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get_or_insert(blob, NoteSlot::default).clone()
        };
        slot.get_or_try_init(|| {
            let bytes = repo
                .read_blob(&blob)
                .map_err(|e| NotesError::from_store(entity, e))?
                .ok_or_else(|| NotesError::MissingObject {
                    entity: entity.clone(),
                    id: blob,
                })?;
            let note = RevisionNote::decode(&bytes).map_err(|reason| {
                NotesError::MalformedPayload {
                    entity: entity.clone(),
                    blob,
                    reason,
                }
            })?;
            self.parsed.fetch_add(1, Ordering::SeqCst);
            trace!(
                %entity,
                blob = %blob.short_hex(),
                records = note.records.len(),
                "parsed revision note"
            );
            Ok(Arc::new(note))
        })
        .cloned()
    }
}

impl std::fmt::Debug for NoteParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteParser")
            .field("parsed", &self.parsed_count())
            .finish()
    }
}
