use notechain_store::StoreError;
use notechain_types::{EntityId, ObjectId};

/// Errors produced while loading, updating, or rewriting change notes.
///
/// The variants fall into four classes:
/// - **not found**: [`NotesError::NotFound`] -- the change has no chain yet;
/// - **corrupt**: [`NotesError::MissingObject`], [`NotesError::CorruptObject`],
///   [`NotesError::MalformedPayload`], [`NotesError::InvalidFooter`] --
///   never retried, never defaulted;
/// - **conflict**: [`NotesError::Conflict`] -- a concurrent writer moved the
///   ref; reload and retry;
/// - **limit**: [`NotesError::LimitExceeded`] -- permanent rejection of a
///   non-terminal update.
#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    #[error("change {entity} has no meta ref")]
    NotFound { entity: EntityId },

    #[error("change {entity}: missing object {id} in update chain")]
    MissingObject { entity: EntityId, id: ObjectId },

    #[error("change {entity}: corrupt object {id}: {reason}")]
    CorruptObject {
        entity: EntityId,
        id: ObjectId,
        reason: String,
    },

    #[error("change {entity}: malformed revision note {blob}: {reason}")]
    MalformedPayload {
        entity: EntityId,
        blob: ObjectId,
        reason: String,
    },

    #[error("change {entity}: invalid footer in commit {commit}: {reason}")]
    InvalidFooter {
        entity: EntityId,
        commit: ObjectId,
        reason: String,
    },

    #[error(
        "change {entity}: meta ref moved concurrently (expected {expected:?}, found {actual:?})"
    )]
    Conflict {
        entity: EntityId,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error(
        "Change {entity} may not exceed {max_updates} updates. It may still be abandoned or \
         submitted. To continue working on this change, recreate it with a new Change-Id, \
         then abandon this one."
    )]
    LimitExceeded { entity: EntityId, max_updates: usize },

    #[error("change {entity}: invalid update: {reason}")]
    InvalidUpdate { entity: EntityId, reason: String },

    #[error("change {entity}: nothing in the chain matches {target}")]
    RewriteTargetNotFound { entity: EntityId, target: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl NotesError {
    /// The change this error concerns, when known.
    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            Self::NotFound { entity }
            | Self::MissingObject { entity, .. }
            | Self::CorruptObject { entity, .. }
            | Self::MalformedPayload { entity, .. }
            | Self::InvalidFooter { entity, .. }
            | Self::Conflict { entity, .. }
            | Self::LimitExceeded { entity, .. }
            | Self::InvalidUpdate { entity, .. }
            | Self::RewriteTargetNotFound { entity, .. } => Some(entity),
            Self::Store(_) => None,
        }
    }

    /// Corruption is always surfaced and never retried.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::MissingObject { .. }
                | Self::CorruptObject { .. }
                | Self::MalformedPayload { .. }
                | Self::InvalidFooter { .. }
        )
    }

    /// Attach `entity` to a store failure met while reading its chain.
    ///
    /// An object of the wrong kind or with undecodable bytes is corruption of
    /// that change's notes; anything else stays a store error.
    pub fn from_store(entity: &EntityId, err: StoreError) -> Self {
        match err {
            StoreError::CorruptObject { id, reason } => Self::CorruptObject {
                entity: entity.clone(),
                id,
                reason,
            },
            other => Self::Store(other),
        }
    }

    /// Only ref-update conflicts are worth retrying after a reload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for change notes operations.
pub type NotesResult<T> = Result<T, NotesError>;
