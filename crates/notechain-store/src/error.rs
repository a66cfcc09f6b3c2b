use notechain_types::ObjectId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The object data is malformed or has the wrong kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Attempted to point a ref at the null object ID.
    #[error("cannot point ref {0} at the null object")]
    NullObjectId(String),

    /// The ref update names an object that is not in the store.
    #[error("ref {name} cannot point at missing object {id}")]
    MissingTarget { name: String, id: ObjectId },

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
