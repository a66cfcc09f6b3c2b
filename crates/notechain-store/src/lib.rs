//! Object store adapter for notechain.
//!
//! notechain does not implement a version-control system. It needs a narrow
//! slice of one: immutable commits and blobs addressed by content, and named
//! refs that can be moved atomically. This crate defines that slice as the
//! [`ObjectStore`] trait and provides [`InMemoryObjectStore`] for tests and
//! embedding.
//!
//! # Object Types
//!
//! - blobs -- opaque payload bytes (revision notes)
//! - [`CommitObject`] -- one step of an update chain: parent, author,
//!   timestamp, message with footers, and an optional payload blob
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write objects first, then move the ref with
//!    [`ObjectStore::update_ref`], which only succeeds if the ref still has
//!    the expected old value.
//! 3. The store never interprets commit messages or blob contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use memory::{InMemoryObjectStore, ReadCounters};
pub use object::{CommitObject, ObjectKind, StoredObject};
pub use traits::{ObjectStore, RefUpdate};
