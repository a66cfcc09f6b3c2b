//! Change notes: the metadata of a code-review change stored as a chain of
//! update commits on one meta ref per change.
//!
//! This crate provides:
//! - The footer vocabulary of update commits and the revision note payload
//! - `NotesLoader`, which walks a chain into a `ChangeState` and caches it
//!   by `(project, change, tip)`
//! - `RefScope`, a per-unit-of-work memo of ref lookups
//! - `UpdateManager`, which appends updates with compare-and-swap, bounded
//!   retry and the update-count ceiling
//! - `ChainRewriter`, which redacts comments and change messages by
//!   rebuilding the chain
//! - `NotesConfig`, loaded from TOML and `NOTECHAIN_*` environment variables

pub mod cache;
pub mod config;
pub mod error;
pub mod footer;
pub mod guard;
pub mod loader;
pub mod note;
pub mod parser;
pub mod ref_cache;
pub mod rewrite;
pub mod update;

pub use cache::{CacheStats, StateCache, StateCacheKey};
pub use config::{ConfigError, NotesConfig};
pub use error::{NotesError, NotesResult};
pub use footer::{FooterError, LabelFooter, MessageParts, UpdateFields};
pub use guard::UpdateGuard;
pub use loader::NotesLoader;
pub use note::{NoteKind, NoteParser, NoteRecord, RevisionNote};
pub use parser::{parse_chain, read_chain, ChainCommit, StateBuilder};
pub use ref_cache::{RefResolver, RefScope};
pub use rewrite::{
    ChainRewriter, CommitEdit, CommitRewrite, DeleteChangeMessageRewrite, DeleteCommentRewrite,
    RewriteOutcome,
};
pub use update::{ChangeUpdate, UpdateManager, UpdateOutcome};
