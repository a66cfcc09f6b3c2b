//! Foundation types for notechain.
//!
//! notechain stores the evolving metadata of a code-review change as a chain
//! of commits on one reference per change. This crate holds the identifiers
//! and records shared by every other notechain crate.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`EntityId`]: A change within a project, and the name of its meta ref
//! - [`Timestamp`]: Millisecond wall-clock time recorded on each update
//! - [`ChangeStatus`], [`Vote`], [`VoteKey`]: Status and label votes
//! - [`ReviewerState`]: An account's reviewer or CC role
//! - [`Comment`], [`RobotComment`], [`SubmitRequirementResult`]: Payload records
//! - [`ChangeState`]: The materialized snapshot of a chain at one tip

pub mod change;
pub mod comment;
pub mod entity;
pub mod error;
pub mod object;
pub mod state;
pub mod timestamp;

pub use change::{
    AccountId, ChangeMessage, ChangeStatus, PatchSetId, ReviewerState, Vote, VoteKey,
};
pub use comment::{
    Comment, CommentKey, RobotComment, SubmitRequirementResult, SubmitRequirementStatus,
};
pub use entity::{ChangeId, EntityId, ProjectName};
pub use error::TypeError;
pub use object::ObjectId;
pub use state::ChangeState;
pub use timestamp::Timestamp;
