//! Structural diff between two materialized change states.
//!
//! The differ is a pure function over two [`ChangeState`] values. It reads
//! no chain and performs no I/O, so callers can diff a cached "before" state
//! against a freshly loaded "after" state to decide whom to notify.
//!
//! # Key Types
//!
//! - [`ChangeDiff`] -- topic transition, added/removed votes, added comments
//! - [`TopicChange`] -- old and new topic, each possibly absent
//!
//! [`ChangeState`]: notechain_types::ChangeState

pub mod change_diff;

pub use change_diff::{diff_states, ChangeDiff, TopicChange};
