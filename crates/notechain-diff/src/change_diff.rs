//! Change-level diff: compare two materialized states of the same change.
//!
//! Votes are compared by [`VoteKey`] (patch set, label, account). The vote
//! value is not part of the identity, so re-voting with a different value is
//! neither an addition nor a removal. Comments are append-only in normal
//! operation; only additions are reported.

use notechain_types::{ChangeState, CommentKey, VoteKey};

/// A topic transition. Either side may be absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// The result of comparing two change states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeDiff {
    /// Present only when the topic differs.
    pub topic: Option<TopicChange>,
    /// Votes present in the new state but not the old, in key order.
    pub added_votes: Vec<VoteKey>,
    /// Votes present in the old state but not the new, in key order.
    pub removed_votes: Vec<VoteKey>,
    /// Comments present in the new state but not the old, in key order.
    pub added_comments: Vec<CommentKey>,
}

impl ChangeDiff {
    /// Create an empty change diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.added_votes.is_empty()
            && self.removed_votes.is_empty()
            && self.added_comments.is_empty()
    }

    /// Total number of reported changes.
    pub fn len(&self) -> usize {
        usize::from(self.topic.is_some())
            + self.added_votes.len()
            + self.removed_votes.len()
            + self.added_comments.len()
    }

    pub fn topic_changed(&self) -> bool {
        self.topic.is_some()
    }
}

/// Compute the diff between two states of a change.
pub fn diff_states(old: &ChangeState, new: &ChangeState) -> ChangeDiff {
    let topic = (old.topic != new.topic).then(|| TopicChange {
        old: old.topic.clone(),
        new: new.topic.clone(),
    });

    let added_votes = new
        .votes
        .keys()
        .filter(|key| !old.votes.contains_key(*key))
        .cloned()
        .collect();

    let removed_votes = old
        .votes
        .keys()
        .filter(|key| !new.votes.contains_key(*key))
        .cloned()
        .collect();

    let added_comments = new
        .comments
        .keys()
        .filter(|key| !old.comments.contains_key(*key))
        .cloned()
        .collect();

    ChangeDiff {
        topic,
        added_votes,
        removed_votes,
        added_comments,
    }
}
