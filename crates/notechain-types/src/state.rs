use std::collections::{BTreeMap, BTreeSet};

use crate::change::{
    AccountId, ChangeMessage, ChangeStatus, PatchSetId, ReviewerState, Vote, VoteKey,
};
use crate::comment::{Comment, CommentKey, RobotComment, SubmitRequirementResult};
use crate::entity::EntityId;
use crate::object::ObjectId;
use crate::timestamp::Timestamp;

/// The materialized state of a change's update chain at one tip.
///
/// A `ChangeState` is a pure function of the chain below `meta_id`: loading
/// the same tip twice produces equal values. All collections are ordered so
/// that equality and iteration order are deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeState {
    pub entity: EntityId,
    /// Tip commit this state was built from; null for a never-written change.
    pub meta_id: ObjectId,
    pub status: ChangeStatus,
    pub topic: Option<String>,
    pub hashtags: BTreeSet<String>,
    pub subject: Option<String>,
    pub branch: Option<String>,
    pub owner: Option<AccountId>,
    pub current_patch_set: PatchSetId,
    pub work_in_progress: bool,
    pub private: bool,
    pub submission_id: Option<String>,
    pub created_on: Timestamp,
    pub last_updated_on: Timestamp,
    /// Current reviewers and CCs; never holds [`ReviewerState::Removed`].
    pub reviewers: BTreeMap<AccountId, ReviewerState>,
    pub votes: BTreeMap<VoteKey, Vote>,
    pub comments: BTreeMap<CommentKey, Comment>,
    pub robot_comments: BTreeMap<CommentKey, RobotComment>,
    pub messages: Vec<ChangeMessage>,
    pub submit_requirements: Vec<SubmitRequirementResult>,
    pub push_certs: BTreeMap<PatchSetId, String>,
    /// Number of commits in the chain.
    pub update_count: usize,
}

impl ChangeState {
    /// The state of a change that has no chain yet.
    pub fn empty(entity: EntityId) -> Self {
        Self {
            entity,
            meta_id: ObjectId::null(),
            status: ChangeStatus::New,
            topic: None,
            hashtags: BTreeSet::new(),
            subject: None,
            branch: None,
            owner: None,
            current_patch_set: PatchSetId::FIRST,
            work_in_progress: false,
            private: false,
            submission_id: None,
            created_on: Timestamp::zero(),
            last_updated_on: Timestamp::zero(),
            reviewers: BTreeMap::new(),
            votes: BTreeMap::new(),
            comments: BTreeMap::new(),
            robot_comments: BTreeMap::new(),
            messages: Vec::new(),
            submit_requirements: Vec::new(),
            push_certs: BTreeMap::new(),
            update_count: 0,
        }
    }

    /// Returns `true` if no commit has been applied.
    pub fn is_empty(&self) -> bool {
        self.update_count == 0
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    pub fn unresolved_comment_count(&self) -> usize {
        self.comments.values().filter(|c| c.unresolved).count()
    }

    pub fn total_comment_count(&self) -> usize {
        self.comments.len() + self.robot_comments.len()
    }

    /// Accounts currently holding `role`.
    pub fn reviewers_in(&self, role: ReviewerState) -> impl Iterator<Item = AccountId> + '_ {
        self.reviewers
            .iter()
            .filter(move |(_, r)| **r == role)
            .map(|(account, _)| *account)
    }

    /// Votes cast on the given patch set.
    pub fn votes_on(&self, patch_set: PatchSetId) -> impl Iterator<Item = &Vote> + '_ {
        self.votes
            .values()
            .filter(move |vote| vote.key.patch_set == patch_set)
    }

    /// Highest value any account gave `label` on the current patch set.
    pub fn max_vote(&self, label: &str) -> Option<i16> {
        self.votes_on(self.current_patch_set)
            .filter(|vote| vote.key.label == label)
            .map(|vote| vote.value)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ChangeId, ProjectName};

    fn entity() -> EntityId {
        EntityId::new(ProjectName::new("infra").unwrap(), ChangeId::new(1))
    }

    fn vote(ps: u32, label: &str, account: u32, value: i16) -> Vote {
        Vote {
            key: VoteKey::new(PatchSetId::new(ps), label, AccountId::new(account)),
            value,
            real_account: None,
            granted: Timestamp::zero(),
        }
    }

    fn comment(uuid: &str, unresolved: bool) -> Comment {
        Comment {
            key: CommentKey::new(PatchSetId::FIRST, "a.rs", uuid),
            line: Some(1),
            author: AccountId::new(1),
            real_author: None,
            written_on: Timestamp::zero(),
            message: "msg".into(),
            unresolved,
            parent_uuid: None,
        }
    }

    #[test]
    fn empty_state_is_open_and_unwritten() {
        let state = ChangeState::empty(entity());
        assert!(state.is_empty());
        assert!(!state.is_closed());
        assert!(state.meta_id.is_null());
        assert_eq!(state.current_patch_set, PatchSetId::FIRST);
    }

    #[test]
    fn unresolved_count_ignores_resolved() {
        let mut state = ChangeState::empty(entity());
        for c in [comment("a", true), comment("b", false), comment("c", true)] {
            state.comments.insert(c.key.clone(), c);
        }
        assert_eq!(state.unresolved_comment_count(), 2);
        assert_eq!(state.total_comment_count(), 3);
    }

    #[test]
    fn reviewers_filter_by_role() {
        let mut state = ChangeState::empty(entity());
        state.reviewers.insert(AccountId::new(3), ReviewerState::Reviewer);
        state.reviewers.insert(AccountId::new(1), ReviewerState::Reviewer);
        state.reviewers.insert(AccountId::new(2), ReviewerState::Cc);
        let reviewers: Vec<_> = state.reviewers_in(ReviewerState::Reviewer).collect();
        assert_eq!(reviewers, vec![AccountId::new(1), AccountId::new(3)]);
        assert_eq!(state.reviewers_in(ReviewerState::Cc).count(), 1);
    }

    #[test]
    fn max_vote_only_looks_at_current_patch_set() {
        let mut state = ChangeState::empty(entity());
        state.current_patch_set = PatchSetId::new(2);
        for v in [
            vote(1, "Code-Review", 1, 2),
            vote(2, "Code-Review", 1, 1),
            vote(2, "Code-Review", 2, -1),
        ] {
            state.votes.insert(v.key.clone(), v);
        }
        assert_eq!(state.max_vote("Code-Review"), Some(1));
        assert_eq!(state.max_vote("Verified"), None);
        assert_eq!(state.votes_on(PatchSetId::new(2)).count(), 2);
    }
}
