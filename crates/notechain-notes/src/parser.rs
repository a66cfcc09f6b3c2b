//! Chain walking and state derivation.
//!
//! A chain is read tip to root (following parent links) and then applied
//! root to tip onto a [`ChangeState`] accumulator. Commit parentage is the
//! only ordering; timestamps are informational.

use notechain_store::{CommitObject, ObjectStore};
use notechain_types::{ChangeMessage, ChangeState, EntityId, ObjectId, ReviewerState, Vote, VoteKey};
use tracing::trace;

use crate::error::{NotesError, NotesResult};
use crate::footer::{LabelFooter, UpdateFields};
use crate::note::{NoteParser, NoteRecord, RevisionNote};

/// A commit together with its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainCommit {
    pub id: ObjectId,
    pub commit: CommitObject,
}

/// Read every commit reachable from `tip`, root first.
///
/// A commit that cannot be read is [`NotesError::MissingObject`]; one that is
/// not a commit or does not decode is [`NotesError::CorruptObject`].
pub fn read_chain<S: ObjectStore + ?Sized>(
    repo: &S,
    entity: &EntityId,
    tip: ObjectId,
) -> NotesResult<Vec<ChainCommit>> {
    let mut chain = Vec::new();
    let mut next = Some(tip);
    while let Some(id) = next {
        let commit = repo
            .read_commit(&id)
            .map_err(|e| NotesError::from_store(entity, e))?
            .ok_or_else(|| NotesError::MissingObject {
                entity: entity.clone(),
                id,
            })?;
        next = commit.parent;
        chain.push(ChainCommit { id, commit });
    }
    chain.reverse();
    Ok(chain)
}

/// Parse the footer block of one commit.
pub fn parse_fields(entity: &EntityId, commit: &ChainCommit) -> NotesResult<UpdateFields> {
    UpdateFields::parse(&commit.commit.message).map_err(|e| NotesError::InvalidFooter {
        entity: entity.clone(),
        commit: commit.id,
        reason: e.to_string(),
    })
}

/// Walk the chain below `tip` and derive its state.
pub fn parse_chain<S: ObjectStore + ?Sized>(
    repo: &S,
    notes: &NoteParser,
    entity: &EntityId,
    tip: ObjectId,
) -> NotesResult<ChangeState> {
    let chain = read_chain(repo, entity, tip)?;
    let mut builder = StateBuilder::new(entity.clone());
    for entry in &chain {
        let fields = parse_fields(entity, entry)?;
        let note = entry
            .commit
            .payload
            .map(|blob| notes.parse(repo, entity, blob))
            .transpose()?;
        builder.apply(&entry.commit, &fields, note.as_deref());
    }
    Ok(builder.finish(tip))
}

/// Accumulates commits onto a [`ChangeState`], root first.
#[derive(Clone, Debug)]
pub struct StateBuilder {
    state: ChangeState,
}

impl StateBuilder {
    pub fn new(entity: EntityId) -> Self {
        Self {
            state: ChangeState::empty(entity),
        }
    }

    /// Continue from an already derived state, e.g. to extend it by one
    /// freshly appended commit.
    pub fn resume(state: ChangeState) -> Self {
        Self { state }
    }

    /// Apply the next commit of the chain.
    pub fn apply(
        &mut self,
        commit: &CommitObject,
        fields: &UpdateFields,
        note: Option<&RevisionNote>,
    ) {
        let state = &mut self.state;
        state.update_count += 1;
        let seq = state.update_count;

        if seq == 1 {
            state.owner = Some(commit.author);
            state.created_on = commit.timestamp;
        }
        state.last_updated_on = state.last_updated_on.max(commit.timestamp);
        state.current_patch_set = fields.patch_set;

        if let Some(status) = fields.status {
            state.status = status;
        }
        if let Some(topic) = &fields.topic {
            state.topic = (!topic.is_empty()).then(|| topic.clone());
        }
        if let Some(hashtags) = &fields.hashtags {
            state.hashtags = hashtags.clone();
        }
        if let Some(subject) = &fields.subject {
            state.subject = Some(subject.clone());
        }
        if let Some(branch) = &fields.branch {
            state.branch = Some(branch.clone());
        }
        if let Some(wip) = fields.work_in_progress {
            state.work_in_progress = wip;
        }
        if let Some(private) = fields.private {
            state.private = private;
        }
        if let Some(submission_id) = &fields.submission_id {
            state.submission_id = Some(submission_id.clone());
        }

        for label in &fields.labels {
            match label {
                LabelFooter::Set {
                    label,
                    value,
                    account,
                } => {
                    let voter = account.unwrap_or(commit.author);
                    let key = VoteKey::new(fields.patch_set, label.clone(), voter);
                    state.votes.insert(
                        key.clone(),
                        Vote {
                            key,
                            value: *value,
                            real_account: fields.real_user,
                            granted: commit.timestamp,
                        },
                    );
                }
                LabelFooter::Remove { label, account } => {
                    let voter = account.unwrap_or(commit.author);
                    state
                        .votes
                        .remove(&VoteKey::new(fields.patch_set, label.clone(), voter));
                }
            }
        }

        for (account, role) in &fields.reviewers {
            match role {
                ReviewerState::Removed => state.reviewers.remove(account),
                role => state.reviewers.insert(*account, *role),
            };
        }

        if let Some(body) = &fields.body {
            state.messages.push(ChangeMessage {
                seq,
                patch_set: fields.patch_set,
                author: commit.author,
                real_author: fields.real_user,
                written_on: commit.timestamp,
                tag: fields.tag.clone(),
                message: body.clone(),
            });
        }

        if let Some(note) = note {
            self.apply_note(note);
        }
        trace!(entity = %self.state.entity, seq, "applied update");
    }

    fn apply_note(&mut self, note: &RevisionNote) {
        let state = &mut self.state;
        let mut requirements = Vec::new();
        for record in &note.records {
            match record {
                NoteRecord::Comment(c) => {
                    state.comments.insert(c.key.clone(), c.clone());
                }
                NoteRecord::RobotComment(c) => {
                    state.robot_comments.insert(c.key.clone(), c.clone());
                }
                NoteRecord::SubmitRequirement(sr) => requirements.push(sr.clone()),
            }
        }
        if !requirements.is_empty() {
            state.submit_requirements = requirements;
        }
        if let Some(cert) = &note.push_cert {
            state.push_certs.insert(note.patch_set, cert.clone());
        }
    }

    pub fn finish(mut self, tip: ObjectId) -> ChangeState {
        self.state.meta_id = tip;
        self.state
    }
}
