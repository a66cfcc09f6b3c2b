//! The write path: append one update commit to a change's chain.

use std::collections::BTreeSet;
use std::sync::Arc;

use notechain_store::{CommitObject, ObjectStore, RefUpdate};
use notechain_types::{
    AccountId, ChangeState, ChangeStatus, Comment, EntityId, ObjectId, PatchSetId, ReviewerState,
    RobotComment, SubmitRequirementResult, Timestamp,
};
use tracing::{debug, info, warn};

use crate::cache::StateCacheKey;
use crate::error::{NotesError, NotesResult};
use crate::footer::{LabelFooter, UpdateFields};
use crate::loader::NotesLoader;
use crate::note::{NoteRecord, RevisionNote};
use crate::parser::StateBuilder;
use crate::ref_cache::RefScope;

/// One pending update to a change.
#[derive(Clone, Debug)]
pub struct ChangeUpdate {
    entity: EntityId,
    author: AccountId,
    when: Option<Timestamp>,
    fields: UpdateFields,
    comments: Vec<Comment>,
    robot_comments: Vec<RobotComment>,
    submit_requirements: Vec<SubmitRequirementResult>,
    push_cert: Option<String>,
}

impl ChangeUpdate {
    pub fn new(entity: EntityId, author: AccountId, patch_set: PatchSetId) -> Self {
        Self {
            entity,
            author,
            when: None,
            fields: UpdateFields::new(patch_set),
            comments: Vec::new(),
            robot_comments: Vec::new(),
            submit_requirements: Vec::new(),
            push_cert: None,
        }
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn author(&self) -> AccountId {
        self.author
    }

    pub fn patch_set(&self) -> PatchSetId {
        self.fields.patch_set
    }

    /// Fix the commit timestamp. Defaults to the time of the first attempt.
    pub fn with_timestamp(mut self, when: Timestamp) -> Self {
        self.when = Some(when);
        self
    }

    /// Act on behalf of `author`, recording `real_user` as the one who
    /// actually performed the update.
    pub fn with_real_user(mut self, real_user: AccountId) -> Self {
        self.fields.real_user = Some(real_user);
        self
    }

    pub fn with_status(mut self, status: ChangeStatus) -> Self {
        self.fields.status = Some(status);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.fields.topic = Some(topic.into());
        self
    }

    pub fn clear_topic(mut self) -> Self {
        self.fields.topic = Some(String::new());
        self
    }

    pub fn with_hashtags<I, T>(mut self, hashtags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.fields.hashtags = Some(hashtags.into_iter().map(Into::into).collect::<BTreeSet<_>>());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.fields.subject = Some(subject.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.fields.branch = Some(branch.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.fields.tag = Some(tag.into());
        self
    }

    pub fn with_work_in_progress(mut self, wip: bool) -> Self {
        self.fields.work_in_progress = Some(wip);
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.fields.private = Some(private);
        self
    }

    pub fn with_submission_id(mut self, submission_id: impl Into<String>) -> Self {
        self.fields.submission_id = Some(submission_id.into());
        self
    }

    /// The author's vote on `label`.
    pub fn with_vote(mut self, label: impl Into<String>, value: i16) -> Self {
        self.fields.labels.push(LabelFooter::Set {
            label: label.into(),
            value,
            account: None,
        });
        self
    }

    /// A vote cast on behalf of `account`.
    pub fn with_vote_for(
        mut self,
        label: impl Into<String>,
        value: i16,
        account: AccountId,
    ) -> Self {
        self.fields.labels.push(LabelFooter::Set {
            label: label.into(),
            value,
            account: Some(account),
        });
        self
    }

    pub fn remove_vote(mut self, label: impl Into<String>, account: AccountId) -> Self {
        self.fields.labels.push(LabelFooter::Remove {
            label: label.into(),
            account: Some(account),
        });
        self
    }

    /// Add `account` as a reviewer or CC, or move it between the two.
    pub fn with_reviewer(mut self, account: AccountId, role: ReviewerState) -> Self {
        self.fields.reviewers.insert(account, role);
        self
    }

    pub fn remove_reviewer(mut self, account: AccountId) -> Self {
        self.fields.reviewers.insert(account, ReviewerState::Removed);
        self
    }

    /// The change message. An empty message is no message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.fields.body = (!message.is_empty()).then_some(message);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }

    pub fn with_robot_comment(mut self, comment: RobotComment) -> Self {
        self.robot_comments.push(comment);
        self
    }

    pub fn with_submit_requirement(mut self, result: SubmitRequirementResult) -> Self {
        self.submit_requirements.push(result);
        self
    }

    pub fn with_push_cert(mut self, cert: impl Into<String>) -> Self {
        self.push_cert = Some(cert.into());
        self
    }

    /// Abandon and submit are exempt from the update ceiling.
    pub fn is_terminal(&self) -> bool {
        self.fields.is_terminal()
    }

    fn has_human_payload(&self) -> bool {
        !self.comments.is_empty()
            || !self.submit_requirements.is_empty()
            || self.push_cert.is_some()
    }

    fn has_payload(&self) -> bool {
        self.has_human_payload() || !self.robot_comments.is_empty()
    }

    fn is_empty(&self) -> bool {
        let f = &self.fields;
        f.status.is_none()
            && f.topic.is_none()
            && f.hashtags.is_none()
            && f.subject.is_none()
            && f.branch.is_none()
            && f.tag.is_none()
            && f.work_in_progress.is_none()
            && f.private.is_none()
            && f.submission_id.is_none()
            && f.labels.is_empty()
            && f.reviewers.is_empty()
            && f.body.is_none()
            && !self.has_payload()
    }

    /// Reject updates that cannot be encoded faithfully.
    pub fn validate(&self) -> NotesResult<()> {
        let invalid = |reason: String| NotesError::InvalidUpdate {
            entity: self.entity.clone(),
            reason,
        };
        if self.fields.patch_set.get() == 0 {
            return Err(invalid("patch set numbers start at 1".into()));
        }
        if self.is_empty() {
            return Err(invalid("update changes nothing".into()));
        }
        if !self.robot_comments.is_empty() && self.has_human_payload() {
            return Err(invalid(
                "robot comments cannot be combined with human payload records".into(),
            ));
        }
        let f = &self.fields;
        let single_line = [
            ("topic", f.topic.as_deref()),
            ("subject", f.subject.as_deref()),
            ("branch", f.branch.as_deref()),
            ("tag", f.tag.as_deref()),
            ("submission id", f.submission_id.as_deref()),
        ];
        for (name, value) in single_line {
            if value.is_some_and(|v| v.contains('\n') || v.trim() != v) {
                return Err(invalid(format!("{name} must be a single trimmed line")));
            }
        }
        if let Some(tag) = f.hashtags.iter().flatten().find(|t| {
            t.is_empty() || t.contains(',') || t.contains('\n') || t.trim() != t.as_str()
        }) {
            return Err(invalid(format!("invalid hashtag {tag:?}")));
        }
        for label in &f.labels {
            let name = match label {
                LabelFooter::Set { label, .. } | LabelFooter::Remove { label, .. } => label,
            };
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(invalid(format!("invalid label name {name:?}")));
            }
        }
        if let Some(body) = &f.body {
            if body.starts_with('\n') || body.ends_with('\n') {
                return Err(invalid("message must not start or end with a newline".into()));
            }
        }
        Ok(())
    }

    /// The commit footers for this update.
    pub fn fields(&self) -> &UpdateFields {
        &self.fields
    }

    /// The revision note to attach, if any.
    pub fn note(&self) -> Option<RevisionNote> {
        if !self.has_payload() {
            return None;
        }
        let patch_set = self.fields.patch_set;
        let note = if self.robot_comments.is_empty() {
            let mut note = RevisionNote::human(patch_set);
            note.records.extend(self.comments.iter().cloned().map(NoteRecord::Comment));
            note.records.extend(
                self.submit_requirements
                    .iter()
                    .cloned()
                    .map(NoteRecord::SubmitRequirement),
            );
            note.push_cert = self.push_cert.clone();
            note
        } else {
            let mut note = RevisionNote::robot(patch_set);
            note.records
                .extend(self.robot_comments.iter().cloned().map(NoteRecord::RobotComment));
            note
        };
        Some(note)
    }
}

/// Result of a successful append.
#[derive(Clone, Debug)]
pub struct UpdateOutcome {
    pub old_tip: Option<ObjectId>,
    pub new_tip: ObjectId,
    /// State at `new_tip`; also stored in the loader's state cache.
    pub state: Arc<ChangeState>,
    /// Number of ref-update conflicts lost before succeeding.
    pub retries: usize,
}

/// Appends updates with compare-and-swap on the meta ref.
#[derive(Debug)]
pub struct UpdateManager<'a> {
    loader: &'a NotesLoader,
}

impl<'a> UpdateManager<'a> {
    pub fn new(loader: &'a NotesLoader) -> Self {
        Self { loader }
    }

    /// Append `update` to its change's chain.
    ///
    /// A lost ref race reloads and retries up to `max_retries` times before
    /// surfacing [`NotesError::Conflict`]. Limit and corruption errors are
    /// returned immediately.
    pub fn execute<S: ObjectStore + ?Sized>(
        &self,
        scope: &RefScope,
        repo: &S,
        update: &ChangeUpdate,
    ) -> NotesResult<UpdateOutcome> {
        update.validate()?;
        let entity = update.entity();
        let meta_ref = entity.meta_ref();
        let resolver = scope.resolver(&entity.project, repo);
        let when = update.when.unwrap_or_else(Timestamp::now);
        let max_retries = self.loader.config().max_retries;

        let note = update.note();
        let payload = note
            .as_ref()
            .map(|n| n.encode().and_then(|bytes| repo.write_blob(&bytes)))
            .transpose()?;
        let message = update.fields().to_message();
        // Derive the new state from the encoded message, as a walk would.
        let applied = UpdateFields::parse(&message).map_err(|e| NotesError::InvalidUpdate {
            entity: entity.clone(),
            reason: e.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            let old_tip = resolver.resolve(&meta_ref)?;
            let current = match old_tip {
                Some(tip) => self.loader.load_at(repo, entity, tip)?,
                None => Arc::new(ChangeState::empty(entity.clone())),
            };
            self.loader
                .guard()
                .check(entity, current.update_count, update.is_terminal())?;

            let commit = CommitObject {
                parent: old_tip,
                author: update.author(),
                timestamp: when,
                message: message.clone(),
                payload,
            };
            let new_tip = repo.write_commit(&commit)?;

            match repo.update_ref(&meta_ref, old_tip, new_tip)? {
                RefUpdate::Updated => {
                    resolver.record(&meta_ref, new_tip);
                    let mut builder = StateBuilder::resume((*current).clone());
                    builder.apply(&commit, &applied, note.as_ref());
                    let state = Arc::new(builder.finish(new_tip));
                    self.loader
                        .cache()
                        .put(StateCacheKey::new(entity, new_tip), Arc::clone(&state));
                    info!(
                        %entity,
                        tip = %new_tip.short_hex(),
                        updates = state.update_count,
                        retries = attempt,
                        "appended update"
                    );
                    return Ok(UpdateOutcome {
                        old_tip,
                        new_tip,
                        state,
                        retries: attempt,
                    });
                }
                RefUpdate::Conflict { actual } => {
                    resolver.invalidate(&meta_ref);
                    if attempt >= max_retries {
                        warn!(
                            %entity,
                            attempts = attempt + 1,
                            "giving up after repeated ref conflicts"
                        );
                        return Err(NotesError::Conflict {
                            entity: entity.clone(),
                            expected: old_tip,
                            actual,
                        });
                    }
                    attempt += 1;
                    debug!(%entity, attempt, ?actual, "meta ref moved, retrying");
                }
            }
        }
    }
}
