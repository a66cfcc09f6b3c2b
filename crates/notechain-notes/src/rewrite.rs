//! Rewriting history: redact content already in a chain.
//!
//! A rewrite rebuilds the chain from the root, threading each new commit id
//! forward as the next commit's parent. Commits are never reordered, merged
//! or dropped. Commits below the first edited one keep their ids, since
//! their content and parents are unchanged; unedited payload blobs are
//! reused by id.

use notechain_store::{ObjectStore, RefUpdate};
use notechain_types::{AccountId, CommentKey, EntityId, ObjectId};
use tracing::{debug, info};

use crate::error::{NotesError, NotesResult};
use crate::footer::MessageParts;
use crate::loader::NotesLoader;
use crate::note::{NoteRecord, RevisionNote};
use crate::parser::read_chain;
use crate::ref_cache::RefScope;

/// Replacement content for one commit. `None` fields are kept as they are.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitEdit {
    pub message: Option<String>,
    pub note: Option<RevisionNote>,
}

/// A transformation applied to each commit of a chain.
pub trait CommitRewrite {
    /// What the rewrite targets, for errors and logs.
    fn target(&self) -> String;

    /// Return the edit for the commit at 1-based position `seq`, or `None`
    /// to copy it unchanged.
    fn edit(&self, seq: usize, message: &str, note: Option<&RevisionNote>) -> Option<CommitEdit>;
}

/// Replace the text of one published comment.
#[derive(Clone, Debug)]
pub struct DeleteCommentRewrite {
    pub key: CommentKey,
    pub deleted_by: AccountId,
    pub reason: String,
}

impl DeleteCommentRewrite {
    pub fn new(key: CommentKey, deleted_by: AccountId, reason: impl Into<String>) -> Self {
        Self {
            key,
            deleted_by,
            reason: reason.into(),
        }
    }

    /// The text left in place of the comment.
    pub fn replacement(&self) -> String {
        format!("Comment removed by: {}; Reason: {}", self.deleted_by, self.reason)
    }
}

impl CommitRewrite for DeleteCommentRewrite {
    fn target(&self) -> String {
        format!("comment {}", self.key)
    }

    fn edit(&self, _seq: usize, _message: &str, note: Option<&RevisionNote>) -> Option<CommitEdit> {
        let note = note?;
        let mut edited = note.clone();
        let mut hit = false;
        for record in &mut edited.records {
            if let NoteRecord::Comment(c) = record {
                if c.key == self.key {
                    c.message = self.replacement();
                    hit = true;
                }
            }
        }
        hit.then(|| CommitEdit {
            message: None,
            note: Some(edited),
        })
    }
}

/// Replace the body of one change message, keeping its footers.
#[derive(Clone, Debug)]
pub struct DeleteChangeMessageRewrite {
    /// 1-based position of the carrying commit, as in
    /// [`notechain_types::ChangeMessage::seq`].
    pub seq: usize,
    pub deleted_by: AccountId,
    pub reason: Option<String>,
}

impl DeleteChangeMessageRewrite {
    pub fn new(seq: usize, deleted_by: AccountId, reason: Option<String>) -> Self {
        Self {
            seq,
            deleted_by,
            reason,
        }
    }

    pub fn replacement(&self) -> String {
        match &self.reason {
            Some(reason) => format!(
                "Change message removed by: {}\nReason: {}",
                self.deleted_by, reason
            ),
            None => format!("Change message removed by: {}", self.deleted_by),
        }
    }
}

impl CommitRewrite for DeleteChangeMessageRewrite {
    fn target(&self) -> String {
        format!("change message #{}", self.seq)
    }

    fn edit(&self, seq: usize, message: &str, _note: Option<&RevisionNote>) -> Option<CommitEdit> {
        if seq != self.seq {
            return None;
        }
        let parts = MessageParts::split(message);
        if parts.body.is_none() {
            return None;
        }
        Some(CommitEdit {
            message: Some(parts.with_body(Some(&self.replacement()))),
            note: None,
        })
    }
}

/// Result of rewriting a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub old_tip: ObjectId,
    pub new_tip: ObjectId,
    /// Number of commits whose content changed.
    pub edited: usize,
}

/// Builds rewritten chains.
#[derive(Debug)]
pub struct ChainRewriter<'a> {
    loader: &'a NotesLoader,
}

impl<'a> ChainRewriter<'a> {
    pub fn new(loader: &'a NotesLoader) -> Self {
        Self { loader }
    }

    /// Write a rewritten copy of the chain ending at `tip`.
    ///
    /// Only objects are written; no ref moves. A rewrite that edits nothing
    /// is [`NotesError::RewriteTargetNotFound`].
    pub fn rewrite<S: ObjectStore + ?Sized>(
        &self,
        repo: &S,
        entity: &EntityId,
        tip: ObjectId,
        rewrite: &dyn CommitRewrite,
    ) -> NotesResult<RewriteOutcome> {
        let chain = read_chain(repo, entity, tip)?;
        let mut parent = None;
        let mut edited = 0;

        for (i, entry) in chain.iter().enumerate() {
            let note = entry
                .commit
                .payload
                .map(|blob| self.loader.notes().parse(repo, entity, blob))
                .transpose()?;

            let mut commit = entry.commit.clone();
            commit.parent = parent;
            if let Some(edit) = rewrite.edit(i + 1, &commit.message, note.as_deref()) {
                edited += 1;
                if let Some(message) = edit.message {
                    commit.message = message;
                }
                if let Some(note) = edit.note {
                    commit.payload = Some(repo.write_blob(&note.encode()?)?);
                }
                debug!(%entity, seq = i + 1, commit = %entry.id.short_hex(), "rewrote commit");
            }
            parent = Some(repo.write_commit(&commit)?);
        }

        match parent {
            Some(new_tip) if edited > 0 => {
                info!(
                    %entity,
                    target = %rewrite.target(),
                    edited,
                    new_tip = %new_tip.short_hex(),
                    "rewrote chain"
                );
                Ok(RewriteOutcome {
                    old_tip: tip,
                    new_tip,
                    edited,
                })
            }
            _ => Err(NotesError::RewriteTargetNotFound {
                entity: entity.clone(),
                target: rewrite.target(),
            }),
        }
    }

    /// Rewrite the current chain of `entity` and move its meta ref to the
    /// result, provided nobody appended in the meantime.
    ///
    /// A concurrent append is reported as [`NotesError::Conflict`]; the
    /// caller retries from a fresh load.
    pub fn rewrite_and_swap<S: ObjectStore + ?Sized>(
        &self,
        scope: &RefScope,
        repo: &S,
        entity: &EntityId,
        rewrite: &dyn CommitRewrite,
    ) -> NotesResult<RewriteOutcome> {
        let meta_ref = entity.meta_ref();
        let resolver = scope.resolver(&entity.project, repo);
        let tip = resolver
            .resolve(&meta_ref)?
            .ok_or_else(|| NotesError::NotFound {
                entity: entity.clone(),
            })?;

        let outcome = self.rewrite(repo, entity, tip, rewrite)?;
        match repo.update_ref(&meta_ref, Some(tip), outcome.new_tip)? {
            RefUpdate::Updated => {
                resolver.record(&meta_ref, outcome.new_tip);
                Ok(outcome)
            }
            RefUpdate::Conflict { actual } => {
                resolver.invalidate(&meta_ref);
                debug!(%entity, ?actual, "meta ref moved during rewrite");
                Err(NotesError::Conflict {
                    entity: entity.clone(),
                    expected: Some(tip),
                    actual,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footer::UpdateFields;
    use crate::parser::parse_fields;
    use crate::update::{ChangeUpdate, UpdateManager};
    use notechain_store::InMemoryObjectStore;
    use notechain_types::{ChangeId, ChangeStatus, Comment, PatchSetId, ProjectName, Timestamp};

    const OWNER: AccountId = AccountId::new(1000);
    const REVIEWER: AccountId = AccountId::new(1001);
    const ADMIN: AccountId = AccountId::new(1);

    fn entity() -> EntityId {
        EntityId::new(ProjectName::new("infra").unwrap(), ChangeId::new(77))
    }

    fn comment(uuid: &str, message: &str) -> Comment {
        Comment {
            key: CommentKey::new(PatchSetId::FIRST, "README.md", uuid),
            line: Some(2),
            author: REVIEWER,
            real_author: None,
            written_on: Timestamp::from_millis(5),
            message: message.into(),
            unresolved: false,
            parent_uuid: None,
        }
    }

    fn update(author: AccountId, at: u64) -> ChangeUpdate {
        ChangeUpdate::new(entity(), author, PatchSetId::FIRST)
            .with_timestamp(Timestamp::from_millis(at))
    }

    /// root: status, topic; 2: vote + secret comment + message; 3: another
    /// comment.
    fn seed(store: &InMemoryObjectStore, loader: &NotesLoader) -> ObjectId {
        let manager = UpdateManager::new(loader);
        let scope = loader.scope();
        manager
            .execute(
                &scope,
                store,
                &update(OWNER, 1)
                    .with_status(ChangeStatus::New)
                    .with_topic("infra"),
            )
            .unwrap();
        manager
            .execute(
                &scope,
                store,
                &update(REVIEWER, 2)
                    .with_vote("Code-Review", -1)
                    .with_message("password is hunter2")
                    .with_comment(comment("secret", "the key is hunter2")),
            )
            .unwrap();
        manager
            .execute(&scope, store, &update(REVIEWER, 3).with_comment(comment("nit", "typo")))
            .unwrap()
            .new_tip
    }

    #[test]
    fn delete_comment_preserves_everything_else() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);
        let before = loader.load_at(&store, &entity(), tip).unwrap();

        let rewrite =
            DeleteCommentRewrite::new(comment("secret", "").key, ADMIN, "leaked credential");
        let outcome = ChainRewriter::new(&loader)
            .rewrite(&store, &entity(), tip, &rewrite)
            .unwrap();
        assert_eq!(outcome.edited, 1);
        assert_ne!(outcome.new_tip, tip);

        let after = loader.load_at(&store, &entity(), outcome.new_tip).unwrap();
        let redacted = &after.comments[&rewrite.key];
        assert_eq!(redacted.message, "Comment removed by: 1; Reason: leaked credential");

        // Identical apart from the redacted text and the tip.
        let mut expected = (*before).clone();
        expected.meta_id = outcome.new_tip;
        expected.comments.get_mut(&rewrite.key).unwrap().message = rewrite.replacement();
        assert_eq!(*after, expected);
    }

    #[test]
    fn untouched_commits_keep_their_content() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);

        let rewrite = DeleteCommentRewrite::new(comment("secret", "").key, ADMIN, "leak");
        let outcome = ChainRewriter::new(&loader)
            .rewrite(&store, &entity(), tip, &rewrite)
            .unwrap();

        let old = read_chain(&store, &entity(), tip).unwrap();
        let new = read_chain(&store, &entity(), outcome.new_tip).unwrap();
        assert_eq!(old.len(), new.len());

        // The root precedes the edit, so it is the very same object.
        assert_eq!(old[0].id, new[0].id);
        for (o, n) in old.iter().zip(&new) {
            assert_eq!(o.commit.message, n.commit.message);
            assert_eq!(o.commit.author, n.commit.author);
            assert_eq!(o.commit.timestamp, n.commit.timestamp);
        }
        // Only the edited commit's payload changed.
        assert_ne!(old[1].commit.payload, new[1].commit.payload);
        assert_eq!(old[2].commit.payload, new[2].commit.payload);
        assert_ne!(old[2].id, new[2].id);
    }

    #[test]
    fn delete_change_message_keeps_footers() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);

        let rewrite = DeleteChangeMessageRewrite::new(2, ADMIN, Some("leak".into()));
        let outcome = ChainRewriter::new(&loader)
            .rewrite(&store, &entity(), tip, &rewrite)
            .unwrap();

        let old = read_chain(&store, &entity(), tip).unwrap();
        let new = read_chain(&store, &entity(), outcome.new_tip).unwrap();
        assert_eq!(
            MessageParts::split(&old[1].commit.message).footers,
            MessageParts::split(&new[1].commit.message).footers
        );
        let fields: UpdateFields = parse_fields(&entity(), &new[1]).unwrap();
        assert_eq!(fields.body.as_deref(), Some("Change message removed by: 1\nReason: leak"));

        let state = loader.load_at(&store, &entity(), outcome.new_tip).unwrap();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].seq, 2);
        assert!(!state.messages[0].message.contains("hunter2"));
        assert_eq!(state.max_vote("Code-Review"), Some(-1));
    }

    #[test]
    fn commit_without_message_is_not_a_target() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);

        let err = ChainRewriter::new(&loader)
            .rewrite(&store, &entity(), tip, &DeleteChangeMessageRewrite::new(1, ADMIN, None))
            .unwrap_err();
        assert!(matches!(err, NotesError::RewriteTargetNotFound { .. }));
    }

    #[test]
    fn unknown_comment_is_not_found() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);
        let rewrite = DeleteCommentRewrite::new(comment("nope", "").key, ADMIN, "x");
        let err = ChainRewriter::new(&loader)
            .rewrite(&store, &entity(), tip, &rewrite)
            .unwrap_err();
        match err {
            NotesError::RewriteTargetNotFound { target, .. } => assert!(target.contains("nope")),
            other => panic!("expected RewriteTargetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn swap_moves_the_ref() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        seed(&store, &loader);
        let scope = loader.scope();

        let rewrite = DeleteCommentRewrite::new(comment("nit", "").key, ADMIN, "noise");
        let outcome = ChainRewriter::new(&loader)
            .rewrite_and_swap(&scope, &store, &entity(), &rewrite)
            .unwrap();
        assert_eq!(store.resolve_ref(&entity().meta_ref()).unwrap(), Some(outcome.new_tip));

        let state = loader.load(&scope, &store, &entity()).unwrap();
        assert_eq!(state.meta_id, outcome.new_tip);
        assert_eq!(state.comments[&rewrite.key].message, rewrite.replacement());
    }

    #[test]
    fn concurrent_append_fails_the_swap() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let tip = seed(&store, &loader);
        let scope = loader.scope();
        // The rewriting unit of work has already seen the tip.
        assert_eq!(
            scope.resolver(&entity().project, &store).resolve(&entity().meta_ref()).unwrap(),
            Some(tip)
        );

        UpdateManager::new(&loader)
            .execute(&loader.scope(), &store, &update(OWNER, 4).with_topic("web"))
            .unwrap();
        let appended = store.resolve_ref(&entity().meta_ref()).unwrap();

        let rewrite = DeleteCommentRewrite::new(comment("secret", "").key, ADMIN, "leak");
        let err = ChainRewriter::new(&loader)
            .rewrite_and_swap(&scope, &store, &entity(), &rewrite)
            .unwrap_err();
        assert!(matches!(err, NotesError::Conflict { .. }));
        // Never silently overwritten.
        assert_eq!(store.resolve_ref(&entity().meta_ref()).unwrap(), appended);

        // A retry from a fresh lookup succeeds and keeps the append.
        let outcome = ChainRewriter::new(&loader)
            .rewrite_and_swap(&scope, &store, &entity(), &rewrite)
            .unwrap();
        let state = loader.load_at(&store, &entity(), outcome.new_tip).unwrap();
        assert_eq!(state.topic.as_deref(), Some("web"));
        assert_eq!(state.update_count, 4);
    }
}
