use std::sync::Arc;

use notechain_store::ObjectStore;
use notechain_types::{ChangeState, EntityId, ObjectId};
use tracing::{debug, warn};

use crate::cache::{StateCache, StateCacheKey};
use crate::config::NotesConfig;
use crate::error::{NotesError, NotesResult};
use crate::guard::UpdateGuard;
use crate::note::NoteParser;
use crate::parser::parse_chain;
use crate::ref_cache::RefScope;

/// Loads change states, walking each distinct chain tip at most once while
/// it stays cached.
///
/// One loader is shared by all units of work; each unit of work brings its
/// own [`RefScope`].
#[derive(Debug)]
pub struct NotesLoader {
    config: NotesConfig,
    cache: StateCache,
    notes: NoteParser,
    guard: UpdateGuard,
}

impl NotesLoader {
    pub fn new(config: NotesConfig) -> Self {
        Self {
            cache: StateCache::with_capacity(config.state_cache_capacity),
            notes: NoteParser::with_capacity(config.note_cache_capacity),
            guard: UpdateGuard::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn notes(&self) -> &NoteParser {
        &self.notes
    }

    pub fn guard(&self) -> &UpdateGuard {
        &self.guard
    }

    /// A fresh ref scope configured for this loader.
    pub fn scope(&self) -> RefScope {
        RefScope::new(&self.config)
    }

    /// Load the current state of `entity`.
    ///
    /// Returns [`NotesError::NotFound`] if the change has no meta ref.
    pub fn load<S: ObjectStore + ?Sized>(
        &self,
        scope: &RefScope,
        repo: &S,
        entity: &EntityId,
    ) -> NotesResult<Arc<ChangeState>> {
        let tip = scope
            .resolver(&entity.project, repo)
            .resolve(&entity.meta_ref())?
            .ok_or_else(|| NotesError::NotFound {
                entity: entity.clone(),
            })?;
        self.load_at(repo, entity, tip)
    }

    /// Load the current state of `entity`, or the empty state if the change
    /// has never been written.
    pub fn load_or_empty<S: ObjectStore + ?Sized>(
        &self,
        scope: &RefScope,
        repo: &S,
        entity: &EntityId,
    ) -> NotesResult<Arc<ChangeState>> {
        match self.load(scope, repo, entity) {
            Err(NotesError::NotFound { .. }) => Ok(Arc::new(ChangeState::empty(entity.clone()))),
            other => other,
        }
    }

    /// Load the state of `entity` at a specific tip.
    pub fn load_at<S: ObjectStore + ?Sized>(
        &self,
        repo: &S,
        entity: &EntityId,
        tip: ObjectId,
    ) -> NotesResult<Arc<ChangeState>> {
        self.cache
            .get_or_load(StateCacheKey::new(entity, tip), || self.walk(repo, entity, tip))
    }

    fn walk<S: ObjectStore + ?Sized>(
        &self,
        repo: &S,
        entity: &EntityId,
        tip: ObjectId,
    ) -> NotesResult<ChangeState> {
        debug!(%entity, tip = %tip.short_hex(), "walking update chain");
        let state = parse_chain(repo, &self.notes, entity, tip)?;
        if self.guard.exceeded(state.update_count) {
            warn!(
                %entity,
                updates = state.update_count,
                max_updates = self.guard.max_updates(),
                "change is at its update limit"
            );
        }
        debug!(
            %entity,
            tip = %tip.short_hex(),
            updates = state.update_count,
            "chain walk finished"
        );
        Ok(state)
    }
}

impl Default for NotesLoader {
    fn default() -> Self {
        Self::new(NotesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::footer::{LabelFooter, UpdateFields};
    use notechain_store::{CommitObject, InMemoryObjectStore};
    use notechain_types::{AccountId, ChangeId, ChangeStatus, PatchSetId, ProjectName, Timestamp};
    use proptest::prelude::*;

    fn entity() -> EntityId {
        EntityId::new(ProjectName::new("infra").unwrap(), ChangeId::new(1234))
    }

    /// Write `updates` as a chain and point the meta ref at its tip.
    fn seed(store: &InMemoryObjectStore, updates: &[UpdateFields]) -> ObjectId {
        let mut parent = None;
        for (i, fields) in updates.iter().enumerate() {
            let id = store
                .write_commit(&CommitObject {
                    parent,
                    author: AccountId::new(1000),
                    timestamp: Timestamp::from_millis(i as u64 + 1),
                    message: fields.to_message(),
                    payload: None,
                })
                .unwrap();
            parent = Some(id);
        }
        let tip = parent.unwrap();
        store.force_ref(&entity().meta_ref(), tip).unwrap();
        tip
    }

    fn simple_chain(len: usize) -> Vec<UpdateFields> {
        (0..len)
            .map(|i| {
                let mut f = UpdateFields::new(PatchSetId::FIRST);
                f.topic = Some(format!("t{i}"));
                f
            })
            .collect()
    }

    #[test]
    fn absent_ref_is_not_found() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let err = loader.load(&loader.scope(), &store, &entity()).unwrap_err();
        assert!(matches!(err, NotesError::NotFound { .. }));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn load_or_empty_defaults_only_when_absent() {
        let store = InMemoryObjectStore::new();
        let loader = NotesLoader::default();
        let scope = loader.scope();
        let state = loader.load_or_empty(&scope, &store, &entity()).unwrap();
        assert!(state.is_empty());
        assert!(state.meta_id.is_null());

        store.force_ref(&entity().meta_ref(), ObjectId::of(b"dangling")).unwrap();
        let err = loader
            .load_or_empty(&RefScope::pass_through(), &store, &entity())
            .unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn meta_ref_at_a_blob_is_corrupt() {
        let store = InMemoryObjectStore::new();
        let blob = store.write_blob(b"payload").unwrap();
        store.force_ref(&entity().meta_ref(), blob).unwrap();
        let loader = NotesLoader::default();
        let err = loader.load(&loader.scope(), &store, &entity()).unwrap_err();
        assert!(matches!(err, NotesError::CorruptObject { id, .. } if id == blob));
        assert!(err.is_corrupt());
        assert_eq!(err.entity(), Some(&entity()));
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn second_load_hits_cache() {
        let store = InMemoryObjectStore::new();
        seed(&store, &simple_chain(3));
        let loader = NotesLoader::default();
        let scope = loader.scope();

        let first = loader.load(&scope, &store, &entity()).unwrap();
        let reads = store.commit_reads();
        let second = loader.load(&scope, &store, &entity()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.commit_reads(), reads);
        assert_eq!(store.ref_reads(), 1);
        assert_eq!(loader.cache().stats().hits, 1);
    }

    #[test]
    fn reads_past_the_ceiling_succeed() {
        let store = InMemoryObjectStore::new();
        seed(&store, &simple_chain(5));
        let loader = NotesLoader::new(NotesConfig {
            max_updates: 3,
            ..NotesConfig::default()
        });
        let state = loader.load(&loader.scope(), &store, &entity()).unwrap();
        assert_eq!(state.update_count, 5);
    }

    #[test]
    fn concurrent_loads_walk_once() {
        let store = InMemoryObjectStore::new();
        let mut chain = simple_chain(20);
        chain[0].status = Some(ChangeStatus::New);
        chain[19].labels.push(LabelFooter::Set {
            label: "Verified".into(),
            value: 1,
            account: None,
        });
        seed(&store, &chain);
        let loader = NotesLoader::default();
        let barrier = Barrier::new(8);

        let states: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let scope = loader.scope();
                        barrier.wait();
                        loader.load(&scope, &store, &entity()).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(store.commit_reads(), 20);
        assert_eq!(loader.cache().stats().loads, 1);
        assert!(states.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn new_tip_is_a_new_key() {
        let store = InMemoryObjectStore::new();
        let old_tip = seed(&store, &simple_chain(2));
        let loader = NotesLoader::default();
        let old = loader.load(&loader.scope(), &store, &entity()).unwrap();

        let new_tip = seed(&store, &simple_chain(3));
        assert_ne!(old_tip, new_tip);
        let new = loader.load(&loader.scope(), &store, &entity()).unwrap();
        assert_eq!(old.topic.as_deref(), Some("t1"));
        assert_eq!(new.topic.as_deref(), Some("t2"));
        assert_eq!(loader.load_at(&store, &entity(), old_tip).unwrap(), old);
    }

    proptest! {
        #[test]
        fn repeated_loads_are_identical(len in 1usize..12) {
            let store = InMemoryObjectStore::new();
            seed(&store, &simple_chain(len));
            let a = NotesLoader::default();
            let b = NotesLoader::default();
            let first = a.load(&a.scope(), &store, &entity()).unwrap();
            let second = b.load(&b.scope(), &store, &entity()).unwrap();
            prop_assert_eq!(&*first, &*second);
            prop_assert_eq!(first.update_count, len);
        }
    }
}
