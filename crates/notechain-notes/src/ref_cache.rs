//! Ref lookups memoized for one unit of work.
//!
//! A [`RefScope`] is created at the start of a request or task and dropped
//! at its end; every ref it resolved is forgotten with it. The scope is
//! `!Sync`, so it cannot be shared between concurrent units of work.

use std::cell::RefCell;
use std::collections::HashMap;

use notechain_store::{ObjectStore, StoreResult};
use notechain_types::{ObjectId, ProjectName};
use tracing::{debug, trace};

use crate::config::NotesConfig;

type ProjectRefs = HashMap<String, Option<ObjectId>>;

/// The ref cache of one unit of work.
#[derive(Debug)]
pub struct RefScope {
    enabled: bool,
    projects: RefCell<HashMap<ProjectName, ProjectRefs>>,
}

impl RefScope {
    pub fn new(config: &NotesConfig) -> Self {
        Self::with_enabled(config.ref_cache_enabled)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            projects: RefCell::new(HashMap::new()),
        }
    }

    /// A scope that never caches: every lookup reaches the store.
    pub fn pass_through() -> Self {
        Self::with_enabled(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The resolver for `project`, reading from `repo`.
    pub fn resolver<'a, S: ObjectStore + ?Sized>(
        &'a self,
        project: &ProjectName,
        repo: &'a S,
    ) -> RefResolver<'a, S> {
        RefResolver {
            scope: self,
            project: project.clone(),
            repo,
        }
    }

    /// Number of refs currently remembered, across all projects.
    pub fn cached_refs(&self) -> usize {
        self.projects.borrow().values().map(HashMap::len).sum()
    }

    /// Forget everything resolved so far.
    pub fn clear(&self) {
        self.projects.borrow_mut().clear();
    }
}

impl Drop for RefScope {
    fn drop(&mut self) {
        let cached = self.cached_refs();
        if cached > 0 {
            trace!(cached, "ref scope closed");
        }
    }
}

/// Resolves refs of one project through its scope.
pub struct RefResolver<'a, S: ?Sized> {
    scope: &'a RefScope,
    project: ProjectName,
    repo: &'a S,
}

impl<'a, S: ObjectStore + ?Sized> RefResolver<'a, S> {
    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    /// Resolve `name`, consulting the scope first when caching is enabled.
    /// An absent ref is remembered as absent.
    pub fn resolve(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        if !self.scope.enabled {
            return self.repo.resolve_ref(name);
        }
        if let Some(cached) = self
            .scope
            .projects
            .borrow()
            .get(&self.project)
            .and_then(|refs| refs.get(name))
        {
            trace!(project = %self.project, %name, "ref cache hit");
            return Ok(*cached);
        }
        let resolved = self.repo.resolve_ref(name)?;
        self.remember(name, resolved);
        Ok(resolved)
    }

    /// Record the value this unit of work just wrote to `name`.
    pub fn record(&self, name: &str, value: ObjectId) {
        if self.scope.enabled {
            self.remember(name, Some(value));
        }
    }

    /// Drop any cached value of `name`, forcing the next lookup to the store.
    pub fn invalidate(&self, name: &str) {
        if let Some(refs) = self.scope.projects.borrow_mut().get_mut(&self.project) {
            if refs.remove(name).is_some() {
                debug!(project = %self.project, %name, "ref cache entry invalidated");
            }
        }
    }

    fn remember(&self, name: &str, value: Option<ObjectId>) {
        self.scope
            .projects
            .borrow_mut()
            .entry(self.project.clone())
            .or_default()
            .insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notechain_store::{CommitObject, InMemoryObjectStore};
    use notechain_types::{AccountId, Timestamp};

    const REF: &str = "refs/changes/01/1/meta";

    fn project(name: &str) -> ProjectName {
        ProjectName::new(name).unwrap()
    }

    fn commit(store: &InMemoryObjectStore, message: &str) -> ObjectId {
        store
            .write_commit(&CommitObject {
                parent: None,
                author: AccountId::new(1),
                timestamp: Timestamp::from_millis(1),
                message: message.into(),
                payload: None,
            })
            .unwrap()
    }

    #[test]
    fn enabled_scope_reads_each_ref_once() {
        let store = InMemoryObjectStore::new();
        let tip = commit(&store, "a");
        store.update_ref(REF, None, tip).unwrap();

        let scope = RefScope::with_enabled(true);
        let resolver = scope.resolver(&project("infra"), &store);
        assert_eq!(resolver.resolve(REF).unwrap(), Some(tip));
        assert_eq!(resolver.resolve(REF).unwrap(), Some(tip));
        assert_eq!(store.ref_reads(), 1);

        // A second resolver for the same project shares the scope's entries.
        let again = scope.resolver(&project("infra"), &store);
        assert_eq!(again.resolve(REF).unwrap(), Some(tip));
        assert_eq!(store.ref_reads(), 1);
        assert_eq!(scope.cached_refs(), 1);
    }

    #[test]
    fn absent_refs_are_remembered() {
        let store = InMemoryObjectStore::new();
        let scope = RefScope::with_enabled(true);
        let resolver = scope.resolver(&project("infra"), &store);
        assert_eq!(resolver.resolve(REF).unwrap(), None);
        assert_eq!(resolver.resolve(REF).unwrap(), None);
        assert_eq!(store.ref_reads(), 1);
    }

    #[test]
    fn disabled_scope_always_reads_through() {
        let store = InMemoryObjectStore::new();
        let first = commit(&store, "a");
        let second = commit(&store, "b");
        store.update_ref(REF, None, first).unwrap();

        let scope = RefScope::pass_through();
        let resolver = scope.resolver(&project("infra"), &store);
        assert_eq!(resolver.resolve(REF).unwrap(), Some(first));
        store.update_ref(REF, Some(first), second).unwrap();
        assert_eq!(resolver.resolve(REF).unwrap(), Some(second));
        resolver.record(REF, first);
        assert_eq!(resolver.resolve(REF).unwrap(), Some(second));
        assert_eq!(store.ref_reads(), 3);
        assert_eq!(scope.cached_refs(), 0);
    }

    #[test]
    fn projects_are_isolated() {
        let store = InMemoryObjectStore::new();
        let tip = commit(&store, "a");
        store.update_ref(REF, None, tip).unwrap();

        let scope = RefScope::with_enabled(true);
        scope.resolver(&project("infra"), &store).resolve(REF).unwrap();
        scope.resolver(&project("web"), &store).resolve(REF).unwrap();
        assert_eq!(store.ref_reads(), 2);
        assert_eq!(scope.cached_refs(), 2);
    }

    #[test]
    fn new_scope_sees_fresh_values() {
        let store = InMemoryObjectStore::new();
        let first = commit(&store, "a");
        let second = commit(&store, "b");
        store.update_ref(REF, None, first).unwrap();

        {
            let scope = RefScope::with_enabled(true);
            let resolver = scope.resolver(&project("infra"), &store);
            assert_eq!(resolver.resolve(REF).unwrap(), Some(first));
            store.update_ref(REF, Some(first), second).unwrap();
            // Stale within the scope until invalidated.
            assert_eq!(resolver.resolve(REF).unwrap(), Some(first));
            resolver.invalidate(REF);
            assert_eq!(resolver.resolve(REF).unwrap(), Some(second));
        }

        let scope = RefScope::with_enabled(true);
        assert_eq!(
            scope.resolver(&project("infra"), &store).resolve(REF).unwrap(),
            Some(second)
        );
    }

    #[test]
    fn record_and_clear() {
        let store = InMemoryObjectStore::new();
        let tip = commit(&store, "a");
        let scope = RefScope::new(&NotesConfig::default());
        assert!(scope.is_enabled());

        let resolver = scope.resolver(&project("infra"), &store);
        resolver.record(REF, tip);
        assert_eq!(resolver.resolve(REF).unwrap(), Some(tip));
        assert_eq!(store.ref_reads(), 0);

        scope.clear();
        assert_eq!(scope.cached_refs(), 0);
        assert_eq!(resolver.resolve(REF).unwrap(), None);
    }
}
