//! # Workspace Facade
//!
//! Wires the shared cache, per-scope loaders, per-entity savers, and the
//! process-wide command log together behind one handle. No logic of its
//! own beyond bookkeeping; the presentation layer registers one fetch and
//! one persist collaborator per entity kind up front, then asks for
//! loaders and savers as nodes come into view.

use crate::cache::{scope_key, shared_cache, CacheConfig, SharedCache};
use crate::loader::{FetchCollaborator, ScopeLoader};
use crate::saver::{DebouncedSaver, PersistCollaborator, SaverConfig};
use crate::undo::{shared_command_log, SharedCommandLog};
use crate::visibility::{project, VisibleTree};
use corkboard_common::{CommonError, CommonResult, EntityKind, ExpansionState, Node, NodeId};
use std::collections::HashMap;
use std::sync::Arc;

/// One workspace session: shared cache, loaders, savers, command log.
pub struct Workspace {
    cache: SharedCache,
    saver_config: SaverConfig,
    fetchers: HashMap<EntityKind, Arc<dyn FetchCollaborator>>,
    persisters: HashMap<EntityKind, Arc<dyn PersistCollaborator>>,
    loaders: HashMap<String, Arc<ScopeLoader>>,
    savers: HashMap<String, Arc<DebouncedSaver>>,
    command_log: SharedCommandLog,
}

impl Workspace {
    pub fn new(cache_config: CacheConfig, saver_config: SaverConfig) -> Self {
        Self {
            cache: shared_cache(cache_config),
            saver_config,
            fetchers: HashMap::new(),
            persisters: HashMap::new(),
            loaders: HashMap::new(),
            savers: HashMap::new(),
            command_log: shared_command_log(),
        }
    }

    /// Register the storage read collaborator for one entity kind.
    pub fn register_fetcher(&mut self, kind: EntityKind, fetcher: Arc<dyn FetchCollaborator>) {
        self.fetchers.insert(kind, fetcher);
    }

    /// Register the storage write collaborator for one entity kind.
    pub fn register_persister(
        &mut self,
        kind: EntityKind,
        persister: Arc<dyn PersistCollaborator>,
    ) {
        self.persisters.insert(kind, persister);
    }

    /// The loader for one scope's children, created on first request.
    pub fn loader(&mut self, kind: EntityKind, scope: &NodeId) -> CommonResult<Arc<ScopeLoader>> {
        let key = scope_key(kind, scope);
        if let Some(loader) = self.loaders.get(&key) {
            return Ok(loader.clone());
        }
        let fetcher = self
            .fetchers
            .get(&kind)
            .cloned()
            .ok_or_else(|| CommonError::NotRegistered(format!("fetcher for {}", kind)))?;
        let loader = Arc::new(ScopeLoader::new(
            kind,
            scope.clone(),
            fetcher,
            self.cache.clone(),
        ));
        self.loaders.insert(key, loader.clone());
        Ok(loader)
    }

    /// The saver for one entity, created on first request.
    pub fn saver(&mut self, kind: EntityKind, id: &NodeId) -> CommonResult<Arc<DebouncedSaver>> {
        let key = scope_key(kind, id);
        if let Some(saver) = self.savers.get(&key) {
            return Ok(saver.clone());
        }
        let persister = self
            .persisters
            .get(&kind)
            .cloned()
            .ok_or_else(|| CommonError::NotRegistered(format!("persister for {}", kind)))?;
        let saver = Arc::new(DebouncedSaver::new(
            id.clone(),
            persister,
            self.saver_config,
        ));
        self.savers.insert(key, saver.clone());
        Ok(saver)
    }

    /// Visible-subset query over the full flat collections.
    pub fn project(
        &self,
        folders: &[Node],
        stacks: &[Node],
        cards: &[Node],
        expansion: &ExpansionState,
    ) -> VisibleTree {
        project(folders, stacks, cards, expansion)
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    pub fn command_log(&self) -> SharedCommandLog {
        self.command_log.clone()
    }

    /// End-of-session teardown: drop cached data, history, and the loader
    /// and saver instances.
    pub async fn clear_session(&mut self) {
        self.cache.lock().unwrap().clear();
        self.command_log.lock().await.clear();
        self.loaders.clear();
        self.savers.clear();
    }
}
