//! # Lazy Fetch Controller
//!
//! One `ScopeLoader` per (entity kind, scope id) watches a visibility flag
//! and loads the scope's child collection on first exposure.
//!
//! ## State machine
//!
//! ```text
//! Idle ──visible──▶ Loading ──ok──▶ Loaded
//!   ▲                  │ └──err──▶ Errored ──visible/reload──▶ Loading
//!   └────hidden────────┘
//! ```
//!
//! - A cache hit on `scope_key` short-circuits Idle → Loaded without
//!   touching the fetch collaborator
//! - Hiding a Loading scope cancels the in-flight fetch by bumping the
//!   epoch; the late resolution is discarded and never writes the cache
//! - Loaded survives visibility toggles; `invalidate()` clears the cache
//!   entry and returns to Idle so the next exposure refetches
//! - Errors are retained for display and retried only on the next
//!   Idle/Errored → Loading transition, never in a loop

use crate::cache::{scope_key, SharedCache};
use crate::errors::FetchError;
use async_trait::async_trait;
use corkboard_common::{EntityKind, Node, NodeId};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Storage read collaborator: fetches the child collection of one scope.
///
/// Must be idempotent; the engine may call it repeatedly for the same id.
#[async_trait]
pub trait FetchCollaborator: Send + Sync {
    async fn fetch(&self, scope: &NodeId) -> Result<Vec<Node>, FetchError>;
}

/// Loader phase, published through a watch channel for UI subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Errored(FetchError),
}

struct LoaderInner {
    phase: LoadPhase,
    /// Bumped to cancel whatever fetch is outstanding.
    epoch: u64,
    visible: bool,
    value: Option<Vec<Node>>,
}

/// Visibility-driven loader for one scope's child collection.
pub struct ScopeLoader {
    kind: EntityKind,
    scope: NodeId,
    key: String,
    fetcher: Arc<dyn FetchCollaborator>,
    cache: SharedCache,
    inner: Arc<Mutex<LoaderInner>>,
    phase_tx: Arc<watch::Sender<LoadPhase>>,
}

impl ScopeLoader {
    pub fn new(
        kind: EntityKind,
        scope: NodeId,
        fetcher: Arc<dyn FetchCollaborator>,
        cache: SharedCache,
    ) -> Self {
        let (phase_tx, _) = watch::channel(LoadPhase::Idle);
        let key = scope_key(kind, &scope);
        Self {
            kind,
            scope,
            key,
            fetcher,
            cache,
            inner: Arc::new(Mutex::new(LoaderInner {
                phase: LoadPhase::Idle,
                epoch: 0,
                visible: false,
                value: None,
            })),
            phase_tx: Arc::new(phase_tx),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn scope(&self) -> &NodeId {
        &self.scope
    }

    /// Current phase snapshot.
    pub fn phase(&self) -> LoadPhase {
        self.inner.lock().unwrap().phase.clone()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoadPhase> {
        self.phase_tx.subscribe()
    }

    /// The loaded collection, if any.
    pub fn value(&self) -> Option<Vec<Node>> {
        self.inner.lock().unwrap().value.clone()
    }

    /// The retained fetch error, if the loader is in `Errored`.
    pub fn error(&self) -> Option<FetchError> {
        match self.phase() {
            LoadPhase::Errored(err) => Some(err),
            _ => None,
        }
    }

    /// Flip the visibility flag supplied by the presentation layer.
    pub fn set_visible(&self, visible: bool) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.visible = visible;
        }
        if visible {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    /// Clear the cached collection and return to Idle; the next exposure
    /// refetches.
    pub fn invalidate(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.epoch += 1;
            inner.phase = LoadPhase::Idle;
            inner.value = None;
        }
        self.cache.lock().unwrap().remove(&self.key);
        self.publish(LoadPhase::Idle);
    }

    /// Invalidate and, if currently visible, refetch immediately.
    pub fn reload(&self) {
        self.invalidate();
        let visible = self.inner.lock().unwrap().visible;
        if visible {
            self.activate();
        }
    }

    fn activate(&self) {
        let epoch = {
            let mut inner = self.inner.lock().unwrap();
            match inner.phase {
                // A fetch is already outstanding or done; nothing to do.
                LoadPhase::Loading | LoadPhase::Loaded => return,
                LoadPhase::Idle | LoadPhase::Errored(_) => {}
            }

            if let Some(nodes) = self.cache.lock().unwrap().get(&self.key) {
                debug!(scope = %self.scope, kind = %self.kind, "cache hit, skipping fetch");
                inner.value = Some(nodes);
                inner.phase = LoadPhase::Loaded;
                drop(inner);
                self.publish(LoadPhase::Loaded);
                return;
            }

            inner.epoch += 1;
            inner.phase = LoadPhase::Loading;
            inner.epoch
        };
        self.publish(LoadPhase::Loading);
        debug!(scope = %self.scope, kind = %self.kind, "fetching children");

        let fetcher = self.fetcher.clone();
        let scope = self.scope.clone();
        let key = self.key.clone();
        let cache = self.cache.clone();
        let inner = self.inner.clone();
        let phase_tx = self.phase_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&scope).await;
            let phase = {
                let mut guard = inner.lock().unwrap();
                if guard.epoch != epoch || guard.phase != LoadPhase::Loading {
                    // Visibility was revoked or the loader was invalidated
                    // while the fetch was outstanding; discard silently.
                    debug!(scope = %scope, "discarding cancelled fetch");
                    return;
                }
                match result {
                    Ok(nodes) => {
                        cache.lock().unwrap().set(key, nodes.clone());
                        guard.value = Some(nodes);
                        guard.phase = LoadPhase::Loaded;
                    }
                    Err(err) => {
                        warn!(scope = %scope, error = %err, "fetch failed");
                        guard.phase = LoadPhase::Errored(err);
                    }
                }
                guard.phase.clone()
            };
            let _ = phase_tx.send(phase);
        });
    }

    fn deactivate(&self) {
        let cancelled = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase == LoadPhase::Loading {
                inner.epoch += 1;
                inner.phase = LoadPhase::Idle;
                true
            } else {
                // Loaded stays Loaded; Errored keeps its error for display.
                false
            }
        };
        if cancelled {
            self.publish(LoadPhase::Idle);
        }
    }

    fn publish(&self, phase: LoadPhase) {
        let _ = self.phase_tx.send(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared_cache, CacheConfig};
    use corkboard_common::Level;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedFetcher {
        delay: Duration,
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedFetcher {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(10),
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchCollaborator for ScriptedFetcher {
        async fn fetch(&self, scope: &NodeId) -> Result<Vec<Node>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(FetchError::Storage("disk on fire".to_string()));
            }
            Ok(vec![Node::new(
                format!("{}-child", scope),
                Some(scope.clone()),
                Level::Card,
                0,
                "child",
            )])
        }
    }

    fn loader_with(fetcher: Arc<ScriptedFetcher>) -> ScopeLoader {
        ScopeLoader::new(
            EntityKind::Card,
            NodeId::from("s1"),
            fetcher,
            shared_cache(CacheConfig::default()),
        )
    }

    async fn wait_for(loader: &ScopeLoader, expected: LoadPhase) {
        let mut rx = loader.subscribe();
        rx.wait_for(|phase| *phase == expected).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_visibility_fetches_once() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(50));
        let loader = loader_with(fetcher.clone());
        assert_eq!(loader.phase(), LoadPhase::Idle);

        loader.set_visible(true);
        assert_eq!(loader.phase(), LoadPhase::Loading);

        // Repeated visibility-true while Loading is a no-op.
        loader.set_visible(true);
        loader.set_visible(true);

        wait_for(&loader, LoadPhase::Loaded).await;
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(loader.value().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_survives_visibility_toggles() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(10));
        let loader = loader_with(fetcher.clone());

        loader.set_visible(true);
        wait_for(&loader, LoadPhase::Loaded).await;

        loader.set_visible(false);
        assert_eq!(loader.phase(), LoadPhase::Loaded);
        loader.set_visible(true);
        assert_eq!(loader.phase(), LoadPhase::Loaded);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hiding_cancels_inflight_fetch() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(100));
        let cache = shared_cache(CacheConfig::default());
        let loader = ScopeLoader::new(
            EntityKind::Card,
            NodeId::from("s1"),
            fetcher.clone(),
            cache.clone(),
        );

        loader.set_visible(true);
        loader.set_visible(false);
        assert_eq!(loader.phase(), LoadPhase::Idle);

        // Let the abandoned fetch resolve; its result must be discarded.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(loader.phase(), LoadPhase::Idle);
        assert_eq!(loader.value(), None);
        assert!(cache.lock().unwrap().is_empty());

        // Re-exposing issues a fresh fetch.
        loader.set_visible(true);
        wait_for(&loader, LoadPhase::Loaded).await;
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_collaborator() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(10));
        let cache = shared_cache(CacheConfig::default());
        cache.lock().unwrap().set(
            scope_key(EntityKind::Card, &NodeId::from("s1")),
            vec![Node::new("c1", Some(NodeId::from("s1")), Level::Card, 0, "cached")],
        );
        let loader = ScopeLoader::new(
            EntityKind::Card,
            NodeId::from("s1"),
            fetcher.clone(),
            cache,
        );

        loader.set_visible(true);
        assert_eq!(loader.phase(), LoadPhase::Loaded);
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(loader.value().unwrap()[0].title, "cached");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_retained_until_reload() {
        let fetcher = ScriptedFetcher::failing();
        let loader = loader_with(fetcher.clone());

        loader.set_visible(true);
        let mut rx = loader.subscribe();
        rx.wait_for(|phase| matches!(phase, LoadPhase::Errored(_)))
            .await
            .unwrap();
        assert!(loader.error().is_some());
        assert_eq!(fetcher.call_count(), 1);

        // Hiding keeps the error around for display.
        loader.set_visible(false);
        assert!(loader.error().is_some());

        // Re-exposing retries.
        loader.set_visible(true);
        assert_eq!(loader.phase(), LoadPhase::Loading);
        rx.wait_for(|phase| matches!(phase, LoadPhase::Errored(_)))
            .await
            .unwrap();
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(10));
        let cache = shared_cache(CacheConfig::default());
        let loader = ScopeLoader::new(
            EntityKind::Card,
            NodeId::from("s1"),
            fetcher.clone(),
            cache.clone(),
        );

        loader.set_visible(true);
        wait_for(&loader, LoadPhase::Loaded).await;
        assert_eq!(cache.lock().unwrap().len(), 1);

        loader.invalidate();
        assert_eq!(loader.phase(), LoadPhase::Idle);
        assert_eq!(loader.value(), None);
        assert!(cache.lock().unwrap().is_empty());

        loader.set_visible(true);
        wait_for(&loader, LoadPhase::Loaded).await;
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_refetches_while_visible() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(10));
        let loader = loader_with(fetcher.clone());

        loader.set_visible(true);
        wait_for(&loader, LoadPhase::Loaded).await;

        loader.reload();
        assert_eq!(loader.phase(), LoadPhase::Loading);
        wait_for(&loader, LoadPhase::Loaded).await;
        assert_eq!(fetcher.call_count(), 2);

        // Hidden loaders do not refetch on reload.
        loader.set_visible(false);
        loader.reload();
        assert_eq!(loader.phase(), LoadPhase::Idle);
        assert_eq!(fetcher.call_count(), 2);
    }
}
