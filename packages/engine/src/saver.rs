//! # Debounced Persistence Coordinator
//!
//! One `DebouncedSaver` per editable entity collapses a burst of change
//! notifications into a single deferred persist call, and serializes the
//! calls it does make: never more than one in flight per entity. A timer
//! fire that lands while a call is outstanding parks its payload in a
//! one-slot superseding mailbox; completion re-issues immediately with the
//! newest payload.
//!
//! Callers apply edits to their own state *before* `notify`; the saver owns
//! eventual persistence only, never presentation state.
//!
//! Status signal for UI feedback:
//!
//! ```text
//! Idle ──notify──▶ Pending ──persist ok──▶ Committed ──display window──▶ Idle
//!                     │ └──persist err──▶ Failed ──window / retry──▶ Idle | Pending
//! ```

use crate::errors::PersistError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_common::NodeId;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Storage write collaborator for one entity kind.
///
/// A later call for the same id fully supersedes an earlier one's intent.
#[async_trait]
pub trait PersistCollaborator: Send + Sync {
    async fn persist(&self, id: &NodeId, patch: &Value) -> Result<(), PersistError>;
}

/// Save status for UI feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Pending,
    Committed,
    Failed,
}

/// Saver construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct SaverConfig {
    /// Quiet period after the last notify before persisting.
    pub debounce: Duration,
    /// How long Committed/Failed stays visible before reverting to Idle.
    pub display_window: Duration,
    /// Re-issue a failed payload after this delay; `None` leaves re-notifying
    /// to the caller.
    pub retry: Option<Duration>,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            display_window: Duration::from_millis(2000),
            retry: None,
        }
    }
}

struct SaverState {
    /// Newest payload waiting for the debounce timer.
    latest: Option<Value>,
    /// Newest payload parked behind an in-flight persist call.
    superseding: Option<Value>,
    in_flight: bool,
    /// Bumped on every notify; a firing timer with a stale generation lost
    /// the race to a newer edit and does nothing.
    timer_gen: u64,
    /// Guards the display-window auto-revert against newer status changes.
    status_gen: u64,
    last_committed_at: Option<DateTime<Utc>>,
}

struct Shared {
    id: NodeId,
    persister: Arc<dyn PersistCollaborator>,
    config: SaverConfig,
    state: Mutex<SaverState>,
    status: watch::Sender<SaveStatus>,
}

/// Debounced, serialized persistence for one entity.
pub struct DebouncedSaver {
    shared: Arc<Shared>,
}

impl DebouncedSaver {
    pub fn new(id: NodeId, persister: Arc<dyn PersistCollaborator>, config: SaverConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                id,
                persister,
                config,
                state: Mutex::new(SaverState {
                    latest: None,
                    superseding: None,
                    in_flight: false,
                    timer_gen: 0,
                    status_gen: 0,
                    last_committed_at: None,
                }),
                status,
            }),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.shared.id
    }

    /// Record an edit and (re)start the debounce timer.
    ///
    /// Status flips to `Pending` on the first notify of a burst, so the UI
    /// can show "unsaved" immediately.
    pub fn notify(&self, payload: Value) {
        let gen = {
            let mut state = self.shared.state.lock().unwrap();
            state.latest = Some(payload);
            state.timer_gen += 1;
            state.timer_gen
        };
        Shared::set_status(&self.shared, SaveStatus::Pending);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.debounce).await;
            Shared::timer_elapsed(shared, gen).await;
        });
    }

    /// Persist immediately, bypassing the debounce window.
    ///
    /// Still respects the one-in-flight invariant: if a call is outstanding,
    /// the payload lands in the superseding slot instead.
    pub fn flush_now(&self, payload: Value) {
        let gen = {
            let mut state = self.shared.state.lock().unwrap();
            state.latest = Some(payload);
            // Cancel any pending timer; this edit goes out now.
            state.timer_gen += 1;
            state.timer_gen
        };
        Shared::set_status(&self.shared, SaveStatus::Pending);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            Shared::timer_elapsed(shared, gen).await;
        });
    }

    /// Drop any pending timer and un-persisted payload.
    ///
    /// An already in-flight call is not cancellable and runs to completion.
    pub fn cancel(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.timer_gen += 1;
            state.latest = None;
            state.superseding = None;
        }
        Shared::set_status(&self.shared, SaveStatus::Idle);
    }

    /// Current status snapshot.
    pub fn status(&self) -> SaveStatus {
        *self.shared.status.borrow()
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    /// When the most recent persist call succeeded, if ever.
    pub fn last_committed_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().unwrap().last_committed_at
    }
}

impl Shared {
    /// The debounce timer for generation `gen` elapsed.
    async fn timer_elapsed(shared: Arc<Shared>, gen: u64) {
        let payload = {
            let mut state = shared.state.lock().unwrap();
            if state.timer_gen != gen {
                // A newer notify restarted the window; that timer owns the
                // payload now.
                return;
            }
            let payload = match state.latest.take() {
                Some(payload) => payload,
                None => return,
            };
            if state.in_flight {
                debug!(id = %shared.id, "persist in flight, parking superseding payload");
                state.superseding = Some(payload);
                return;
            }
            state.in_flight = true;
            payload
        };
        Shared::run_persist(shared, payload).await;
    }

    /// Issue persist calls until the superseding slot stays empty.
    ///
    /// Boxed so the `timer_elapsed` → `run_persist` → spawned retry →
    /// `timer_elapsed` recursion has an explicitly `Send` future type.
    fn run_persist(shared: Arc<Shared>, first: Value) -> futures::future::BoxFuture<'static, ()> {
        Box::pin(async move {
        let mut payload = first;
        loop {
            let result = shared.persister.persist(&shared.id, &payload).await;
            let mut state = shared.state.lock().unwrap();
            match result {
                Ok(()) => {
                    state.last_committed_at = Some(Utc::now());
                    if let Some(next) = state.superseding.take() {
                        drop(state);
                        payload = next;
                        continue;
                    }
                    state.in_flight = false;
                    let burst_pending = state.latest.is_some();
                    drop(state);
                    debug!(id = %shared.id, "persist committed");
                    if !burst_pending {
                        // A fresh burst already flipped status back to
                        // Pending; only quiet savers show Committed.
                        Shared::set_status(&shared, SaveStatus::Committed);
                        Shared::schedule_revert(&shared);
                    }
                }
                Err(err) => {
                    state.in_flight = false;
                    warn!(id = %shared.id, error = %err, "persist failed");
                    match shared.config.retry {
                        Some(delay) if state.latest.is_none() => {
                            // Re-issue the same payload after the retry
                            // delay, unless a newer edit supersedes it first.
                            state.latest = Some(payload);
                            state.timer_gen += 1;
                            let gen = state.timer_gen;
                            drop(state);
                            Shared::set_status(&shared, SaveStatus::Failed);
                            let retry_shared = shared.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                Shared::timer_elapsed(retry_shared, gen).await;
                            });
                        }
                        _ => {
                            drop(state);
                            Shared::set_status(&shared, SaveStatus::Failed);
                            Shared::schedule_revert(&shared);
                        }
                    }
                }
            }
            break;
        }
        })
    }

    fn set_status(shared: &Arc<Shared>, status: SaveStatus) {
        shared.state.lock().unwrap().status_gen += 1;
        shared.status.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }

    /// Revert Committed/Failed to Idle once the display window passes,
    /// unless some newer transition got there first.
    fn schedule_revert(shared: &Arc<Shared>) {
        let gen = shared.state.lock().unwrap().status_gen;
        let shared = shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.display_window).await;
            let stale = shared.state.lock().unwrap().status_gen != gen;
            if !stale {
                Shared::set_status(&shared, SaveStatus::Idle);
            }
        });
    }
}
