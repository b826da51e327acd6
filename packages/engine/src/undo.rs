//! # Command Log
//!
//! Process-wide ordered history of reversible actions plus a redo stack.
//!
//! ## Design
//!
//! - History entries are pure records; the reversing logic lives in a
//!   registry keyed by `undo:{kind}:{entity_kind}:{entity_id}` (and the
//!   `redo:` twin), so the log stays serializable and decoupled from
//!   execution
//! - Undo moves the entry to the redo stack; redo moves it back
//! - Any new push clears the redo stack and trims history to the cap
//! - A missing or failing inverse is an expected, recoverable condition:
//!   the operation reports `false` and the log is left as it was
//!
//! Presentation components re-register their inverses on mount, since the
//! callbacks capture live state; re-registration overwrites by key.

use chrono::{DateTime, Utc};
use corkboard_common::{CommonResult, EntityKind, NodeId};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a history entry did to its entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

/// Pure history record of one reversible action.
#[derive(Clone, Debug)]
pub struct UndoAction {
    pub kind: ActionKind,
    pub entity_kind: EntityKind,
    pub entity_id: NodeId,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl UndoAction {
    pub fn new(
        kind: ActionKind,
        entity_kind: EntityKind,
        entity_id: impl Into<NodeId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity_kind,
            entity_id: entity_id.into(),
            timestamp: Utc::now(),
            description: description.into(),
        }
    }
}

/// Registered reversal callback; receives the record it reverses.
pub type InverseFn = Arc<dyn Fn(&UndoAction) -> BoxFuture<'static, CommonResult<()>> + Send + Sync>;

/// Bounded undo/redo history with an inverse-operation registry.
pub struct CommandLog {
    history: Vec<UndoAction>,
    redo_stack: Vec<UndoAction>,
    registry: HashMap<String, InverseFn>,
    max_entries: usize,
}

impl CommandLog {
    /// Create a command log with the default history cap (50).
    pub fn new() -> Self {
        Self::with_max_entries(50)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            history: Vec::new(),
            redo_stack: Vec::new(),
            registry: HashMap::new(),
            max_entries,
        }
    }

    /// Registry key for reversing `action`.
    pub fn undo_key(action: &UndoAction) -> String {
        Self::composite_key("undo", action)
    }

    /// Registry key for re-applying `action`.
    pub fn redo_key(action: &UndoAction) -> String {
        Self::composite_key("redo", action)
    }

    fn composite_key(direction: &str, action: &UndoAction) -> String {
        format!(
            "{}:{}:{}:{}",
            direction,
            action.kind.as_str(),
            action.entity_kind.as_str(),
            action.entity_id
        )
    }

    /// Register (or overwrite) the callback behind a composite key.
    pub fn register_inverse(&mut self, key: impl Into<String>, inverse: InverseFn) {
        self.registry.insert(key.into(), inverse);
    }

    /// Append a new action; clears the redo stack and trims history.
    pub fn push(&mut self, action: UndoAction) {
        debug!(
            kind = action.kind.as_str(),
            entity = %action.entity_id,
            "recording action"
        );
        self.history.push(action);
        if self.max_entries > 0 && self.history.len() > self.max_entries {
            self.history.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Reverse the most recent action.
    ///
    /// Returns `false` when there is nothing to undo, no inverse is
    /// registered for the entry, or the inverse fails; in every `false`
    /// case the log is unchanged from the caller's perspective.
    pub async fn undo(&mut self) -> bool {
        let action = match self.history.pop() {
            Some(action) => action,
            None => return false,
        };
        let key = Self::undo_key(&action);
        let inverse = match self.registry.get(&key) {
            Some(inverse) => inverse.clone(),
            None => {
                debug!(key, "no inverse registered");
                self.history.push(action);
                return false;
            }
        };

        match inverse(&action).await {
            Ok(()) => {
                self.redo_stack.push(action);
                true
            }
            Err(err) => {
                warn!(key, error = %err, "undo failed, restoring history entry");
                self.history.push(action);
                false
            }
        }
    }

    /// Re-apply the most recently undone action. Symmetric with [`undo`].
    ///
    /// [`undo`]: CommandLog::undo
    pub async fn redo(&mut self) -> bool {
        let action = match self.redo_stack.pop() {
            Some(action) => action,
            None => return false,
        };
        let key = Self::redo_key(&action);
        let reapply = match self.registry.get(&key) {
            Some(reapply) => reapply.clone(),
            None => {
                debug!(key, "no redo handler registered");
                self.redo_stack.push(action);
                return false;
            }
        };

        match reapply(&action).await {
            Ok(()) => {
                self.history.push(action);
                true
            }
            Err(err) => {
                warn!(key, error = %err, "redo failed, restoring redo entry");
                self.redo_stack.push(action);
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Label for the next undo operation, for menus.
    pub fn undo_description(&self) -> Option<&str> {
        self.history.last().map(|action| action.description.as_str())
    }

    /// Label for the next redo operation.
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|action| action.description.as_str())
    }

    /// Drop all history, redo entries, and registrations. Call on session
    /// end.
    pub fn clear(&mut self) {
        self.history.clear();
        self.redo_stack.clear();
        self.registry.clear();
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

/// The single process-wide command log instance, shared across entities.
pub type SharedCommandLog = Arc<tokio::sync::Mutex<CommandLog>>;

pub fn shared_command_log() -> SharedCommandLog {
    Arc::new(tokio::sync::Mutex::new(CommandLog::new()))
}
