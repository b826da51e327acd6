//! # Corkboard Engine
//!
//! Client-side state management for a four-level content tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ presentation layer: expansion state, edits  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ engine: visibility + lazy state management  │
//! │  - project the visible subset of the tree   │
//! │  - load child collections on first exposure │
//! │  - coalesce edit bursts into one persist    │
//! │  - record every action for undo/redo        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ storage collaborators: fetch + persist      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Fetch only what is visible**: the full tree is never materialized
//! 2. **Optimistic clients**: callers update local state first; the engine
//!    owns eventual, serialized persistence
//! 3. **One in-flight write per entity**: bursts coalesce, completions
//!    re-issue with the newest superseded payload
//! 4. **Everything reversible**: create/update/delete go through the
//!    command log; inverse operations are registered, not hard-coded
//!
//! ## Usage
//!
//! ```rust,ignore
//! use corkboard_engine::{CacheConfig, SaverConfig, Workspace};
//! use corkboard_common::{EntityKind, NodeId};
//!
//! let mut workspace = Workspace::new(CacheConfig::default(), SaverConfig::default());
//! workspace.register_fetcher(EntityKind::Card, remote_fetcher);
//! workspace.register_persister(EntityKind::Card, remote_persister);
//!
//! // A stack scrolled into view: load its cards.
//! let loader = workspace.loader(EntityKind::Card, &stack_id)?;
//! loader.set_visible(true);
//!
//! // The user types into a card: coalesce and persist.
//! let saver = workspace.saver(EntityKind::Card, &card_id)?;
//! saver.notify(serde_json::json!({ "body": "It was a dark..." }));
//! ```

pub mod cache;
pub mod errors;
pub mod loader;
pub mod saver;
pub mod undo;
pub mod visibility;
pub mod workspace;

pub use cache::{scope_key, shared_cache, CacheConfig, SharedCache, TimedCache};
pub use errors::{FetchError, PersistError};
pub use loader::{FetchCollaborator, LoadPhase, ScopeLoader};
pub use saver::{DebouncedSaver, PersistCollaborator, SaveStatus, SaverConfig};
pub use undo::{
    shared_command_log, ActionKind, CommandLog, InverseFn, SharedCommandLog, UndoAction,
};
pub use visibility::{project, VisibleTree};
pub use workspace::Workspace;

// Re-export the model for convenience
pub use corkboard_common::{EntityKind, ExpansionState, Level, Node, NodeId};
