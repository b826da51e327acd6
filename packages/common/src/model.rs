//! # Content Model
//!
//! The four-level content hierarchy shared by every corkboard component:
//!
//! ```text
//! Binder (top-level container)
//!   └─ Folder (sub-container)
//!        └─ Stack (leaf-group)
//!             └─ Card (leaf)
//! ```
//!
//! Nodes reference their parent by id; the parent always lives exactly one
//! level up, so the hierarchy cannot contain cycles.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Opaque node identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Hierarchy level, strictly ordered top → leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Binder,
    Folder,
    Stack,
    Card,
}

impl Level {
    /// The level one step down, if any.
    pub fn child(self) -> Option<Level> {
        match self {
            Level::Binder => Some(Level::Folder),
            Level::Folder => Some(Level::Stack),
            Level::Stack => Some(Level::Card),
            Level::Card => None,
        }
    }

    /// The level one step up, if any.
    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Binder => None,
            Level::Folder => Some(Level::Binder),
            Level::Stack => Some(Level::Folder),
            Level::Card => Some(Level::Stack),
        }
    }
}

/// Persistable entity kinds, one per hierarchy level.
///
/// Provides the stable string used in cache keys and undo registry keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Binder,
    Folder,
    Stack,
    Card,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Binder => "binder",
            EntityKind::Folder => "folder",
            EntityKind::Stack => "stack",
            EntityKind::Card => "card",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            EntityKind::Binder => Level::Binder,
            EntityKind::Folder => Level::Folder,
            EntityKind::Stack => Level::Stack,
            EntityKind::Card => Level::Card,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity at a level of the content hierarchy.
///
/// `parent_id` references a node at exactly the next-higher level; `None`
/// only for binders. `order_index` defines sibling order; duplicates are
/// allowed, ties break on id so ordering stays comparison-stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub level: Level,
    pub order_index: i64,
    pub title: String,
    /// Leaf content; empty for container levels.
    #[serde(default)]
    pub body: String,
}

impl Node {
    pub fn new(
        id: impl Into<NodeId>,
        parent_id: Option<NodeId>,
        level: Level,
        order_index: i64,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            level,
            order_index,
            title: title.into(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// Which nodes the presentation layer currently has open, per level.
///
/// Owned and mutated by the presentation layer only; the engine reads it.
/// A node's children are visible iff its id is in the set for its level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpansionState {
    pub binders: HashSet<NodeId>,
    pub folders: HashSet<NodeId>,
    pub stacks: HashSet<NodeId>,
}

impl ExpansionState {
    pub fn is_expanded(&self, level: Level, id: &NodeId) -> bool {
        match level {
            Level::Binder => self.binders.contains(id),
            Level::Folder => self.folders.contains(id),
            Level::Stack => self.stacks.contains(id),
            Level::Card => false,
        }
    }
}
