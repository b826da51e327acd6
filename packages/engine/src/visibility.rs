//! # Visibility Projection
//!
//! Pure computation of the observable subset of the tree, given the full
//! flat collections and the presentation layer's expansion state. No
//! mutation, no caching; callers recompute on every expansion change.
//!
//! A node is visible iff its parent survived the previous stage and the
//! parent's id is in the expansion set for the parent's level. Each stage
//! is O(n) over its input.

use corkboard_common::{ExpansionState, Node, NodeId};
use std::collections::HashSet;

/// The currently observable subset of the tree, one list per level below
/// the binders. Lists are sorted by `(order_index, id)`, ready to render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleTree {
    pub folders: Vec<Node>,
    pub stacks: Vec<Node>,
    pub cards: Vec<Node>,
}

/// Compute the visible folders, stacks, and cards.
///
/// Expansion ids with no matching node are inert; they produce no extra
/// visible children and are not an error.
pub fn project(
    folders: &[Node],
    stacks: &[Node],
    cards: &[Node],
    expansion: &ExpansionState,
) -> VisibleTree {
    let visible_folders = filter_stage(folders, &expansion.binders, None);
    let folder_ids: HashSet<&NodeId> = visible_folders.iter().map(|n| &n.id).collect();

    let visible_stacks = filter_stage(stacks, &expansion.folders, Some(&folder_ids));
    let stack_ids: HashSet<&NodeId> = visible_stacks.iter().map(|n| &n.id).collect();

    let visible_cards = filter_stage(cards, &expansion.stacks, Some(&stack_ids));

    VisibleTree {
        folders: visible_folders,
        stacks: visible_stacks,
        cards: visible_cards,
    }
}

/// One projection stage: keep nodes whose parent is expanded and, past the
/// first stage, whose parent itself survived the stage above.
fn filter_stage(
    nodes: &[Node],
    expanded: &HashSet<NodeId>,
    surviving_parents: Option<&HashSet<&NodeId>>,
) -> Vec<Node> {
    let mut out: Vec<Node> = nodes
        .iter()
        .filter(|node| match &node.parent_id {
            Some(parent) => {
                expanded.contains(parent)
                    && surviving_parents.map_or(true, |ids| ids.contains(parent))
            }
            None => false,
        })
        .cloned()
        .collect();

    out.sort_by(|a, b| {
        a.order_index
            .cmp(&b.order_index)
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}
