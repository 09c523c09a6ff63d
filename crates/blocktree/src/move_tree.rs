//! Per-space parent back-edge graph used to reject cycle-creating moves
//! before any store mutation happens. Grounded in
//! `original_source/blocktree.go`'s `MoveTree`.

use std::collections::{HashMap, HashSet};

use blocktree_types::{BlockId, Error, Result, SpaceId};
use tracing::debug;

/// Transient `child -> parent` graph. Only structural edges are tracked;
/// link edges never enter a `MoveTree` and so never participate in cycle
/// detection (spec invariant 3).
#[derive(Debug)]
pub struct MoveTree {
    space_id: SpaceId,
    known: HashSet<BlockId>,
    back_edges: HashMap<BlockId, BlockId>,
}

impl MoveTree {
    pub fn new(space_id: SpaceId) -> Self {
        let mut known = HashSet::new();
        known.insert(space_id.into());
        Self {
            space_id,
            known,
            back_edges: HashMap::new(),
        }
    }

    /// Record a parent/child edge without checking for cycles. Used to
    /// seed the tree from the store's ancestor edges before any `move_to`
    /// calls are simulated.
    pub fn add_edge(&mut self, child: BlockId, parent: BlockId) {
        self.known.insert(child);
        self.known.insert(parent);
        self.back_edges.insert(child, parent);
    }

    pub fn contains(&self, block: BlockId) -> bool {
        self.known.contains(&block)
    }

    pub fn parent_of(&self, block: BlockId) -> Option<BlockId> {
        self.back_edges.get(&block).copied()
    }

    /// Attempts to move `child` under `new_parent`, failing rather than
    /// creating a cycle. No-op if `child` is already parented there.
    pub fn move_to(&mut self, child: BlockId, new_parent: BlockId) -> Result<()> {
        let space_block: BlockId = self.space_id.into();

        if child == space_block {
            return Err(Error::InvalidOp("cannot move the space's root block".into()));
        }
        if child == new_parent {
            return Err(Error::InvalidOp("cannot move a block under itself".into()));
        }
        if !self.known.contains(&child) {
            return Err(Error::Conflict(format!("child block {child} not found")));
        }
        if !self.known.contains(&new_parent) {
            return Err(Error::Conflict(format!("parent block {new_parent} not found")));
        }

        if self.back_edges.get(&child) == Some(&new_parent) {
            return Ok(());
        }

        let mut cursor = new_parent;
        let mut visited = HashSet::new();
        visited.insert(cursor);
        loop {
            let Some(&next) = self.back_edges.get(&cursor) else {
                break;
            };
            if next == space_block {
                break;
            }
            if next == child {
                debug!(%child, %new_parent, "move rejected: creates cycle");
                return Err(Error::CreatesCycle);
            }
            if visited.contains(&next) {
                debug!(%child, %new_parent, "move rejected: pre-existing cycle detected");
                return Err(Error::DetectedCycle);
            }
            visited.insert(next);
            cursor = next;
        }

        self.back_edges.remove(&child);
        self.add_edge(child, new_parent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<BlockId> {
        (0..n).map(|_| BlockId::new()).collect()
    }

    #[test]
    fn move_to_new_parent_succeeds() {
        let space = SpaceId::new();
        let b = ids(3);
        let mut tree = MoveTree::new(space);
        tree.add_edge(b[0], space.into());
        tree.add_edge(b[1], space.into());
        tree.add_edge(b[2], b[0]);

        tree.move_to(b[2], b[1]).unwrap();
        assert_eq!(tree.parent_of(b[2]), Some(b[1]));
    }

    #[test]
    fn move_under_own_descendant_creates_cycle() {
        let space = SpaceId::new();
        let b = ids(3);
        let mut tree = MoveTree::new(space);
        tree.add_edge(b[0], space.into());
        tree.add_edge(b[1], b[0]);
        tree.add_edge(b[2], b[1]);

        assert!(matches!(tree.move_to(b[0], b[2]), Err(Error::CreatesCycle)));
    }

    #[test]
    fn move_to_self_rejected() {
        let space = SpaceId::new();
        let b = ids(1);
        let mut tree = MoveTree::new(space);
        tree.add_edge(b[0], space.into());
        assert!(tree.move_to(b[0], b[0]).is_err());
    }

    #[test]
    fn move_to_current_parent_is_noop() {
        let space = SpaceId::new();
        let b = ids(2);
        let mut tree = MoveTree::new(space);
        tree.add_edge(b[0], space.into());
        tree.add_edge(b[1], b[0]);
        tree.move_to(b[1], b[0]).unwrap();
        assert_eq!(tree.parent_of(b[1]), Some(b[0]));
    }
}
