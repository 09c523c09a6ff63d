use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::fractional_index::FractionalIndex;
use crate::ids::BlockId;
/// One link/unlink side-effect recorded by the stage table.
///
/// `index` is the position assigned under `parent_id` specifically; a
/// linked block keeps its own `Block::index` for its true structural
/// parent, and gets a second, independent position for each parent it is
/// linked under (spec §4.3's children map entries are keyed per-parent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOp {
    pub parent_id: BlockId,
    pub child_id: BlockId,
    pub kind: LinkOpKind,
    pub index: Option<FractionalIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOpKind {
    Link,
    Unlink,
}

/// The typed change set one transaction's staging phase produces.
///
/// Four disjoint block-reference sets plus link ops and a children-changed
/// set, per spec §4.3. `Store::apply` consumes this to mutate the space
/// atomically.
#[derive(Debug, Clone, Default)]
pub struct BlockChange {
    pub inserted: Vec<Block>,
    pub updated: Vec<Block>,
    pub prop_set: Vec<Block>,
    pub patched: Vec<Block>,
    pub link_ops: Vec<LinkOp>,
    pub children_changed: BTreeSet<BlockId>,
}

impl BlockChange {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.updated.is_empty()
            && self.prop_set.is_empty()
            && self.patched.is_empty()
            && self.link_ops.is_empty()
    }
}

/// A four-... in spec prose, five-in-practice set digest of one or more
/// applied transactions (spec §6): which blocks' ordering, content, or
/// properties changed. `Api::apply` accumulates one of these across a
/// whole batch; `Store::apply` produces one per transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub children_changed: BTreeSet<BlockId>,
    pub inserted: BTreeSet<BlockId>,
    pub updated: BTreeSet<BlockId>,
    pub props_changed: BTreeSet<BlockId>,
    pub patched: BTreeSet<BlockId>,
}

impl SyncSummary {
    pub fn extend(&mut self, other: &SyncSummary) {
        self.children_changed.extend(other.children_changed.iter().copied());
        self.inserted.extend(other.inserted.iter().copied());
        self.updated.extend(other.updated.iter().copied());
        self.props_changed.extend(other.props_changed.iter().copied());
        self.patched.extend(other.patched.iter().copied());
    }
}

impl From<&BlockChange> for SyncSummary {
    fn from(change: &BlockChange) -> Self {
        SyncSummary {
            children_changed: change.children_changed.clone(),
            inserted: change.inserted.iter().map(|b| b.id).collect(),
            updated: change.updated.iter().map(|b| b.id).collect(),
            props_changed: change.prop_set.iter().map(|b| b.id).collect(),
            patched: change.patched.iter().map(|b| b.id).collect(),
        }
    }
}
