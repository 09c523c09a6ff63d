use serde::{Deserialize, Serialize};

use crate::fractional_index::FractionalIndex;
use crate::ids::{BlockId, SpaceId};

/// Type tag reserved for a space's synthetic root block.
pub const SPACE_TYPE: &str = "space";

/// A node in a space's block forest.
///
/// `parent_id` equals the owning space's id for top-level blocks, and the
/// root sentinel (`ids::root_sentinel`) for the space block itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub parent_id: BlockId,
    /// Short type tag, e.g. "page", "para"; "space" is reserved for roots.
    pub block_type: String,
    /// Namespace string carried through from the insert op.
    pub table: String,
    pub index: FractionalIndex,
    /// Arbitrary JSON properties document (RFC-6902 patchable).
    pub props: Option<serde_json::Value>,
    /// Arbitrary JSON content document (RFC-6902 patchable).
    pub content: Option<serde_json::Value>,
    pub deleted: bool,
    pub erased: bool,
    /// True when this block is a *link* reference rather than a structural
    /// child: excluded from ordering/cycle invariants, allowed to share a
    /// fractional index with a structural sibling.
    pub linked: bool,
}

impl Block {
    pub fn new(id: BlockId, parent_id: BlockId, block_type: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            block_type: block_type.into(),
            table: String::new(),
            index: FractionalIndex::default_index(),
            props: None,
            content: None,
            deleted: false,
            erased: false,
            linked: false,
        }
    }

    pub fn new_space(space_id: SpaceId) -> Self {
        let mut block = Self::new(space_id.into(), crate::ids::root_sentinel(), SPACE_TYPE);
        block.table = SPACE_TYPE.to_string();
        block
    }

    /// Sort key for structural siblings: `(fractional index, id)`, per
    /// invariant 2. Link entries never participate in this ordering.
    pub fn sort_key(&self) -> (FractionalIndex, BlockId) {
        (self.index.clone(), self.id)
    }
}
