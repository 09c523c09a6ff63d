//! Stage table: resolves where each op in a transaction lands before any
//! of it is committed to the store. Grounded in `original_source/blocktree.go`'s
//! `StageTable` and its `placeAtStart`/`placeAtEnd`/`placeBefore`/`placeAfter`
//! helpers.

use std::collections::HashMap;

use blocktree_types::{
    Block, BlockChange, BlockId, Error, FractionalIndex, JsonPatch, LinkOp, LinkOpKind, Pointer,
    Position, Result,
};
use tracing::trace;

/// Read-only view the stage table needs of blocks already committed to the
/// store, so it can place new or moved blocks among existing siblings.
/// Implemented by `crate::store::SpaceView` over a held read guard.
pub trait BlockSource {
    fn get(&self, id: BlockId) -> Option<Block>;

    /// Structural (non-linked) children of `parent_id`, ascending by sort key.
    fn children(&self, parent_id: BlockId) -> Vec<Block>;

    /// Every block currently linking `child_id` in as a child.
    fn linking_parents(&self, child_id: BlockId) -> Vec<BlockId>;
}

/// A pending insert or link whose reference block hasn't resolved yet,
/// either because it's still parked itself or hasn't arrived in this
/// transaction. Retried each pass over the parking lot until it resolves
/// or the transaction gives up.
#[derive(Debug, Clone)]
enum Parked {
    Insert {
        block_id: BlockId,
        table: String,
        block_type: String,
        linked: bool,
        at: Pointer,
        patch: Option<JsonPatch>,
    },
    Link {
        child_id: BlockId,
        at: Pointer,
    },
}

impl Parked {
    fn at(&self) -> &Pointer {
        match self {
            Parked::Insert { at, .. } => at,
            Parked::Link { at, .. } => at,
        }
    }
}

enum Placement {
    Resolved { parent_id: BlockId, index: FractionalIndex },
    Parked,
}

/// Accumulates one transaction's staged effects: blocks placed so far
/// (visible to later ops in the same transaction), a parking lot for
/// inserts/links whose reference hasn't resolved yet, and the resulting
/// change record.
#[derive(Debug, Default)]
pub struct StageTable {
    resident: HashMap<BlockId, Block>,
    parking_lot: HashMap<BlockId, Parked>,
    change: BlockChange,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_change(self) -> Result<BlockChange> {
        if !self.parking_lot.is_empty() {
            let stuck: Vec<String> = self.parking_lot.keys().map(|id| id.to_string()).collect();
            return Err(Error::InvalidOp(format!(
                "unresolved placement reference(s): {}",
                stuck.join(", ")
            )));
        }
        Ok(self.change)
    }

    fn sibling_indices(&self, source: &dyn BlockSource, parent_id: BlockId) -> Vec<(FractionalIndex, BlockId)> {
        let mut seen = std::collections::HashSet::new();
        let mut keys: Vec<(FractionalIndex, BlockId)> = Vec::new();

        for block in self.resident.values() {
            if block.parent_id == parent_id && !block.linked {
                seen.insert(block.id);
                keys.push(block.sort_key());
            }
        }
        for block in source.children(parent_id) {
            if !block.linked && seen.insert(block.id) {
                keys.push(block.sort_key());
            }
        }
        keys.sort();
        keys
    }

    fn resident_or_source(&self, source: &dyn BlockSource, id: BlockId) -> Option<Block> {
        self.resident.get(&id).cloned().or_else(|| source.get(id))
    }

    fn resolve_placement(&self, source: &dyn BlockSource, at: &Pointer) -> Result<Placement> {
        match at.position {
            Position::Start | Position::End | Position::Inside => {
                let parent_id = at.block_id;
                if self.resident_or_source(source, parent_id).is_none() {
                    return Ok(Placement::Parked);
                }
                let siblings = self.sibling_indices(source, parent_id);
                let index = match at.position {
                    Position::Start => place_at_start(&siblings),
                    _ => place_at_end(&siblings),
                };
                Ok(Placement::Resolved { parent_id, index })
            }
            Position::Before | Position::After => {
                let reference = match self.resident_or_source(source, at.block_id) {
                    Some(b) => b,
                    None => return Ok(Placement::Parked),
                };
                let parent_id = reference.parent_id;
                let siblings = self.sibling_indices(source, parent_id);
                let index = if at.position == Position::Before {
                    place_before(&siblings, at.block_id)?
                } else {
                    place_after(&siblings, at.block_id)?
                };
                Ok(Placement::Resolved { parent_id, index })
            }
        }
    }

    pub fn stage_insert(
        &mut self,
        source: &dyn BlockSource,
        block_id: BlockId,
        table: String,
        block_type: String,
        linked: bool,
        at: Pointer,
        patch: Option<JsonPatch>,
    ) -> Result<()> {
        if self.resident_or_source(source, block_id).is_some() {
            return Err(Error::AlreadyExists(block_id.into()));
        }

        match self.resolve_placement(source, &at)? {
            Placement::Parked => {
                trace!(%block_id, "parked insert: placement reference not yet available");
                self.parking_lot.insert(
                    block_id,
                    Parked::Insert { block_id, table, block_type, linked, at, patch },
                );
                Ok(())
            }
            Placement::Resolved { parent_id, index } => {
                let mut block = Block::new(block_id, parent_id, block_type);
                block.table = table;
                block.index = index;
                block.linked = linked;
                if let Some(patch) = patch {
                    let mut content = None;
                    blocktree_types::json_doc::apply_patch(&mut content, &patch)?;
                    block.content = content;
                }
                self.change.children_changed.insert(parent_id);
                self.change.inserted.push(block.clone());
                self.resident.insert(block_id, block);
                Ok(())
            }
        }
    }

    pub fn stage_move(
        &mut self,
        source: &dyn BlockSource,
        block_id: BlockId,
        at: Pointer,
    ) -> Result<()> {
        let mut block = self
            .resident_or_source(source, block_id)
            .ok_or(Error::Conflict(format!("block {block_id} not found")))?;

        match self.resolve_placement(source, &at)? {
            Placement::Parked => Err(Error::InvalidOp(format!(
                "move of {block_id} references a block that does not exist"
            ))),
            Placement::Resolved { parent_id, index } => {
                self.change.children_changed.insert(block.parent_id);
                self.change.children_changed.insert(parent_id);
                block.parent_id = parent_id;
                block.index = index;
                self.change.updated.push(block.clone());
                self.resident.insert(block_id, block);
                Ok(())
            }
        }
    }

    pub fn stage_link(
        &mut self,
        source: &dyn BlockSource,
        child_id: BlockId,
        at: Pointer,
    ) -> Result<()> {
        if self.resident_or_source(source, child_id).is_none() {
            return Err(Error::Conflict(format!("block {child_id} not found")));
        }

        match self.resolve_placement(source, &at)? {
            Placement::Parked => {
                trace!(%child_id, "parked link: placement reference not yet available");
                self.parking_lot.insert(child_id, Parked::Link { child_id, at });
                Ok(())
            }
            Placement::Resolved { parent_id, index } => {
                self.change.children_changed.insert(parent_id);
                self.change.link_ops.push(LinkOp {
                    parent_id,
                    child_id,
                    kind: LinkOpKind::Link,
                    index: Some(index),
                });
                Ok(())
            }
        }
    }

    pub fn stage_unlink(&mut self, parent_id: BlockId, child_id: BlockId) {
        self.change.children_changed.insert(parent_id);
        self.change.link_ops.push(LinkOp {
            parent_id,
            child_id,
            kind: LinkOpKind::Unlink,
            index: None,
        });
    }

    pub fn stage_update(&mut self, source: &dyn BlockSource, block_id: BlockId, patch: JsonPatch) -> Result<()> {
        let mut block = self
            .resident_or_source(source, block_id)
            .ok_or(Error::Conflict(format!("block {block_id} not found")))?;
        blocktree_types::json_doc::apply_patch(&mut block.props, &patch)?;
        self.change.prop_set.push(block.clone());
        self.resident.insert(block_id, block);
        Ok(())
    }

    pub fn stage_patch(&mut self, source: &dyn BlockSource, block_id: BlockId, patch: JsonPatch) -> Result<()> {
        let mut block = self
            .resident_or_source(source, block_id)
            .ok_or(Error::Conflict(format!("block {block_id} not found")))?;
        blocktree_types::json_doc::apply_patch(&mut block.content, &patch)?;
        self.change.patched.push(block.clone());
        self.resident.insert(block_id, block);
        Ok(())
    }

    fn stage_flag(
        &mut self,
        source: &dyn BlockSource,
        block_id: BlockId,
        set_deleted: Option<bool>,
        set_erased: Option<bool>,
    ) -> Result<()> {
        let mut block = self
            .resident_or_source(source, block_id)
            .ok_or(Error::Conflict(format!("block {block_id} not found")))?;
        if let Some(v) = set_deleted {
            block.deleted = v;
        }
        if let Some(v) = set_erased {
            block.erased = v;
        }
        self.change.updated.push(block.clone());
        self.resident.insert(block_id, block);
        Ok(())
    }

    pub fn stage_delete(&mut self, source: &dyn BlockSource, block_id: BlockId) -> Result<()> {
        self.stage_flag(source, block_id, Some(true), None)
    }

    pub fn stage_undelete(&mut self, source: &dyn BlockSource, block_id: BlockId) -> Result<()> {
        self.stage_flag(source, block_id, Some(false), None)
    }

    pub fn stage_erase(&mut self, source: &dyn BlockSource, block_id: BlockId) -> Result<()> {
        self.stage_flag(source, block_id, None, Some(true))
    }

    pub fn stage_restore(&mut self, source: &dyn BlockSource, block_id: BlockId) -> Result<()> {
        self.stage_flag(source, block_id, None, Some(false))
    }

    /// Retries every parked placement until a full pass resolves nothing
    /// further. Called once after the main op loop; any leftovers surface
    /// as an error from `into_change`.
    pub fn drain_parking_lot(&mut self, source: &dyn BlockSource) -> Result<()> {
        loop {
            let pending: Vec<BlockId> = self.parking_lot.keys().copied().collect();
            if pending.is_empty() {
                return Ok(());
            }

            let mut progressed = false;
            for id in pending {
                let entry = self.parking_lot.get(&id).expect("key from own keys()").clone();
                match self.resolve_placement(source, entry.at())? {
                    Placement::Parked => continue,
                    Placement::Resolved { parent_id, index } => {
                        progressed = true;
                        self.parking_lot.remove(&id);
                        match entry {
                            Parked::Insert { block_id, table, block_type, linked, patch, .. } => {
                                let mut block = Block::new(block_id, parent_id, block_type);
                                block.table = table;
                                block.index = index;
                                block.linked = linked;
                                if let Some(patch) = patch {
                                    let mut content = None;
                                    blocktree_types::json_doc::apply_patch(&mut content, &patch)?;
                                    block.content = content;
                                }
                                self.change.children_changed.insert(parent_id);
                                self.change.inserted.push(block.clone());
                                self.resident.insert(block_id, block);
                            }
                            Parked::Link { child_id, .. } => {
                                self.change.children_changed.insert(parent_id);
                                self.change.link_ops.push(LinkOp {
                                    parent_id,
                                    child_id,
                                    kind: LinkOpKind::Link,
                                    index: Some(index),
                                });
                            }
                        }
                    }
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }
}

fn place_at_start(siblings: &[(FractionalIndex, BlockId)]) -> FractionalIndex {
    match siblings.first() {
        Some((first, _)) => FractionalIndex::before(first),
        None => FractionalIndex::default_index(),
    }
}

fn place_at_end(siblings: &[(FractionalIndex, BlockId)]) -> FractionalIndex {
    match siblings.last() {
        Some((last, _)) => FractionalIndex::after(last),
        None => FractionalIndex::default_index(),
    }
}

fn place_before(siblings: &[(FractionalIndex, BlockId)], reference: BlockId) -> Result<FractionalIndex> {
    let pos = siblings
        .iter()
        .position(|(_, id)| *id == reference)
        .ok_or_else(|| Error::Conflict(format!("reference block {reference} not among siblings")))?;
    match pos {
        0 => Ok(FractionalIndex::before(&siblings[0].0)),
        _ => FractionalIndex::between(&siblings[pos - 1].0, &siblings[pos].0),
    }
}

fn place_after(siblings: &[(FractionalIndex, BlockId)], reference: BlockId) -> Result<FractionalIndex> {
    let pos = siblings
        .iter()
        .position(|(_, id)| *id == reference)
        .ok_or_else(|| Error::Conflict(format!("reference block {reference} not among siblings")))?;
    match siblings.get(pos + 1) {
        Some((next, _)) => FractionalIndex::between(&siblings[pos].0, next),
        None => Ok(FractionalIndex::after(&siblings[pos].0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocktree_types::SpaceId;

    struct EmptySource;
    impl BlockSource for EmptySource {
        fn get(&self, _id: BlockId) -> Option<Block> {
            None
        }
        fn children(&self, _parent_id: BlockId) -> Vec<Block> {
            Vec::new()
        }
        fn linking_parents(&self, _child_id: BlockId) -> Vec<BlockId> {
            Vec::new()
        }
    }

    #[test]
    fn insert_at_start_of_empty_parent_uses_default_index() {
        let space = SpaceId::new();
        let parent: BlockId = space.into();
        let mut table = StageTable::new();
        let source = EmptySource;
        let block_id = BlockId::new();

        table
            .stage_insert(
                &source,
                block_id,
                "notes".into(),
                "page".into(),
                false,
                Pointer { block_id: parent, position: Position::Start },
                None,
            )
            .unwrap();

        let change = table.into_change().unwrap();
        assert_eq!(change.inserted.len(), 1);
        assert_eq!(change.inserted[0].index, FractionalIndex::default_index());
    }

    #[test]
    fn insert_before_unknown_reference_is_parked_then_fails() {
        let mut table = StageTable::new();
        let source = EmptySource;
        let missing_ref = BlockId::new();
        let block_id = BlockId::new();

        table
            .stage_insert(
                &source,
                block_id,
                "notes".into(),
                "page".into(),
                false,
                Pointer { block_id: missing_ref, position: Position::Before },
                None,
            )
            .unwrap();

        assert!(table.into_change().is_err());
    }
}
