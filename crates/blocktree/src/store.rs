//! Per-space state: the block map, ordered children, back-links, and the
//! append-only transaction log, plus the top-level directory of spaces.
//! Grounded in `original_source/memstore.go`'s `spaceStore`/`MemStore`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use blocktree_types::{
    root_sentinel, Block, BlockChange, BlockId, Error, FractionalIndex, LinkOpKind, Result,
    SpaceId, SyncSummary, Transaction, TransactionId,
};
use tracing::info;

use crate::stage::BlockSource;

#[derive(Debug, Clone)]
struct StoredTransaction {
    tx: Transaction,
    seq: u64,
    /// The change summary this transaction produced, kept alongside the
    /// log entry so `updates_since` can union dirty sets across a page of
    /// transactions without recomputing a diff against current state.
    summary: SyncSummary,
}

/// One space's block forest, its ordering structures, and its log.
///
/// Children are tracked per actual parent in one ordered set mixing
/// structural and linked entries (original design), disambiguated at read
/// time by comparing against `parents` (structural parent of record).
#[derive(Debug)]
pub struct SpaceStore {
    space_id: SpaceId,
    blocks: HashMap<BlockId, Block>,
    children: HashMap<BlockId, BTreeMap<(FractionalIndex, BlockId), BlockId>>,
    parents: HashMap<BlockId, BlockId>,
    back_links: HashMap<BlockId, BTreeSet<BlockId>>,
    link_positions: HashMap<(BlockId, BlockId), FractionalIndex>,
    log: Vec<StoredTransaction>,
    tx_index: HashMap<TransactionId, usize>,
    next_seq: u64,
}

impl SpaceStore {
    fn new(space_id: SpaceId, name: &str) -> Self {
        let mut store = Self {
            space_id,
            blocks: HashMap::new(),
            children: HashMap::new(),
            parents: HashMap::new(),
            back_links: HashMap::new(),
            link_positions: HashMap::new(),
            log: Vec::new(),
            tx_index: HashMap::new(),
            next_seq: 0,
        };
        let mut root = Block::new_space(space_id);
        root.props = Some(serde_json::json!({ "name": name }));
        store.insert_block(root);
        store
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    fn insert_block(&mut self, block: Block) {
        let key = (block.index.clone(), block.id);
        self.children.entry(block.parent_id).or_default().insert(key, block.id);
        self.parents.insert(block.id, block.parent_id);
        self.blocks.insert(block.id, block);
    }

    /// Overwrite an existing block's record, repositioning it among
    /// siblings if its parent or index changed.
    fn replace_block(&mut self, block: Block) {
        if let Some(old) = self.blocks.get(&block.id) {
            let old_parent = old.parent_id;
            let old_key = (old.index.clone(), block.id);
            if old_parent != block.parent_id || old_key.0 != block.index {
                if let Some(map) = self.children.get_mut(&old_parent) {
                    map.remove(&old_key);
                }
                let new_key = (block.index.clone(), block.id);
                self.children.entry(block.parent_id).or_default().insert(new_key, block.id);
            }
        }
        self.parents.insert(block.id, block.parent_id);
        self.blocks.insert(block.id, block);
    }

    fn link(&mut self, parent_id: BlockId, child_id: BlockId, index: FractionalIndex) {
        self.children
            .entry(parent_id)
            .or_default()
            .insert((index.clone(), child_id), child_id);
        self.back_links.entry(child_id).or_default().insert(parent_id);
        self.link_positions.insert((parent_id, child_id), index);
    }

    fn unlink(&mut self, parent_id: BlockId, child_id: BlockId) {
        if let Some(index) = self.link_positions.remove(&(parent_id, child_id)) {
            if let Some(map) = self.children.get_mut(&parent_id) {
                map.remove(&(index, child_id));
            }
        }
        if let Some(set) = self.back_links.get_mut(&child_id) {
            set.remove(&parent_id);
        }
    }

    pub fn contains_transaction(&self, id: TransactionId) -> bool {
        self.tx_index.contains_key(&id)
    }

    /// Applies one transaction's already-staged change atomically. Returns
    /// an empty summary without touching state if `tx.id` was already
    /// logged, per the idempotence invariant (spec §4.4).
    pub fn apply(&mut self, tx: Transaction, change: BlockChange) -> Result<SyncSummary> {
        if self.contains_transaction(tx.id) {
            return Ok(SyncSummary::default());
        }

        for block in &change.inserted {
            self.insert_block(block.clone());
        }
        for block in change.updated.iter().chain(change.prop_set.iter()).chain(change.patched.iter()) {
            self.replace_block(block.clone());
        }
        for op in &change.link_ops {
            match op.kind {
                LinkOpKind::Link => {
                    let index = op.index.clone().expect("link op always carries a resolved index");
                    self.link(op.parent_id, op.child_id, index);
                }
                LinkOpKind::Unlink => self.unlink(op.parent_id, op.child_id),
            }
        }

        let summary = SyncSummary::from(&change);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.log.push(StoredTransaction { tx: tx.clone(), seq, summary: summary.clone() });
        self.tx_index.insert(tx.id, self.log.len() - 1);

        info!(space = %self.space_id, tx = %tx.id, seq, "transaction applied");
        Ok(summary)
    }

    pub fn get_block(&self, id: BlockId) -> Result<Block> {
        self.blocks
            .get(&id)
            .cloned()
            .ok_or(Error::BlockNotFound(id, self.space_id))
    }

    fn ordered_children(&self, parent_id: BlockId, want_linked: bool) -> Vec<Block> {
        let Some(map) = self.children.get(&parent_id) else {
            return Vec::new();
        };
        map.values()
            .filter_map(|id| self.blocks.get(id))
            .filter(|b| {
                let structural = self.parents.get(&b.id) == Some(&parent_id);
                structural != want_linked
            })
            .cloned()
            .collect()
    }

    pub fn children(&self, parent_id: BlockId) -> Vec<Block> {
        self.ordered_children(parent_id, false)
    }

    pub fn linked(&self, parent_id: BlockId) -> Vec<Block> {
        self.ordered_children(parent_id, true)
    }

    pub fn back_links(&self, child_id: BlockId) -> Vec<BlockId> {
        self.back_links
            .get(&child_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Walks `block_id`'s structural ancestor chain up to (and including)
    /// the space's own root edge, collecting `(child, parent)` pairs. Used
    /// to seed a `MoveTree` with just the edges a transaction's ops touch,
    /// rather than the whole space (spec §4.4.1's relevant-id computation).
    pub fn ancestor_edges(&self, block_id: BlockId) -> Vec<(BlockId, BlockId)> {
        let mut edges = Vec::new();
        let mut cursor = block_id;
        while let Some(&parent) = self.parents.get(&cursor) {
            edges.push((cursor, parent));
            if parent == root_sentinel() {
                break;
            }
            cursor = parent;
        }
        edges
    }

    /// Pre-order walk from `root` that stops descending into (but still
    /// includes) any block whose type equals `boundary_type`, and returns
    /// once `limit` blocks have been collected. Mirrors `GetDescendantBlocks`.
    pub fn descendants(&self, root: BlockId, boundary_type: &str, limit: usize) -> Vec<Block> {
        let mut out = Vec::new();
        let mut stack: Vec<BlockId> = self.children(root).into_iter().rev().map(|b| b.id).collect();

        while let Some(id) = stack.pop() {
            if out.len() >= limit {
                break;
            }
            let Some(block) = self.blocks.get(&id).cloned() else { continue };
            let is_boundary = block.block_type == boundary_type;
            out.push(block);
            if !is_boundary {
                let mut kids: Vec<BlockId> = self.children(id).into_iter().rev().map(|b| b.id).collect();
                stack.append(&mut kids);
            }
        }
        out
    }

    pub fn parent_with_next(&self, block_id: BlockId) -> Result<(Block, Option<Block>)> {
        let block = self.get_block(block_id)?;
        let parent = self.get_block(block.parent_id)?;
        let siblings = self.children(block.parent_id);
        let idx = siblings
            .iter()
            .position(|b| b.id == block_id)
            .ok_or(Error::Conflict(format!("{block_id} missing from its own parent's children")))?;
        Ok((parent, siblings.get(idx + 1).cloned()))
    }

    pub fn parent_with_prev(&self, block_id: BlockId) -> Result<(Block, Option<Block>)> {
        let block = self.get_block(block_id)?;
        let parent = self.get_block(block.parent_id)?;
        let siblings = self.children(block.parent_id);
        let idx = siblings
            .iter()
            .position(|b| b.id == block_id)
            .ok_or(Error::Conflict(format!("{block_id} missing from its own parent's children")))?;
        Ok((parent, idx.checked_sub(1).and_then(|i| siblings.get(i)).cloned()))
    }

    pub fn with_first_child(&self, parent_id: BlockId) -> Result<(Block, Option<Block>)> {
        let parent = self.get_block(parent_id)?;
        Ok((parent, self.children(parent_id).into_iter().next()))
    }

    pub fn with_last_child(&self, parent_id: BlockId) -> Result<(Block, Option<Block>)> {
        let parent = self.get_block(parent_id)?;
        Ok((parent, self.children(parent_id).into_iter().last()))
    }

    /// Transactions at or after `after_seq`, oldest first, paired with the
    /// change summary each one produced. `Api::updates_since` unions these
    /// summaries to materialize a `BlockUpdates` from current store state.
    pub fn next_transactions(&self, after_seq: u64, limit: usize) -> Vec<(Transaction, SyncSummary)> {
        self.log
            .iter()
            .filter(|entry| entry.seq >= after_seq)
            .take(limit)
            .map(|entry| (entry.tx.clone(), entry.summary.clone()))
            .collect()
    }

    pub fn latest_seq(&self) -> u64 {
        self.next_seq
    }

    /// Recursive `id (type)` tree dump, structural children only, for
    /// integration-test assertions and debug printing. Mirrors
    /// `original_source/blocktree.go`'s `BlockView` without keeping a
    /// persistent nested view around.
    fn debug_tree(&self, id: BlockId, depth: usize) -> String {
        let Ok(block) = self.get_block(id) else {
            return format!("{}{id} <missing>\n", "  ".repeat(depth));
        };
        let mut out = format!("{}{id} ({})\n", "  ".repeat(depth), block.block_type);
        for child in self.children(id) {
            out.push_str(&self.debug_tree(child.id, depth + 1));
        }
        out
    }
}

/// `BlockSource` view the stage table reads through while staging one
/// transaction; borrows the space store for the duration of `prepare`.
pub struct SpaceView<'a>(pub &'a SpaceStore);

impl BlockSource for SpaceView<'_> {
    fn get(&self, id: BlockId) -> Option<Block> {
        self.0.blocks.get(&id).cloned()
    }

    fn children(&self, parent_id: BlockId) -> Vec<Block> {
        self.0.children(parent_id)
    }

    fn linking_parents(&self, child_id: BlockId) -> Vec<BlockId> {
        self.0.back_links(child_id)
    }
}

/// Top-level directory of spaces plus the cross-space `block_id -> space_id`
/// index. Each space is guarded by its own lock so unrelated spaces never
/// contend (spec §5's single-writer-per-space model).
#[derive(Debug, Default)]
pub struct Store {
    spaces: RwLock<HashMap<SpaceId, Arc<RwLock<SpaceStore>>>>,
    block_space: RwLock<HashMap<BlockId, SpaceId>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_space(&self, space_id: SpaceId, name: &str) -> Result<()> {
        let mut spaces = self.spaces.write().expect("space directory lock poisoned");
        if spaces.contains_key(&space_id) {
            return Err(Error::AlreadyExists(space_id));
        }
        spaces.insert(space_id, Arc::new(RwLock::new(SpaceStore::new(space_id, name))));
        self.block_space
            .write()
            .expect("block->space index lock poisoned")
            .insert(space_id.into(), space_id);
        info!(%space_id, name, "space created");
        Ok(())
    }

    pub fn space_ids(&self) -> Vec<SpaceId> {
        self.spaces.read().expect("space directory lock poisoned").keys().copied().collect()
    }

    fn space_handle(&self, space_id: SpaceId) -> Result<Arc<RwLock<SpaceStore>>> {
        self.spaces
            .read()
            .expect("space directory lock poisoned")
            .get(&space_id)
            .cloned()
            .ok_or(Error::SpaceNotFound(space_id))
    }

    pub fn space_of(&self, block_id: BlockId) -> Result<SpaceId> {
        self.block_space
            .read()
            .expect("block->space index lock poisoned")
            .get(&block_id)
            .copied()
            .ok_or(Error::Conflict(format!("block {block_id} is not indexed to any space")))
    }

    /// Runs `f` with an exclusive lock on `space_id`'s store, held for the
    /// full prepare-and-apply duration of one transaction (spec §5).
    pub fn with_space_write<T>(
        &self,
        space_id: SpaceId,
        f: impl FnOnce(&mut SpaceStore) -> Result<(T, Vec<BlockId>)>,
    ) -> Result<T> {
        let handle = self.space_handle(space_id)?;
        let mut guard = handle.write().expect("space lock poisoned");
        let (value, new_block_ids) = f(&mut guard)?;
        if !new_block_ids.is_empty() {
            let mut index = self.block_space.write().expect("block->space index lock poisoned");
            for id in new_block_ids {
                index.insert(id, space_id);
            }
        }
        Ok(value)
    }

    pub fn with_space_read<T>(&self, space_id: SpaceId, f: impl FnOnce(&SpaceStore) -> Result<T>) -> Result<T> {
        let handle = self.space_handle(space_id)?;
        let guard = handle.read().expect("space lock poisoned");
        f(&guard)
    }

    /// Renders `root`'s structural subtree for assertions in integration
    /// tests and debug printing; diagnostic only, not part of the sync
    /// surface.
    pub fn format_tree(&self, space_id: SpaceId, root: BlockId) -> Result<String> {
        self.with_space_read(space_id, |space| Ok(space.debug_tree(root, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_space_has_only_its_own_root_block() {
        let space_id = SpaceId::new();
        let store = SpaceStore::new(space_id, "demo");
        let root: BlockId = space_id.into();
        assert!(store.children(root).is_empty());
        assert_eq!(store.get_block(root).unwrap().props, Some(serde_json::json!({ "name": "demo" })));
    }

    #[test]
    fn ancestor_edges_walks_to_the_space_root_sentinel() {
        let space_id = SpaceId::new();
        let mut store = SpaceStore::new(space_id, "demo");
        let root: BlockId = space_id.into();
        let child = BlockId::new();
        let mut block = Block::new(child, root, "para");
        block.index = FractionalIndex::default_index();
        store.insert_block(block);

        let edges = store.ancestor_edges(child);
        assert_eq!(edges, vec![(child, root), (root, root_sentinel())]);
    }

    #[test]
    fn double_create_space_is_rejected() {
        let store = Store::new();
        let space_id = SpaceId::new();
        store.create_space(space_id, "a").unwrap();
        assert!(matches!(store.create_space(space_id, "b"), Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn applying_the_same_transaction_id_twice_leaves_the_log_at_one_entry() {
        let space_id = SpaceId::new();
        let mut store = SpaceStore::new(space_id, "demo");
        let tx = Transaction::new(space_id, blocktree_types::UserId::new(), vec![]);
        store.apply(tx.clone(), BlockChange::default()).unwrap();
        let seq_after_first = store.latest_seq();
        store.apply(tx, BlockChange::default()).unwrap();
        assert_eq!(store.latest_seq(), seq_after_first);
    }
}
