//! Public façade over the store: the surface embedders actually call.
//! Grounded in `original_source/api.go`'s `Api`.

use std::collections::BTreeSet;

use blocktree_types::{Block, BlockId, BlockUpdates, Result, SpaceId, SyncSummary, Transaction};
use tracing::warn;

use crate::config::StoreConfig;
use crate::evaluator;
use crate::store::Store;

pub struct Api {
    store: Store,
    config: StoreConfig,
}

impl Api {
    pub fn new(config: StoreConfig) -> Self {
        Self { store: Store::new(), config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn create_space(&self, name: &str) -> Result<SpaceId> {
        let space_id = SpaceId::new();
        self.store.create_space(space_id, name)?;
        Ok(space_id)
    }

    /// Applies a batch of transactions in order. A transaction whose cycle
    /// check fails is skipped, logged, and does not affect the rest of the
    /// batch (spec §4.4.2); any other failure aborts the batch immediately,
    /// returning everything accumulated from transactions applied so far
    /// as lost (the caller sees the error, not a partial summary).
    pub fn apply(&self, transactions: Vec<Transaction>) -> Result<SyncSummary> {
        let mut total = SyncSummary::default();
        for tx in transactions {
            let space_id = tx.space_id;
            let tx_id = tx.id;
            let outcome = self
                .store
                .with_space_write(space_id, |space| evaluator::evaluate_and_apply(space, tx));
            match outcome {
                Ok(summary) => total.extend(&summary),
                Err(err) if err.is_cycle() => {
                    warn!(%space_id, %tx_id, "skipping transaction: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    pub fn get_block(&self, block_id: BlockId) -> Result<Block> {
        let space_id = self.store.space_of(block_id)?;
        self.store.with_space_read(space_id, |space| space.get_block(block_id))
    }

    pub fn get_blocks(&self, block_ids: &[BlockId]) -> Result<Vec<Block>> {
        block_ids.iter().map(|id| self.get_block(*id)).collect()
    }

    pub fn get_block_space(&self, block_id: BlockId) -> Result<SpaceId> {
        self.store.space_of(block_id)
    }

    pub fn children(&self, parent_id: BlockId) -> Result<Vec<Block>> {
        let space_id = self.store.space_of(parent_id)?;
        self.store.with_space_read(space_id, |space| Ok(space.children(parent_id)))
    }

    pub fn linked(&self, parent_id: BlockId) -> Result<Vec<Block>> {
        let space_id = self.store.space_of(parent_id)?;
        self.store.with_space_read(space_id, |space| Ok(space.linked(parent_id)))
    }

    pub fn back_links(&self, child_id: BlockId) -> Result<Vec<BlockId>> {
        let space_id = self.store.space_of(child_id)?;
        self.store.with_space_read(space_id, |space| Ok(space.back_links(child_id)))
    }

    pub fn descendants(&self, root: BlockId, limit: Option<usize>) -> Result<Vec<Block>> {
        let space_id = self.store.space_of(root)?;
        let limit = limit.unwrap_or(self.config.default_page_limit);
        let boundary = self.config.descendant_boundary_type.clone();
        self.store
            .with_space_read(space_id, |space| Ok(space.descendants(root, &boundary, limit)))
    }

    pub fn parent_with_next(&self, block_id: BlockId) -> Result<(Block, Option<Block>)> {
        let space_id = self.store.space_of(block_id)?;
        self.store.with_space_read(space_id, |space| space.parent_with_next(block_id))
    }

    pub fn parent_with_prev(&self, block_id: BlockId) -> Result<(Block, Option<Block>)> {
        let space_id = self.store.space_of(block_id)?;
        self.store.with_space_read(space_id, |space| space.parent_with_prev(block_id))
    }

    pub fn with_first_child(&self, parent_id: BlockId) -> Result<(Block, Option<Block>)> {
        let space_id = self.store.space_of(parent_id)?;
        self.store.with_space_read(space_id, |space| space.with_first_child(parent_id))
    }

    pub fn with_last_child(&self, parent_id: BlockId) -> Result<(Block, Option<Block>)> {
        let space_id = self.store.space_of(parent_id)?;
        self.store.with_space_read(space_id, |space| space.with_last_child(parent_id))
    }

    /// Materializes everything a pull-based sync client missed since
    /// `after_seq` (spec §4.6/§6): unions the change summary of every
    /// transaction in the page, then reads current store state for each
    /// dirty id so the caller gets final ordering and content rather than a
    /// raw op log to replay. The original's equivalent (`Api.GetUpdates`)
    /// was never finished upstream (see DESIGN.md).
    pub fn updates_since(&self, space_id: SpaceId, after_seq: u64, limit: usize) -> Result<BlockUpdates> {
        self.store.with_space_read(space_id, |space| {
            let mut dirty_parents: BTreeSet<BlockId> = BTreeSet::new();
            let mut dirty_blocks: BTreeSet<BlockId> = BTreeSet::new();
            for (_, summary) in space.next_transactions(after_seq, limit) {
                dirty_parents.extend(summary.children_changed.iter().copied());
                dirty_blocks.extend(summary.inserted.iter().copied());
                dirty_blocks.extend(summary.updated.iter().copied());
                dirty_blocks.extend(summary.props_changed.iter().copied());
                dirty_blocks.extend(summary.patched.iter().copied());
            }

            let mut updates = BlockUpdates::default();
            for parent_id in dirty_parents {
                let ordered = space.children(parent_id).into_iter().map(|b| b.id).collect();
                updates.children.insert(parent_id, ordered);
            }
            for block_id in dirty_blocks {
                if let Ok(block) = space.get_block(block_id) {
                    updates.blocks.insert(block_id, block);
                }
            }
            Ok(updates)
        })
    }

    pub fn latest_seq(&self, space_id: SpaceId) -> Result<u64> {
        self.store.with_space_read(space_id, |space| Ok(space.latest_seq()))
    }

    /// Diagnostic tree dump of `root`'s structural subtree; not part of the
    /// sync surface (spec §3's `BlockView` supplement).
    pub fn format_tree(&self, space_id: SpaceId, root: BlockId) -> Result<String> {
        self.store.format_tree(space_id, root)
    }
}
