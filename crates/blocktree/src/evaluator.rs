//! The staged transaction evaluator: idempotence check, cycle check, then
//! staging, with no partial application on failure. Grounded in
//! `original_source/transaction.go`'s `Transaction.prepare`.

use blocktree_types::{BlockId, Error, Op, Pointer, Position, Result, SyncSummary, Transaction};
use tracing::{debug, warn};

use crate::move_tree::MoveTree;
use crate::stage::{BlockSource, StageTable};
use crate::store::{SpaceStore, SpaceView};

/// Runs one transaction's three phases against an already-locked space and
/// applies it. Returns the resulting summary and the ids of any newly
/// inserted blocks, so the caller can index them into the store's
/// cross-space `block_id -> space_id` map.
///
/// No phase after idempotence mutates `space` until `SpaceStore::apply`
/// runs at the very end — a failure at any earlier phase leaves the space
/// untouched, satisfying the no-partial-application invariant.
pub fn evaluate_and_apply(space: &mut SpaceStore, tx: Transaction) -> Result<(SyncSummary, Vec<BlockId>)> {
    if space.contains_transaction(tx.id) {
        debug!(tx = %tx.id, "transaction already applied, no-op");
        return Ok((SyncSummary::default(), Vec::new()));
    }

    check_cycles(space, &tx)?;

    let change = {
        let source = SpaceView(&*space);
        let mut stage = StageTable::new();
        for op in &tx.ops {
            dispatch(&mut stage, &source, op)?;
        }
        stage.drain_parking_lot(&source)?;
        stage.into_change()?
    };

    let new_block_ids: Vec<BlockId> = change.inserted.iter().map(|b| b.id).collect();
    let summary = space.apply(tx, change)?;
    Ok((summary, new_block_ids))
}

/// Builds a `MoveTree` from just the ancestor edges each `Move`/`Insert` op
/// touches and simulates every such op against it, failing before any
/// staging happens if one would create or reveal a cycle (spec
/// §4.4.1/§4.2/§4.4). The candidate parent for a `Move` is computed from
/// `at`, exactly as `stage::resolve_placement` will later place it — never
/// from the op's `parent_id` field, which only records the block's current
/// parent and says nothing about where it is headed. Insert ops that place
/// a new block under an in-transaction reference are added as plain edges
/// (a brand-new block id can never itself be an ancestor, so no cycle
/// check is needed for it, only edge bookkeeping for later ops).
fn check_cycles(space: &SpaceStore, tx: &Transaction) -> Result<()> {
    let mut tree = MoveTree::new(tx.space_id);

    for op in &tx.ops {
        match op {
            Op::Insert { block_id, at, .. } => {
                let parent_id = candidate_parent(space, &mut tree, at)?;
                tree.add_edge(*block_id, parent_id);
            }
            Op::Move { block_id, at, .. } => {
                let parent_id = candidate_parent(space, &mut tree, at)?;
                seed_known(space, &mut tree, *block_id);
                if !tree.contains(*block_id) {
                    return Err(Error::Conflict(format!("block {block_id} not found")));
                }
                if let Err(err) = tree.move_to(*block_id, parent_id) {
                    warn!(tx = %tx.id, %block_id, %parent_id, "rejecting transaction: {err}");
                    return Err(err);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Seeds `tree` with `id`'s current ancestor chain from the store, if it
/// isn't already known (e.g. from an earlier op in this same transaction).
fn seed_known(space: &SpaceStore, tree: &mut MoveTree, id: BlockId) {
    if tree.contains(id) {
        return;
    }
    for (child, parent) in space.ancestor_edges(id) {
        tree.add_edge(child, parent);
    }
}

/// The parent a placement pointer resolves to, mirroring
/// `stage::StageTable::resolve_placement`'s parent derivation: `start`/
/// `end`/`inside` name the parent directly, `before`/`after` name a
/// sibling whose *current* parent (in-transaction if already touched,
/// otherwise the store's) is the target.
fn candidate_parent(space: &SpaceStore, tree: &mut MoveTree, at: &Pointer) -> Result<BlockId> {
    match at.position {
        Position::Start | Position::End | Position::Inside => {
            seed_known(space, tree, at.block_id);
            Ok(at.block_id)
        }
        Position::Before | Position::After => {
            if let Some(parent_id) = tree.parent_of(at.block_id) {
                return Ok(parent_id);
            }
            let reference = space.get_block(at.block_id)?;
            seed_known(space, tree, reference.parent_id);
            Ok(reference.parent_id)
        }
    }
}

fn dispatch(stage: &mut StageTable, source: &dyn BlockSource, op: &Op) -> Result<()> {
    match op.clone() {
        Op::Insert { block_id, at, table, object, linked, patch } => {
            stage.stage_insert(source, block_id, table, object, linked, at, patch)
        }
        Op::Move { block_id, at, .. } => stage.stage_move(source, block_id, at),
        Op::Update { block_id, patch } => stage.stage_update(source, block_id, patch),
        Op::Patch { block_id, patch } => stage.stage_patch(source, block_id, patch),
        Op::Delete { block_id } => stage.stage_delete(source, block_id),
        Op::Undelete { block_id } => stage.stage_undelete(source, block_id),
        Op::Erase { block_id } => stage.stage_erase(source, block_id),
        Op::Restore { block_id } => stage.stage_restore(source, block_id),
        Op::Link { block_id, at } => stage.stage_link(source, block_id, at),
        Op::Unlink { block_id } => {
            for parent_id in source.linking_parents(block_id) {
                stage.stage_unlink(parent_id, block_id);
            }
            Ok(())
        }
    }
}
