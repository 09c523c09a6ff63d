use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::BlockId;

/// A JSON Patch (RFC 6902) document: an ordered list of `{op, path, value}`
/// operations applied atomically to a `serde_json::Value`.
pub type JsonPatch = json_patch::Patch;

/// Position of a new or moved block relative to a reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
    Start,
    End,
    Inside,
}

/// A reference point: a block id plus where, relative to it, to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub block_id: BlockId,
    pub position: Position,
}

/// Wire shape of one operation (spec §6): a flat JSON object with fields
/// that only some op kinds use. This is what transactions are built from
/// and serialized as; [`Op`] is the validated, tagged form the evaluator
/// dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpPayload {
    pub table: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub linked: bool,
    pub block_id: BlockId,
    pub parent_id: Option<BlockId>,
    pub at: Option<Pointer>,
    #[serde(default)]
    pub props: Option<JsonPatch>,
    #[serde(default)]
    pub patch: Option<JsonPatch>,
}

/// One operation within a transaction, validated and dispatched by kind.
///
/// Modeled as a sum type over kinds with per-kind payload rather than one
/// wide record where most fields are null for any given kind (see
/// DESIGN.md's notes on tagged variants).
#[derive(Debug, Clone)]
pub enum Op {
    Insert {
        block_id: BlockId,
        at: Pointer,
        table: String,
        object: String,
        linked: bool,
        patch: Option<JsonPatch>,
    },
    Move {
        block_id: BlockId,
        parent_id: BlockId,
        at: Pointer,
    },
    Update {
        block_id: BlockId,
        patch: JsonPatch,
    },
    Patch {
        block_id: BlockId,
        patch: JsonPatch,
    },
    Delete {
        block_id: BlockId,
    },
    Undelete {
        block_id: BlockId,
    },
    Erase {
        block_id: BlockId,
    },
    Restore {
        block_id: BlockId,
    },
    Link {
        block_id: BlockId,
        at: Pointer,
    },
    Unlink {
        block_id: BlockId,
    },
}

impl Op {
    pub fn block_id(&self) -> BlockId {
        match self {
            Op::Insert { block_id, .. }
            | Op::Move { block_id, .. }
            | Op::Update { block_id, .. }
            | Op::Patch { block_id, .. }
            | Op::Delete { block_id }
            | Op::Undelete { block_id }
            | Op::Erase { block_id }
            | Op::Restore { block_id }
            | Op::Link { block_id, .. }
            | Op::Unlink { block_id } => *block_id,
        }
    }

    /// The reference pointer this op places relative to, if any.
    pub fn at(&self) -> Option<&Pointer> {
        match self {
            Op::Insert { at, .. } | Op::Move { at, .. } | Op::Link { at, .. } => Some(at),
            _ => None,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Op::Move { .. })
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert { .. })
    }
}

impl TryFrom<OpPayload> for Op {
    type Error = Error;

    fn try_from(p: OpPayload) -> Result<Op> {
        let op = match p.kind.as_str() {
            "insert" => {
                let at = p
                    .at
                    .ok_or_else(|| Error::InvalidOp("insert without at".into()))?;
                if p.object.is_empty() {
                    return Err(Error::InvalidOp("insert without type".into()));
                }
                if p.table.is_empty() {
                    return Err(Error::InvalidOp("insert without table".into()));
                }
                if at.position == Position::Inside && !p.linked {
                    return Err(Error::InvalidOp(
                        "position inside is only valid for linked inserts".into(),
                    ));
                }
                Op::Insert {
                    block_id: p.block_id,
                    at,
                    table: p.table,
                    object: p.object,
                    linked: p.linked,
                    patch: p.patch,
                }
            }
            "move" => {
                let parent_id = p
                    .parent_id
                    .ok_or_else(|| Error::InvalidOp("move without parent_id".into()))?;
                let at = p
                    .at
                    .ok_or_else(|| Error::InvalidOp("move without at".into()))?;
                if at.block_id == p.block_id {
                    return Err(Error::InvalidOp("move with same block id".into()));
                }
                if at.position == Position::Inside {
                    return Err(Error::InvalidOp("move cannot target position inside".into()));
                }
                Op::Move {
                    block_id: p.block_id,
                    parent_id,
                    at,
                }
            }
            "update" => Op::Update {
                block_id: p.block_id,
                patch: p.props.unwrap_or_else(|| json_patch::Patch(Vec::new())),
            },
            "patch" => Op::Patch {
                block_id: p.block_id,
                patch: p.patch.unwrap_or_else(|| json_patch::Patch(Vec::new())),
            },
            "delete" => Op::Delete { block_id: p.block_id },
            "undelete" => Op::Undelete { block_id: p.block_id },
            "erase" => Op::Erase { block_id: p.block_id },
            "restore" => Op::Restore { block_id: p.block_id },
            "link" => {
                let at = p
                    .at
                    .ok_or_else(|| Error::InvalidOp("link without at".into()))?;
                Op::Link {
                    block_id: p.block_id,
                    at,
                }
            }
            "unlink" => Op::Unlink { block_id: p.block_id },
            other => return Err(Error::InvalidOp(format!("unknown op kind: {other}"))),
        };
        Ok(op)
    }
}
