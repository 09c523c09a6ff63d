use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::ids::BlockId;

/// Materialized result of an updates-since query (spec §4.6): current
/// child ordering for every parent whose children changed across the
/// transaction range queried, plus the current record for every block
/// that changed, read from present store state rather than replayed from
/// the ops themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockUpdates {
    pub children: HashMap<BlockId, Vec<BlockId>>,
    pub blocks: HashMap<BlockId, Block>,
}

impl BlockUpdates {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.blocks.is_empty()
    }
}
