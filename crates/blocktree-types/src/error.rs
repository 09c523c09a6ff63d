use thiserror::Error;

use crate::ids::{BlockId, SpaceId, TransactionId};

/// The error taxonomy for the block-tree engine.
///
/// One variant per failure mode named in the fails-with contracts; callers
/// match on variants rather than string contents. `CreatesCycle` and
/// `DetectedCycle` are swallowed at batch granularity by `Api::apply` — see
/// that function's doc comment — every other variant aborts the enclosing
/// transaction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    #[error("block {0} not found in space {1}")]
    BlockNotFound(BlockId, SpaceId),

    #[error("transaction {0} not found in space {1}")]
    TransactionNotFound(TransactionId, SpaceId),

    #[error("space {0} already exists")]
    AlreadyExists(SpaceId),

    #[error("invalid operation: {0}")]
    InvalidOp(String),

    #[error("fractional index order violated: left index is not less than right index")]
    InvalidOrder,

    #[error("move would create a cycle")]
    CreatesCycle,

    #[error("existing cycle detected while walking ancestors")]
    DetectedCycle,

    #[error("transaction read set could not be resolved: {0}")]
    Conflict(String),

    #[error("failed to publish sync summary downstream: {0}")]
    PublishFailed(String),

    #[error("invalid JSON patch: {0}")]
    Patch(#[from] json_patch::PatchError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the two cycle variants, which `Api::apply` swallows at
    /// batch granularity rather than propagating (spec §4.4.2, §7).
    pub fn is_cycle(&self) -> bool {
        matches!(self, Error::CreatesCycle | Error::DetectedCycle)
    }
}
