//! Shared data model for the block-tree engine.
//!
//! This crate is pure vocabulary: block/space/transaction data, the op
//! wire format, the error taxonomy, and small JSON-document helpers. All
//! business logic (fractional-index arithmetic aside, since `Block` holds
//! one) lives in the `blocktree` crate.

pub mod block;
pub mod change;
pub mod error;
pub mod fractional_index;
pub mod ids;
pub mod json_doc;
pub mod op;
pub mod transaction;
pub mod updates;

pub use block::{Block, SPACE_TYPE};
pub use change::{BlockChange, LinkOp, LinkOpKind, SyncSummary};
pub use error::{Error, Result};
pub use fractional_index::FractionalIndex;
pub use ids::{root_sentinel, BlockId, SpaceId, TransactionId, UserId};
pub use op::{JsonPatch, Op, OpPayload, Pointer, Position};
pub use transaction::{Transaction, TransactionPayload};
pub use updates::BlockUpdates;
