use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SpaceId, TransactionId, UserId};
use crate::op::Op;

/// An ordered list of operations submitted together, applied atomically.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub space_id: SpaceId,
    pub user_id: UserId,
    pub time: DateTime<Utc>,
    pub ops: Vec<Op>,
}

impl Transaction {
    pub fn new(space_id: SpaceId, user_id: UserId, ops: Vec<Op>) -> Self {
        Self {
            id: TransactionId::new(),
            space_id,
            user_id,
            time: Utc::now(),
            ops,
        }
    }
}

/// Wire shape of a transaction (spec §6): ops are serialized as
/// [`crate::op::OpPayload`], the flat form, rather than the validated
/// [`Op`] sum type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub id: TransactionId,
    pub space_id: SpaceId,
    pub user_id: UserId,
    pub time: DateTime<Utc>,
    pub ops: Vec<crate::op::OpPayload>,
}
