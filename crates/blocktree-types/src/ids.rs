use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(BlockId, "Identifies a block within a space.");
uuid_id!(SpaceId, "Identifies a space; equals its root block's id.");
uuid_id!(TransactionId, "Identifies a transaction within a space's log.");
uuid_id!(UserId, "Identifies the user who authored a transaction.");

/// Parent sentinel for a space's root block. Distinct from any real space id,
/// so a space block's parent can never alias into another space's forest.
///
/// Mirrors `original_source`'s `RootBlockID` constant (the nil UUID) used as
/// the parent of every synthetic space block.
pub fn root_sentinel() -> BlockId {
    BlockId::nil()
}

impl From<SpaceId> for BlockId {
    fn from(space: SpaceId) -> Self {
        BlockId(space.0)
    }
}

impl From<BlockId> for SpaceId {
    fn from(block: BlockId) -> Self {
        SpaceId(block.0)
    }
}
