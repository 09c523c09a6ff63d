//! Transactional, conflict-tolerant block-tree store.
//!
//! A [`Store`] holds many independent spaces, each a forest of [`Block`]s
//! ordered by dense fractional indices. Writes go through [`Api::apply`],
//! which stages a transaction's operations against a space, rejects moves
//! that would create a cycle, and applies the result atomically.

pub mod api;
pub mod config;
pub mod evaluator;
pub mod move_tree;
pub mod stage;
pub mod store;

pub use api::Api;
pub use config::StoreConfig;
pub use store::Store;

pub use blocktree_types::*;
