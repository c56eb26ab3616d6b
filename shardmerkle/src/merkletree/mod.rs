//! Merkle tree construction, proofs and level caches.
//!
//! This module provides:
//!
//! - [`build`] and [`MerkleTree`]: immutable binary trees built sequentially or
//!   on a worker pool with identical results
//! - [`Proof`]: bit-packed inclusion proofs and their verification
//! - [`LevelCache`]: bands of levels that can be persisted and proved
//!   independently, with [`append_proof`] to chain band proofs
//! - [`check`]: node grid consistency checks

pub(crate) mod builder;
pub mod check;
pub mod level_cache;
pub mod proof;
pub mod tree;

pub use builder::Levels;
pub use level_cache::{append_proof, LevelCache};
pub use proof::{verify_data_block, verify_leaf, verify_standalone, Proof};
pub use tree::{build, MerkleTree};
