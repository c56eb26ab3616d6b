//! shardmerkle is a binary Merkle tree engine with composable level caches.
//!
//! # Overview
//! Given an ordered list of data blocks, shardmerkle:
//! - Builds a binary hash tree, sequentially or on a fixed worker pool, with
//!   bit-identical output in both modes
//! - Records a compact inclusion proof per leaf
//! - Verifies a block (or a precomputed leaf hash) against a proof and a root
//! - Snapshots bands of tree levels into [`LevelCache`]s that can be stored,
//!   reloaded and proved on their own, and chains band proofs into full-tree
//!   proofs with [`append_proof`]
//!
//! # Architecture
//! - [`utils::hasher`]: the pluggable [`HashFunc`] and the pooled SHA-256 default
//! - [`leaf`]: the [`DataBlock`] capability and leaf hash derivation
//! - [`merkletree`]: tree construction, proofs, level caches and checks
//! - [`config`]: per-call [`Config`]
//!
//! # Example Usage
//! ```
//! use shardmerkle::{build, Config};
//!
//! let blocks: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 100]).collect();
//! let tree = build(&blocks, &Config::default().with_parallel(2)).unwrap();
//! assert_eq!(tree.depth(), 3);
//! for (block, proof) in blocks.iter().zip(tree.proofs()) {
//!     assert!(tree.verify(block, proof).unwrap());
//! }
//! ```
//!
//! The library installs no logger; it emits records through the `log` facade.

pub mod config;
pub mod def;
pub mod error;
pub mod leaf;
pub mod merkletree;
pub mod utils;

pub use config::{Config, TreeMode};
pub use error::{MerkleError, PersistenceError, Result};
pub use leaf::{derive_leaf, DataBlock};
pub use merkletree::{
    append_proof, build, verify_data_block, verify_leaf, verify_standalone, LevelCache,
    MerkleTree, Proof,
};
pub use utils::hasher::{HashFunc, Sha256Hasher};
