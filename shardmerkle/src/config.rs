//! Configuration for building and verifying Merkle trees.
//!
//! A [`Config`] is a plain value object passed to every build and verify
//! call. It selects:
//! - The digest (`hash_func`, SHA-256 by default)
//! - Sequential or parallel construction and the worker count
//! - Whether data blocks are hashed or already are leaf hashes
//! - Whether sibling pairs are sorted before hashing
//! - Whether identical leaves may appear at several positions
//! - Which outputs are kept ([`TreeMode`])
//!
//! # Usage Examples
//! ```
//! use shardmerkle::config::{Config, TreeMode};
//!
//! let config = Config::default()
//!     .with_parallel(4)
//!     .with_mode(TreeMode::ProofGenAndTreeBuild);
//! assert!(config.run_in_parallel);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::utils::hasher::{default_hash_func, HashFunc};

/// Selects which outputs a build keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeMode {
    /// Record one proof per leaf, then drop the node grid.
    #[default]
    ProofGenOnly,
    /// Keep the node grid; proofs are produced on demand.
    TreeBuildOnly,
    /// Keep the node grid and record one proof per leaf.
    ProofGenAndTreeBuild,
}

impl TreeMode {
    pub fn retains_nodes(&self) -> bool {
        !matches!(self, TreeMode::ProofGenOnly)
    }

    pub fn generates_proofs(&self) -> bool {
        !matches!(self, TreeMode::TreeBuildOnly)
    }
}

/// Configuration for one build or verify call.
#[derive(Clone)]
pub struct Config {
    /// Digest applied to serialized blocks and to concatenated sibling pairs
    pub hash_func: Arc<dyn HashFunc>,
    /// Whether to spread hashing over a worker pool
    pub run_in_parallel: bool,
    /// Size of the worker pool, 0 means one worker per CPU
    pub num_routines: usize,
    /// Whether equal leaf hashes may occupy several positions
    pub allow_duplicates: bool,
    /// Whether a block's serialized bytes are used as its leaf hash verbatim
    pub disable_leaf_hashing: bool,
    /// Whether each pair is sorted lexicographically before hashing
    pub sort_sibling_pairs: bool,
    /// Which outputs the build keeps
    pub mode: TreeMode,
}

impl Default for Config {
    /// Creates a sequential, SHA-256, proof-generating configuration
    /// that rejects duplicate leaves.
    fn default() -> Self {
        Self {
            hash_func: default_hash_func(),
            run_in_parallel: false,
            num_routines: 0,
            allow_duplicates: false,
            disable_leaf_hashing: false,
            sort_sibling_pairs: false,
            mode: TreeMode::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("run_in_parallel", &self.run_in_parallel)
            .field("num_routines", &self.num_routines)
            .field("allow_duplicates", &self.allow_duplicates)
            .field("disable_leaf_hashing", &self.disable_leaf_hashing)
            .field("sort_sibling_pairs", &self.sort_sibling_pairs)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn with_hash_func(mut self, hash_func: Arc<dyn HashFunc>) -> Self {
        self.hash_func = hash_func;
        self
    }

    /// Enables parallel construction on a pool of `num_routines` workers.
    pub fn with_parallel(mut self, num_routines: usize) -> Self {
        self.run_in_parallel = true;
        self.num_routines = num_routines;
        self
    }

    pub fn with_allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    pub fn with_disable_leaf_hashing(mut self, disable: bool) -> Self {
        self.disable_leaf_hashing = disable;
        self
    }

    pub fn with_sort_sibling_pairs(mut self, sort: bool) -> Self {
        self.sort_sibling_pairs = sort;
        self
    }

    pub fn with_mode(mut self, mode: TreeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hashes `data` with the configured digest.
    pub(crate) fn hash(&self, data: &[u8]) -> crate::Result<Vec<u8>> {
        self.hash_func
            .hash(data)
            .map_err(crate::MerkleError::HashFailure)
    }

    /// Hashes the parent of `left` and `right` honoring `sort_sibling_pairs`.
    pub(crate) fn hash_pair(&self, left: &[u8], right: &[u8]) -> crate::Result<Vec<u8>> {
        crate::utils::hasher::hash_pair(
            self.hash_func.as_ref(),
            left,
            right,
            self.sort_sibling_pairs,
        )
        .map_err(crate::MerkleError::HashFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.run_in_parallel);
        assert!(!config.allow_duplicates);
        assert_eq!(config.mode, TreeMode::ProofGenOnly);
        assert_eq!(config.hash(b"").unwrap().len(), 32);
    }

    #[test]
    fn test_mode_flags() {
        assert!(!TreeMode::ProofGenOnly.retains_nodes());
        assert!(TreeMode::ProofGenOnly.generates_proofs());
        assert!(TreeMode::TreeBuildOnly.retains_nodes());
        assert!(!TreeMode::TreeBuildOnly.generates_proofs());
        assert!(TreeMode::ProofGenAndTreeBuild.retains_nodes());
        assert!(TreeMode::ProofGenAndTreeBuild.generates_proofs());
    }
}
