//! The immutable Merkle tree produced by [`build`].

use std::collections::HashMap;

use log::{debug, info};

use super::builder::{self, Levels};
use super::check;
use super::proof::{verify_leaf, Proof};
use crate::config::Config;
use crate::leaf::{derive_leaf, derive_leaves, derive_leaves_par, DataBlock};
use crate::{MerkleError, Result};

/// A binary Merkle tree over an ordered list of data blocks.
///
/// The tree is published only after every level and every proof has been
/// computed; a failed build leaves nothing behind.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    config: Config,
    root: Vec<u8>,
    /// Leaf hashes, empty while `nodes` holds them as row 0
    leaves: Vec<Vec<u8>>,
    proofs: Vec<Proof>,
    depth: usize,
    nodes: Option<Levels>,
    leaf_index: Option<HashMap<Vec<u8>, usize>>,
}

/// Builds a tree over `blocks`.
///
/// # Arguments
/// * `blocks` - Data blocks in leaf order, at least one
/// * `config` - Hashing, parallelism, duplicate and retention settings
///
/// # Errors
/// * `EmptyInput` if `blocks` is empty
/// * `DuplicateLeaf` if two blocks derive the same leaf and duplicates are not allowed
/// * `HashFailure` / `DataBlockSerialize` if a collaborator fails
pub fn build<B: DataBlock>(blocks: &[B], config: &Config) -> Result<MerkleTree> {
    if blocks.is_empty() {
        return Err(MerkleError::EmptyInput);
    }
    let pool = if config.run_in_parallel {
        Some(builder::new_pool(config.num_routines)?)
    } else {
        None
    };

    let leaves = match &pool {
        Some(pool) => {
            let workers = pool.current_num_threads();
            pool.install(|| derive_leaves_par(blocks, config, workers))?
        }
        None => derive_leaves(blocks, config)?,
    };

    let leaf_index = if !config.allow_duplicates || config.mode.retains_nodes() {
        Some(builder::index_leaves(&leaves, !config.allow_duplicates)?)
    } else {
        None
    };

    let num_leaves = leaves.len();
    let levels = builder::build_levels(leaves, config, pool.as_ref())?;
    let depth = levels.len() - 1;
    let root = levels[depth][0].clone();

    let proofs = if config.mode.generates_proofs() {
        builder::generate_proofs(&levels, pool.as_ref())
    } else {
        Vec::new()
    };

    let (leaves, nodes, leaf_index) = if config.mode.retains_nodes() {
        (Vec::new(), Some(levels), leaf_index)
    } else {
        let leaves = levels.into_iter().next().unwrap_or_default();
        (leaves, None, None)
    };

    info!(
        "merkle tree built: {} leaves, depth {}, mode {:?}, parallel {}",
        num_leaves,
        depth,
        config.mode,
        config.run_in_parallel
    );

    Ok(MerkleTree {
        config: config.clone(),
        root,
        leaves,
        proofs,
        depth,
        nodes,
        leaf_index,
    })
}

impl MerkleTree {
    pub fn root(&self) -> &[u8] {
        &self.root
    }

    /// Leaf hashes, index-aligned with the blocks the tree was built from.
    pub fn leaves(&self) -> &[Vec<u8>] {
        match &self.nodes {
            Some(nodes) => &nodes[0],
            None => &self.leaves,
        }
    }

    /// Proofs recorded during the build, empty in `TreeBuildOnly` mode.
    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    /// Number of combine passes from the leaves to the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves().len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The node grid, present only in modes that retain it.
    pub fn nodes(&self) -> Option<&Levels> {
        self.nodes.as_ref()
    }

    /// Verifies `block` against this tree's root.
    ///
    /// # Returns
    /// `Ok(false)` if the proof does not lead to the root
    pub fn verify<B: DataBlock + ?Sized>(&self, block: &B, proof: &Proof) -> Result<bool> {
        let leaf = derive_leaf(block, &self.config)?;
        verify_leaf(&leaf, proof, &self.root, &self.config)
    }

    /// Generates the proof of `block` from the retained node grid.
    ///
    /// When duplicates are allowed the first position holding the block's
    /// leaf hash is used.
    pub fn proof<B: DataBlock + ?Sized>(&self, block: &B) -> Result<Proof> {
        let (nodes, leaf_index) = match (&self.nodes, &self.leaf_index) {
            (Some(nodes), Some(leaf_index)) => (nodes, leaf_index),
            _ => return Err(MerkleError::NodesNotRetained),
        };
        let leaf = derive_leaf(block, &self.config)?;
        let idx = *leaf_index.get(&leaf).ok_or(MerkleError::InvalidDataBlock)?;
        debug!("proof requested for leaf {}", idx);
        Ok(builder::proof_at(nodes, idx))
    }

    /// Recomputes every parent of the retained node grid.
    ///
    /// # Errors
    /// * `NodesNotRetained` if the grid was dropped
    /// * `Inconsistent` at the first node that does not hash its children
    pub fn check_consistency(&self) -> Result<()> {
        let nodes = self.nodes.as_ref().ok_or(MerkleError::NodesNotRetained)?;
        check::check_rows(nodes, 0, &self.config)?;
        check::check_root(nodes, &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeMode;

    fn blocks(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("block-{}", i).into_bytes()).collect()
    }

    #[test]
    fn test_build_empty() {
        let empty: Vec<Vec<u8>> = vec![];
        assert!(matches!(
            build(&empty, &Config::default()),
            Err(MerkleError::EmptyInput)
        ));
    }

    #[test]
    fn test_build_and_verify() {
        for n in [1, 2, 3, 5, 8, 9, 33] {
            let data = blocks(n);
            let tree = build(&data, &Config::default()).unwrap();
            assert_eq!(tree.num_leaves(), n);
            assert_eq!(tree.proofs().len(), n);
            assert!(tree.nodes().is_none());
            for (block, proof) in data.iter().zip(tree.proofs()) {
                assert!(tree.verify(block, proof).unwrap());
            }
        }
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut data = blocks(4);
        data.push(data[0].clone());
        let err = build(&data, &Config::default()).unwrap_err();
        assert!(matches!(err, MerkleError::DuplicateLeaf { first: 0, second: 4 }));
    }

    #[test]
    fn test_duplicates_allowed_lookup_first() {
        let mut data = blocks(4);
        data.push(data[2].clone());
        let config = Config::default()
            .with_allow_duplicates(true)
            .with_mode(TreeMode::ProofGenAndTreeBuild);
        let tree = build(&data, &config).unwrap();
        assert_eq!(tree.proof(&data[4]).unwrap(), tree.proofs()[2]);
        assert!(tree.verify(&data[4], &tree.proofs()[4]).unwrap());
    }

    #[test]
    fn test_proof_needs_nodes() {
        let data = blocks(4);
        let tree = build(&data, &Config::default()).unwrap();
        assert!(matches!(
            tree.proof(&data[0]),
            Err(MerkleError::NodesNotRetained)
        ));
        assert!(matches!(
            tree.check_consistency(),
            Err(MerkleError::NodesNotRetained)
        ));
    }

    #[test]
    fn test_tree_build_only() {
        let data = blocks(6);
        let config = Config::default().with_mode(TreeMode::TreeBuildOnly);
        let tree = build(&data, &config).unwrap();
        assert!(tree.proofs().is_empty());
        let proof = tree.proof(&data[5]).unwrap();
        assert!(tree.verify(&data[5], &proof).unwrap());
        assert!(matches!(
            tree.proof(&b"missing"[..]),
            Err(MerkleError::InvalidDataBlock)
        ));
        tree.check_consistency().unwrap();
    }

    #[test]
    fn test_proof_matches_recorded() {
        let data = blocks(11);
        let config = Config::default().with_mode(TreeMode::ProofGenAndTreeBuild);
        let tree = build(&data, &config).unwrap();
        for (i, block) in data.iter().enumerate() {
            assert_eq!(tree.proof(block).unwrap(), tree.proofs()[i]);
        }
    }

    #[test]
    fn test_leaves_in_every_mode() {
        let data = blocks(7);
        let expected = derive_leaves(&data, &Config::default()).unwrap();
        for mode in [
            TreeMode::ProofGenOnly,
            TreeMode::TreeBuildOnly,
            TreeMode::ProofGenAndTreeBuild,
        ] {
            let tree = build(&data, &Config::default().with_mode(mode)).unwrap();
            assert_eq!(tree.leaves(), expected.as_slice());
            assert_eq!(tree.num_leaves(), 7);
            if let Some(nodes) = tree.nodes() {
                assert!(tree.leaves.is_empty());
                assert_eq!(nodes[0], expected);
            }
        }
    }

    #[test]
    fn test_single_leaf() {
        let data = blocks(1);
        let tree = build(&data, &Config::default()).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), tree.leaves()[0].as_slice());
        assert!(tree.verify(&data[0], &tree.proofs()[0]).unwrap());
    }
}
