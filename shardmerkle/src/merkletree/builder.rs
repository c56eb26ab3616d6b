//! Level-by-level construction of the node grid and per-leaf proofs.
//!
//! Level 0 holds the leaf hashes. Each following level holds
//! `ceil(len / 2)` parents; when a level has an odd length its last node is
//! paired with itself. Rows are stored without that padding.
//!
//! The parallel path runs on a fixed-size rayon pool. Within one level the
//! pairs are independent and are hashed as a fork-join; the join at the end of
//! the level is the barrier that keeps level `L + 1` from reading unfinished
//! parents of level `L`. Both paths produce identical rows.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use super::proof::Proof;
use crate::config::Config;
use crate::utils::{depth_for, sibling_index};
use crate::{MerkleError, Result};

/// Node rows from the leaves (index 0) up to the single root.
pub type Levels = Vec<Vec<Vec<u8>>>;

/// Creates the worker pool used by a parallel build.
///
/// # Arguments
/// * `num_routines` - Number of workers, 0 for one per CPU
pub(crate) fn new_pool(num_routines: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_routines)
        .thread_name(|i| format!("merkle-worker-{}", i))
        .build()
        .map_err(|e| MerkleError::ThreadPool(e.to_string()))
}

fn hash_pairs(level: &[Vec<u8>], config: &Config) -> Result<Vec<Vec<u8>>> {
    level
        .chunks(2)
        .map(|pair| config.hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

fn hash_pairs_par(level: &[Vec<u8>], config: &Config) -> Result<Vec<Vec<u8>>> {
    level
        .par_chunks(2)
        .map(|pair| config.hash_pair(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Builds every level above `leaves`.
///
/// # Arguments
/// * `leaves` - Leaf hashes, at least one
/// * `config` - Supplies the hash function and pair sorting
/// * `pool` - Worker pool for a parallel build, `None` for sequential
///
/// # Returns
/// All rows, the last one holding only the root
pub(crate) fn build_levels(
    leaves: Vec<Vec<u8>>,
    config: &Config,
    pool: Option<&ThreadPool>,
) -> Result<Levels> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyInput);
    }
    let depth = depth_for(leaves.len());
    let mut levels = Vec::with_capacity(depth + 1);
    levels.push(leaves);
    while levels[levels.len() - 1].len() > 1 {
        let current = &levels[levels.len() - 1];
        let next = match pool {
            Some(pool) => pool.install(|| hash_pairs_par(current, config))?,
            None => hash_pairs(current, config)?,
        };
        levels.push(next);
    }
    debug!(
        "built {} levels over {} leaves (parallel: {})",
        levels.len(),
        levels[0].len(),
        pool.is_some()
    );
    Ok(levels)
}

/// Collects the proof of the node at `index` on row `start` while climbing
/// `span` rows of `rows`.
///
/// Path bits are written at absolute positions `start..start + span` so that
/// proofs from adjacent bands can be added together.
///
/// # Returns
/// The proof and the index reached on the row above the band
pub(crate) fn walk_proof(rows: &[Vec<Vec<u8>>], start: usize, mut index: usize) -> (Proof, usize) {
    let mut path = 0u64;
    let mut siblings = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if index & 1 == 1 {
            path |= 1 << (start + i);
        }
        siblings.push(row[sibling_index(index, row.len())].clone());
        index >>= 1;
    }
    (Proof { path, siblings }, index)
}

/// Generates the proof of leaf `index` from a complete set of levels.
pub(crate) fn proof_at(levels: &Levels, index: usize) -> Proof {
    let depth = levels.len() - 1;
    walk_proof(&levels[..depth], 0, index).0
}

/// Generates one proof per leaf, in leaf order.
pub(crate) fn generate_proofs(levels: &Levels, pool: Option<&ThreadPool>) -> Vec<Proof> {
    let n = levels[0].len();
    match pool {
        Some(pool) => {
            pool.install(|| (0..n).into_par_iter().map(|i| proof_at(levels, i)).collect())
        }
        None => (0..n).map(|i| proof_at(levels, i)).collect(),
    }
}

/// Maps every leaf hash to the first index that holds it.
///
/// With `reject_duplicates` the first repeated hash fails the build.
pub(crate) fn index_leaves(
    leaves: &[Vec<u8>],
    reject_duplicates: bool,
) -> Result<HashMap<Vec<u8>, usize>> {
    let mut map = HashMap::with_capacity(leaves.len());
    for (i, leaf) in leaves.iter().enumerate() {
        if let Some(&first) = map.get(leaf) {
            if reject_duplicates {
                return Err(MerkleError::DuplicateLeaf { first, second: i });
            }
            continue;
        }
        map.insert(leaf.clone(), i);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hasher::{concat_hash, sha256};

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| sha256((i as u64).to_le_bytes()).to_vec()).collect()
    }

    fn parent(a: &[u8], b: &[u8]) -> Vec<u8> {
        sha256(concat_hash(a, b)).to_vec()
    }

    #[test]
    fn test_build_levels_odd() {
        let l = leaves(5);
        let levels = build_levels(l.clone(), &Config::default(), None).unwrap();
        assert_eq!(
            levels.iter().map(|r| r.len()).collect::<Vec<_>>(),
            vec![5, 3, 2, 1]
        );
        let n10 = parent(&l[0], &l[1]);
        let n11 = parent(&l[2], &l[3]);
        let n12 = parent(&l[4], &l[4]);
        let n20 = parent(&n10, &n11);
        let n21 = parent(&n12, &n12);
        assert_eq!(levels[1], vec![n10, n11, n12]);
        assert_eq!(levels[3][0], parent(&n20, &n21));
    }

    #[test]
    fn test_build_levels_single_leaf() {
        let l = leaves(1);
        let levels = build_levels(l.clone(), &Config::default(), None).unwrap();
        assert_eq!(levels, vec![l]);
        assert!(proof_at(&levels, 0).is_empty());
    }

    #[test]
    fn test_build_levels_empty() {
        let err = build_levels(vec![], &Config::default(), None).unwrap_err();
        assert!(matches!(err, MerkleError::EmptyInput));
    }

    #[test]
    fn test_parallel_levels_match() {
        let config = Config::default();
        for n in [1, 2, 3, 7, 64, 100, 257] {
            let seq = build_levels(leaves(n), &config, None).unwrap();
            for workers in [1, 3, 8] {
                let pool = new_pool(workers).unwrap();
                let par = build_levels(leaves(n), &config, Some(&pool)).unwrap();
                assert_eq!(seq, par);
                assert_eq!(generate_proofs(&seq, None), generate_proofs(&par, Some(&pool)));
            }
        }
    }

    #[test]
    fn test_proof_path_bits() {
        let levels = build_levels(leaves(5), &Config::default(), None).unwrap();
        // leaf 4 is the left child at level 0, then index 2 (left), then 1 (right)
        let proof = proof_at(&levels, 4);
        assert_eq!(proof.path, 0b100);
        assert_eq!(proof.siblings[0], levels[0][4]);
        assert_eq!(proof.siblings[1], levels[1][2]);
        assert_eq!(proof.siblings[2], levels[2][0]);
        assert_eq!(proof_at(&levels, 3).path, 0b011);
    }

    #[test]
    fn test_walk_proof_offset() {
        let levels = build_levels(leaves(8), &Config::default(), None).unwrap();
        let (proof, top) = walk_proof(&levels[1..3], 1, 3);
        assert_eq!(proof.path, 0b110);
        assert_eq!(top, 0);
        assert_eq!(proof.siblings, vec![levels[1][2].clone(), levels[2][0].clone()]);
    }

    #[test]
    fn test_index_leaves() {
        let mut l = leaves(4);
        l.push(l[1].clone());
        let err = index_leaves(&l, true).unwrap_err();
        assert!(matches!(err, MerkleError::DuplicateLeaf { first: 1, second: 4 }));
        let map = index_leaves(&l, false).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map[&l[4]], 1);
    }

    #[test]
    fn test_hash_failure_aborts() {
        let config = Config::default().with_hash_func(std::sync::Arc::new(
            |_: &[u8]| -> anyhow::Result<Vec<u8>> { anyhow::bail!("digest broken") },
        ));
        let pool = new_pool(2).unwrap();
        assert!(matches!(
            build_levels(leaves(9), &config, None),
            Err(MerkleError::HashFailure(_))
        ));
        assert!(matches!(
            build_levels(leaves(9), &config, Some(&pool)),
            Err(MerkleError::HashFailure(_))
        ));
    }
}
