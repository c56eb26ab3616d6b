//! Level caches: persisted bands of tree levels for sharded proof generation.
//!
//! A [`LevelCache`] holds a copy of levels `start..start + span` of a built
//! tree together with a map from each level-`start` hash to its index. It can
//! prove any node of its bottom row up to the top of the band without the rest
//! of the tree:
//!
//! ```text
//! level 5   root                      ^
//! level 4   . .                       |  cache B: start 2, span 3
//! level 3   . . . .                   |
//! level 2   . . . . . . .             v  <- proves cache A's local root
//! level 1   . . . . . . . . . . . .   ^  cache A: start 0, span 2
//! level 0   . . . . . . . . . . . . . v  <- proves a leaf
//! ```
//!
//! Proof paths carry absolute bit positions, so a proof from cache A and a
//! proof from cache B for A's local root add up to the full-tree proof via
//! [`append_proof`].
//!
//! Caches are stored as a bincode container (see [`LevelCache::store`]); a
//! loaded cache is checked against the structural invariants before use.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use bincode::Options;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::builder::{walk_proof, Levels};
use super::check;
use super::proof::Proof;
use super::tree::MerkleTree;
use crate::config::Config;
use crate::def::{CACHE_FILE_MAGIC, CACHE_FILE_VERSION, MAX_DEPTH};
use crate::leaf::{derive_leaf, DataBlock};
use crate::utils::depth_for;
use crate::{MerkleError, Result};

/// A snapshot of a contiguous band of tree levels.
#[derive(Debug)]
pub struct LevelCache {
    /// First covered level, 0 is the leaf level
    start: usize,
    /// Number of covered levels
    span: usize,
    /// Depth of the tree the band was taken from
    depth: usize,
    /// Rows of the band, `nodes[0]` is level `start`
    nodes: Levels,
    /// Level-`start` hash to the first index holding it
    leaf_map: Mutex<HashMap<Vec<u8>, usize>>,
}

/// On-disk layout of a level cache.
#[derive(Serialize, Deserialize)]
struct CacheFile {
    magic: [u8; 8],
    version: u32,
    start: u64,
    span: u64,
    depth: u64,
    nodes: Levels,
    leaf_map: BTreeMap<Vec<u8>, u64>,
}

/// Fixed-width little-endian encoding that refuses bytes after the container.
fn file_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn check_bounds(start: usize, span: usize, depth: usize) -> Result<()> {
    if start >= depth || span < 1 || span > depth - start {
        return Err(MerkleError::InvalidCacheBounds { start, span, depth });
    }
    Ok(())
}

fn map_row(row: &[Vec<u8>]) -> HashMap<Vec<u8>, usize> {
    let mut map = HashMap::with_capacity(row.len());
    for (i, h) in row.iter().enumerate() {
        map.entry(h.clone()).or_insert(i);
    }
    map
}

/// Appends the proof of a higher band to the proof of a lower band.
///
/// `sub` must come from the band that starts right where `base`'s band ends;
/// their path bits then occupy disjoint ranges and the sum is the combined path.
pub fn append_proof(mut base: Proof, sub: Proof) -> Proof {
    base.path = base.path.wrapping_add(sub.path);
    base.siblings.extend(sub.siblings);
    base
}

impl LevelCache {
    /// Copies levels `start..start + span` out of `tree`.
    ///
    /// # Arguments
    /// * `tree` - Source tree, built in a mode that retains its nodes
    /// * `start` - First level to copy, in `0..depth`
    /// * `span` - Number of levels, in `1..=depth - start`
    ///
    /// # Errors
    /// * `NilTree` if `tree` is `None`
    /// * `InvalidCacheBounds` if the band does not fit below the root
    /// * `NodesNotRetained` if the tree dropped its node grid
    pub fn new(tree: Option<&MerkleTree>, start: usize, span: usize) -> Result<Self> {
        let tree = tree.ok_or(MerkleError::NilTree)?;
        let depth = tree.depth();
        check_bounds(start, span, depth)?;
        let levels = tree.nodes().ok_or(MerkleError::NodesNotRetained)?;

        let (leaf_map, nodes) = rayon::join(
            || map_row(&levels[start]),
            || levels[start..start + span].to_vec(),
        );
        debug!(
            "level cache created: start {}, span {}, {} nodes at bottom",
            start,
            span,
            nodes[0].len()
        );
        Ok(Self {
            start,
            span,
            depth,
            nodes,
            leaf_map: Mutex::new(leaf_map),
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Depth of the tree this band belongs to.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn nodes(&self) -> &Levels {
        &self.nodes
    }

    /// Number of nodes on the band's bottom level.
    pub fn leaf_count(&self) -> usize {
        self.nodes[0].len()
    }

    /// Proves `block` up to the top of the band.
    ///
    /// The block is turned into a level-`start` hash with `config`; for a
    /// band above the leaves pass the lower band's local root together with
    /// `disable_leaf_hashing`.
    ///
    /// # Returns
    /// The band proof, with path bits at `start..start + span`, and the
    /// recomputed hash at level `start + span`
    ///
    /// # Errors
    /// * `InvalidDataBlock` if the hash is not on the band's bottom level
    /// * `HashFailure` / `DataBlockSerialize` if a collaborator fails
    pub fn prove<B: DataBlock + ?Sized>(
        &self,
        block: &B,
        config: &Config,
    ) -> Result<(Proof, Vec<u8>)> {
        let leaf = derive_leaf(block, config)?;
        let idx = {
            let leaf_map = self.leaf_map.lock();
            *leaf_map.get(&leaf).ok_or(MerkleError::InvalidDataBlock)?
        };

        let (proof, _) = walk_proof(&self.nodes, self.start, idx);
        let mut local_root = leaf;
        for (i, sib) in proof.siblings.iter().enumerate() {
            local_root = if proof.is_right(self.start + i) {
                config.hash_pair(sib, &local_root)?
            } else {
                config.hash_pair(&local_root, sib)?
            };
        }
        Ok((proof, local_root))
    }

    /// Recomputes every parent inside the band with `config`.
    pub fn check(&self, config: &Config) -> Result<()> {
        check::check_rows(&self.nodes, self.start, config)
    }

    /// Writes the cache to `path`, replacing any existing file.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let leaf_map = self
            .leaf_map
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v as u64))
            .collect();
        let content = CacheFile {
            magic: CACHE_FILE_MAGIC,
            version: CACHE_FILE_VERSION,
            start: self.start as u64,
            span: self.span as u64,
            depth: self.depth as u64,
            nodes: self.nodes.clone(),
            leaf_map,
        };
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        file_codec().serialize_into(&mut writer, &content)?;
        writer.flush()?;
        info!(
            "level cache stored to {}: start {}, span {}",
            path.as_ref().display(),
            self.start,
            self.span
        );
        Ok(())
    }

    /// Reads a cache written by [`LevelCache::store`].
    ///
    /// # Errors
    /// * `PersistenceError` if the file cannot be read or decoded
    /// * `CorruptCache` if the decoded content violates the band invariants
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bz = fs::read(path.as_ref())?;
        let content: CacheFile = file_codec().deserialize(&bz)?;
        match Self::from_file_content(content) {
            Ok(cache) => {
                info!(
                    "level cache loaded from {}: start {}, span {}",
                    path.as_ref().display(),
                    cache.start,
                    cache.span
                );
                Ok(cache)
            }
            Err(e) => {
                warn!("rejected level cache {}: {}", path.as_ref().display(), e);
                Err(e)
            }
        }
    }

    fn from_file_content(content: CacheFile) -> Result<Self> {
        let corrupt = |msg: String| Err(MerkleError::CorruptCache(msg));
        if content.magic != CACHE_FILE_MAGIC {
            return corrupt("bad magic".to_string());
        }
        if content.version != CACHE_FILE_VERSION {
            return corrupt(format!("unsupported version {}", content.version));
        }
        let (start, span, depth) = (
            content.start as usize,
            content.span as usize,
            content.depth as usize,
        );
        if depth > MAX_DEPTH || check_bounds(start, span, depth).is_err() {
            return corrupt(format!(
                "bounds out of range: start {} span {} depth {}",
                start, span, depth
            ));
        }
        let nodes = content.nodes;
        if nodes.len() != span {
            return corrupt(format!("{} rows for span {}", nodes.len(), span));
        }
        if let Err(msg) = check::check_row_lengths(&nodes) {
            return corrupt(msg);
        }
        // the top row of the band fixes how many levels remain up to the root
        let top_level = start + span - 1;
        if top_level + depth_for(nodes[span - 1].len()) != depth {
            return corrupt(format!("band rows do not lead to depth {}", depth));
        }

        let bottom = &nodes[0];
        let mut leaf_map = HashMap::with_capacity(content.leaf_map.len());
        for (hash, idx) in content.leaf_map {
            let idx = idx as usize;
            if bottom.get(idx) != Some(&hash) {
                return corrupt(format!("leaf map entry {} does not match row", idx));
            }
            leaf_map.insert(hash, idx);
        }
        let distinct = bottom.iter().collect::<HashSet<_>>().len();
        if leaf_map.len() != distinct {
            return corrupt(format!(
                "leaf map has {} entries for {} distinct nodes",
                leaf_map.len(),
                distinct
            ));
        }

        Ok(Self {
            start,
            span,
            depth,
            nodes,
            leaf_map: Mutex::new(leaf_map),
        })
    }
}
