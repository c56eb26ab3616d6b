//! Utility functions for shardmerkle.
//!
//! This module provides:
//! - Hashing functions and the pooled default digest
//! - Little-endian encoding helpers used by the proof codec

pub mod codec;
pub mod hasher;

/// Number of nodes on the level above a level holding `len` nodes.
/// An odd last node is paired with itself.
pub fn parent_len(len: usize) -> usize {
    len.div_ceil(2)
}

/// Index of the node paired with `index` on a level holding `len` nodes.
///
/// The last node of an odd-length level is its own sibling.
pub fn sibling_index(index: usize, len: usize) -> usize {
    let sib = index ^ 1;
    if sib < len {
        sib
    } else {
        index
    }
}

/// Number of combine passes needed to reduce `leaf_count` nodes to one.
pub fn depth_for(leaf_count: usize) -> usize {
    let mut depth = 0;
    let mut len = leaf_count;
    while len > 1 {
        len = parent_len(len);
        depth += 1;
    }
    depth
}
