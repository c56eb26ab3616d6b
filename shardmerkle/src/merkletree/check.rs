//! Consistency checks over node rows.
//!
//! These functions verify:
//! - Row lengths follow the `ceil(len / 2)` pairing rule
//! - Every parent is the hash of its two children
//! - The last row of a full tree holds exactly the root

use super::builder::Levels;
use crate::config::Config;
use crate::utils::{parent_len, sibling_index};
use crate::{MerkleError, Result};

/// Verifies that each row is the parent row of the one before it.
///
/// # Returns
/// A description of the first violation, if any
pub fn check_row_lengths(rows: &[Vec<Vec<u8>>]) -> std::result::Result<(), String> {
    if rows.first().map_or(true, |r| r.is_empty()) {
        return Err("first row is empty".to_string());
    }
    for (i, pair) in rows.windows(2).enumerate() {
        let expected = parent_len(pair[0].len());
        if pair[1].len() != expected {
            return Err(format!(
                "row {} has {} nodes, expected {}",
                i + 1,
                pair[1].len(),
                expected
            ));
        }
    }
    Ok(())
}

/// Recomputes every parent that has both children inside `rows`.
///
/// # Arguments
/// * `rows` - Consecutive rows, the first at tree level `start_level`
/// * `start_level` - Tree level of `rows[0]`, used in error reports
/// * `config` - Supplies the hash function and pair sorting
///
/// # Errors
/// `Inconsistent` with the absolute level and index of the first bad parent
pub fn check_rows(rows: &[Vec<Vec<u8>>], start_level: usize, config: &Config) -> Result<()> {
    for (i, pair) in rows.windows(2).enumerate() {
        let (children, parents) = (&pair[0], &pair[1]);
        for (j, parent) in parents.iter().enumerate() {
            let left = 2 * j;
            let right = sibling_index(left, children.len());
            let sum = config.hash_pair(&children[left], &children[right])?;
            if sum != *parent {
                return Err(MerkleError::Inconsistent {
                    level: start_level + i + 1,
                    index: j,
                });
            }
        }
    }
    Ok(())
}

/// Verifies that the top row of a full tree is exactly `[root]`.
pub fn check_root(levels: &Levels, root: &[u8]) -> Result<()> {
    let depth = levels.len() - 1;
    match levels.last() {
        Some(top) if top.len() == 1 && top[0] == root => Ok(()),
        _ => Err(MerkleError::Inconsistent {
            level: depth,
            index: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkletree::builder::build_levels;

    fn levels(n: usize) -> Levels {
        let leaves = (0..n as u8).map(|i| vec![i; 32]).collect();
        build_levels(leaves, &Config::default(), None).unwrap()
    }

    #[test]
    fn test_check_valid() {
        let l = levels(13);
        check_row_lengths(&l).unwrap();
        check_rows(&l, 0, &Config::default()).unwrap();
        check_root(&l, &l[l.len() - 1][0]).unwrap();
    }

    #[test]
    fn test_check_detects_tamper() {
        let mut l = levels(13);
        l[2][1][0] ^= 0xff;
        let err = check_rows(&l, 0, &Config::default()).unwrap_err();
        assert!(matches!(err, MerkleError::Inconsistent { level: 2, index: 1 }));
    }

    #[test]
    fn test_check_band_offset() {
        let mut l = levels(16);
        l[3][0][0] ^= 1;
        let err = check_rows(&l[2..4], 2, &Config::default()).unwrap_err();
        assert!(matches!(err, MerkleError::Inconsistent { level: 3, index: 0 }));
    }

    #[test]
    fn test_check_row_lengths() {
        let mut l = levels(10);
        assert!(check_row_lengths(&l).is_ok());
        l[1].pop();
        assert!(check_row_lengths(&l).is_err());
        assert!(check_row_lengths(&[]).is_err());
    }
}
