//! Error types shared by tree construction, proof handling and level caches.

use thiserror::Error;

/// Errors produced by the Merkle tree engine.
///
/// A proof that simply does not match a root is not an error; verification
/// functions return `Ok(false)` in that case.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("no data blocks to build a tree from")]
    EmptyInput,

    #[error("hash function failed: {0}")]
    HashFailure(#[source] anyhow::Error),

    #[error("data block serialization failed: {0}")]
    DataBlockSerialize(#[source] anyhow::Error),

    #[error("duplicate leaf hash at positions {first} and {second}")]
    DuplicateLeaf { first: usize, second: usize },

    #[error("invalid level cache bounds: start={start} span={span} depth={depth}")]
    InvalidCacheBounds {
        start: usize,
        span: usize,
        depth: usize,
    },

    #[error("data block is not part of the tree or cache")]
    InvalidDataBlock,

    #[error("merkle tree is nil")]
    NilTree,

    #[error("node grid was not retained, build with a tree-building mode")]
    NodesNotRetained,

    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),

    #[error("level cache persistence failed: {0}")]
    PersistenceError(#[from] PersistenceError),

    #[error("corrupt level cache: {0}")]
    CorruptCache(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("node mismatch at level {level} index {index}")]
    Inconsistent { level: usize, index: usize },
}

/// I/O and decoding failures while storing or loading a level cache.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, MerkleError>;

impl From<std::io::Error> for MerkleError {
    fn from(e: std::io::Error) -> Self {
        MerkleError::PersistenceError(PersistenceError::Io(e))
    }
}

impl From<bincode::Error> for MerkleError {
    fn from(e: bincode::Error) -> Self {
        MerkleError::PersistenceError(PersistenceError::Codec(e))
    }
}
