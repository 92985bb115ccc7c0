//! Error type shared by every module of the crate.

use thiserror::Error;

use crate::nbt::TagId;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O failure on a specific file, e.g. a region that could not be written.
    #[error("{context}: {source}")]
    File {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected end of NBT data while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("'{0}' is not a valid tag ID")]
    UnknownTag(u8),

    #[error("Invalid NBT: {0}")]
    InvalidNbt(String),

    #[error("Tag '{name}' holds {found:?}, expected {expected:?}")]
    TypeMismatch {
        name: String,
        expected: TagId,
        found: &'static str,
    },

    #[error("'{0}' is not a valid tag name")]
    InvalidTagName(String),

    #[error("Unable to decompress: {0}")]
    DecompressionError(String),

    #[error("Unable to compress: {0}")]
    CompressionError(String),

    #[error("Unsupported compression scheme {0}")]
    UnsupportedCompression(u8),

    #[error("Invalid region file: {0}")]
    InvalidRegion(String),

    #[error("Chunk ({x}, {z}) needs {sectors} sectors, at most 255 fit in a region slot")]
    ChunkTooLarge { x: i32, z: i32, sectors: usize },

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Coordinates ({x}, {y}, {z}) are outside the chunk")]
    OutOfBounds { x: i32, y: i32, z: i32 },

    #[error("Chunk at {x}, {z} not loaded")]
    ChunkNotLoaded { x: i32, z: i32 },

    #[error("Unable to open level.dat file at {0}")]
    MissingLevel(String),

    #[error("Block registry error: {0}")]
    Registry(String),

    #[error("A lock was poisoned by a panic in another thread")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, WorldError>;

impl From<WorldError> for napi::Error {
    fn from(err: WorldError) -> Self {
        napi::Error::new(napi::Status::GenericFailure, err.to_string())
    }
}
