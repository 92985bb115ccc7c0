//! zlib and gzip wrappers used for region chunks and `level.dat`.
//!
//! The discriminants are the compression scheme bytes stored in front of
//! every chunk in a region file.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use log::trace;

use crate::error::{Result, WorldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    Gzip = 1,
    #[default]
    Zlib = 2,
    None = 3,
}

impl TryFrom<u8> for Compression {
    type Error = WorldError;

    fn try_from(scheme: u8) -> Result<Self> {
        match scheme {
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Zlib),
            3 => Ok(Compression::None),
            other => Err(WorldError::UnsupportedCompression(other)),
        }
    }
}

/// zlib's `Z_DEFAULT_COMPRESSION`.
pub const DEFAULT_LEVEL: u32 = 6;

/// Decompresses `src`. Output beyond `limit` bytes is an error.
pub fn inflate(src: &[u8], mode: Compression, limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    // Read one byte past the limit so oversized streams are detected
    // instead of silently truncated.
    let cap = limit as u64 + 1;
    let read = match mode {
        Compression::Gzip => GzDecoder::new(src).take(cap).read_to_end(&mut out),
        Compression::Zlib => ZlibDecoder::new(src).take(cap).read_to_end(&mut out),
        Compression::None => {
            out.extend_from_slice(src);
            Ok(src.len())
        }
    };
    read.map_err(|e| WorldError::DecompressionError(format!("{:?} stream: {}", mode, e)))?;

    if out.len() > limit {
        return Err(WorldError::DecompressionError(format!(
            "output exceeds the {} byte limit",
            limit
        )));
    }
    trace!("[compression] inflated {} -> {} bytes ({:?})", src.len(), out.len(), mode);
    Ok(out)
}

/// Compresses `src` at `level` (0-9).
pub fn deflate(src: &[u8], mode: Compression, level: u32) -> Result<Vec<u8>> {
    let level = flate2::Compression::new(level.min(9));
    let wrap = |e: std::io::Error| WorldError::CompressionError(e.to_string());
    let out = match mode {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(src).map_err(wrap)?;
            encoder.finish().map_err(wrap)?
        }
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder.write_all(src).map_err(wrap)?;
            encoder.finish().map_err(wrap)?
        }
        Compression::None => src.to_vec(),
    };
    trace!("[compression] deflated {} -> {} bytes ({:?})", src.len(), out.len(), mode);
    Ok(out)
}
