//! Tunables for opening a world, with the JS `WorldOptions` object that maps onto them.

use napi_derive::napi;

use crate::compression::{Compression, DEFAULT_LEVEL};
use crate::error::{Result, WorldError};

/// Largest decompressed chunk or `level.dat` accepted (1 MiB).
pub const DEFAULT_INFLATE_LIMIT: usize = 1 << 20;

/// Block table used for `block_name` lookups.
pub const DEFAULT_REGISTRY_VERSION: &str = "1.12.2";

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
  pub inflate_limit: usize,
  /// Scheme used when chunks are written back to regions.
  pub chunk_compression: Compression,
  pub compression_level: u32,
  pub registry_version: String,
}

impl Default for WorldConfig {
  fn default() -> Self {
    WorldConfig {
      inflate_limit: DEFAULT_INFLATE_LIMIT,
      chunk_compression: Compression::Zlib,
      compression_level: DEFAULT_LEVEL,
      registry_version: DEFAULT_REGISTRY_VERSION.to_string(),
    }
  }
}

#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct JsWorldOptions {
  pub inflate_limit: Option<u32>,
  /// 1 = gzip, 2 = zlib, 3 = uncompressed
  pub compression: Option<u32>,
  pub compression_level: Option<u32>,
  pub version: Option<String>,
}

impl TryFrom<JsWorldOptions> for WorldConfig {
  type Error = WorldError;

  fn try_from(options: JsWorldOptions) -> Result<Self> {
    let mut config = WorldConfig::default();
    if let Some(limit) = options.inflate_limit {
      config.inflate_limit = limit as usize;
    }
    if let Some(scheme) = options.compression {
      let scheme = u8::try_from(scheme).map_err(|_| WorldError::UnsupportedCompression(u8::MAX))?;
      config.chunk_compression = Compression::try_from(scheme)?;
    }
    if let Some(level) = options.compression_level {
      config.compression_level = level.min(9);
    }
    if let Some(version) = options.version {
      config.registry_version = version;
    }
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn options_override_defaults() {
    let config = WorldConfig::try_from(JsWorldOptions {
      compression: Some(1),
      compression_level: Some(12),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(config.chunk_compression, Compression::Gzip);
    assert_eq!(config.compression_level, 9);
    assert_eq!(config.inflate_limit, DEFAULT_INFLATE_LIMIT);
    assert_eq!(config.registry_version, "1.12.2");
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let options = JsWorldOptions {
      compression: Some(7),
      ..Default::default()
    };
    assert!(matches!(
      WorldConfig::try_from(options),
      Err(WorldError::UnsupportedCompression(7))
    ));
  }
}
