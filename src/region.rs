//! Region files (`r.<x>.<z>.mca`): a 32x32 grid of chunks stored in 4 KiB sectors.
//!
//! The first sector holds 1024 big-endian location entries (3-byte sector
//! offset, 1-byte sector count), the second 1024 u32 timestamps. Each chunk
//! starts with a u32 length (counting the scheme byte) and a scheme byte.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use log::{debug, trace};

use crate::compression::{deflate, inflate, Compression};
use crate::config::DEFAULT_INFLATE_LIMIT;
use crate::coords::{ChunkCoords, RegionCoords, REGION_CHUNKS};
use crate::error::{Result, WorldError};
use crate::nbt::{hex_dump, read_root, write_root, NamedTag};

pub const SECTOR_BYTES: usize = 4096;
/// Location table plus timestamp table.
pub const HEADER_BYTES: usize = 2 * SECTOR_BYTES;
/// The location entry stores the sector count in a single byte.
pub const MAX_CHUNK_SECTORS: usize = 255;
/// u32 length + scheme byte.
const CHUNK_HEADER_BYTES: usize = 5;
const FIRST_DATA_SECTOR: usize = HEADER_BYTES / SECTOR_BYTES;

/// Sectors needed for a compressed payload of `size` bytes plus its header.
pub fn required_sectors(size: usize) -> usize {
  (size + CHUNK_HEADER_BYTES).div_ceil(SECTOR_BYTES)
}

/// Rounds `size` up to a whole number of sectors.
pub fn pad_size(size: usize) -> usize {
  size.div_ceil(SECTOR_BYTES) * SECTOR_BYTES
}

/// Extracts the region coordinates from a file name such as
/// `world/region/r.-1.2.mca`.
pub fn parse_region_filename(name: &str) -> Option<RegionCoords> {
  let file = Path::new(name).file_name()?.to_str()?;
  let stem = file.strip_suffix(".mca")?;
  let mut parts = stem.rsplitn(3, '.');
  let z = parts.next()?.parse().ok()?;
  let x = parts.next()?.parse().ok()?;
  // Something (normally "r") has to precede the coordinates.
  parts.next()?;
  Some(RegionCoords::new(x, z))
}

#[derive(Debug, Clone)]
pub struct Region {
  coords: RegionCoords,
  buffer: Vec<u8>,
  inflate_limit: usize,
  modified: bool,
}

impl Region {
  /// An empty region: header only, every slot unused.
  pub fn new(x: i32, z: i32) -> Self {
    Region {
      coords: RegionCoords::new(x, z),
      buffer: vec![0; HEADER_BYTES],
      inflate_limit: DEFAULT_INFLATE_LIMIT,
      modified: true,
    }
  }

  pub fn from_bytes(coords: RegionCoords, mut buffer: Vec<u8>) -> Result<Self> {
    if buffer.len() < HEADER_BYTES {
      return Err(WorldError::InvalidRegion(format!(
        "{} is {} bytes, shorter than the {} byte header",
        coords.file_name(),
        buffer.len(),
        HEADER_BYTES
      )));
    }
    let padded = pad_size(buffer.len());
    if padded != buffer.len() {
      debug!(
        "[region {}] padding {} bytes to {}",
        coords.file_name(),
        buffer.len(),
        padded
      );
      buffer.resize(padded, 0);
    }
    Ok(Region {
      coords,
      buffer,
      inflate_limit: DEFAULT_INFLATE_LIMIT,
      modified: false,
    })
  }

  /// Reads a region file; its coordinates come from the file name.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let coords = parse_region_filename(&path.to_string_lossy()).ok_or_else(|| {
      WorldError::InvalidRegion(format!("{} is not a region file name", path.display()))
    })?;
    let buffer = fs::read(path).map_err(|source| WorldError::File {
      context: format!("Unable to open {} for reading", path.display()),
      source,
    })?;
    debug!("[region {}] loaded {} bytes", coords.file_name(), buffer.len());
    Self::from_bytes(coords, buffer)
  }

  pub fn with_inflate_limit(mut self, limit: usize) -> Self {
    self.inflate_limit = limit;
    self
  }

  pub fn coords(&self) -> RegionCoords {
    self.coords
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.buffer
  }

  pub fn is_modified(&self) -> bool {
    self.modified
  }

  fn location(&self, slot: usize) -> (usize, usize) {
    let entry = BigEndian::read_u32(&self.buffer[slot * 4..slot * 4 + 4]);
    ((entry >> 8) as usize, (entry & 0xff) as usize)
  }

  fn set_location(&mut self, slot: usize, offset: usize, sectors: usize) {
    let entry = ((offset as u32) << 8) | (sectors as u32 & 0xff);
    BigEndian::write_u32(&mut self.buffer[slot * 4..slot * 4 + 4], entry);
  }

  fn set_timestamp(&mut self, slot: usize, timestamp: u32) {
    let at = SECTOR_BYTES + slot * 4;
    BigEndian::write_u32(&mut self.buffer[at..at + 4], timestamp);
  }

  /// Last-modified time (unix seconds) recorded for a chunk, 0 if never written.
  pub fn timestamp(&self, cx: i32, cz: i32) -> u32 {
    let at = SECTOR_BYTES + ChunkCoords::new(cx, cz).region_slot() * 4;
    BigEndian::read_u32(&self.buffer[at..at + 4])
  }

  pub fn contains_chunk(&self, cx: i32, cz: i32) -> bool {
    self.location(ChunkCoords::new(cx, cz).region_slot()).0 != 0
  }

  /// Absolute coordinates of every populated slot.
  pub fn chunks(&self) -> Vec<ChunkCoords> {
    (0..REGION_CHUNKS)
      .filter(|&slot| self.location(slot).0 != 0)
      .map(|slot| self.coords.chunk_at_slot(slot))
      .collect()
  }

  /// Decompressed NBT bytes of a chunk, `None` for an empty slot.
  pub fn read_chunk_bytes(&self, cx: i32, cz: i32) -> Result<Option<Vec<u8>>> {
    let (offset, sectors) = self.location(ChunkCoords::new(cx, cz).region_slot());
    if offset == 0 {
      return Ok(None);
    }

    let start = offset * SECTOR_BYTES;
    if offset < FIRST_DATA_SECTOR || start + CHUNK_HEADER_BYTES > self.buffer.len() {
      return Err(WorldError::InvalidRegion(format!(
        "chunk ({}, {}) points at sector {}, outside the file",
        cx, cz, offset
      )));
    }

    let mut cursor = Cursor::new(&self.buffer[start..]);
    let length = cursor.read_u32::<BigEndian>()? as usize;
    let scheme = cursor.read_u8()?;
    trace!(
      "[region {}] chunk ({}, {}) at sector {} x{}, {} bytes, scheme {}\n{}",
      self.coords.file_name(),
      cx,
      cz,
      offset,
      sectors,
      length,
      scheme,
      hex_dump(&self.buffer[start..], 32)
    );

    if length == 0 || length + 4 > sectors * SECTOR_BYTES || start + 4 + length > self.buffer.len() {
      return Err(WorldError::InvalidRegion(format!(
        "chunk ({}, {}) claims {} bytes but owns {} sectors",
        cx, cz, length, sectors
      )));
    }

    let mode = Compression::try_from(scheme)?;
    let payload = &self.buffer[start + CHUNK_HEADER_BYTES..start + 4 + length];
    inflate(payload, mode, self.inflate_limit).map(Some)
  }

  pub fn read_chunk(&self, cx: i32, cz: i32) -> Result<Option<NamedTag>> {
    match self.read_chunk_bytes(cx, cz)? {
      Some(bytes) => read_root(&bytes).map(Some),
      None => Ok(None),
    }
  }

  /// First sector after every chunk currently referenced by the header.
  fn end_of_data(&self) -> usize {
    (0..REGION_CHUNKS)
      .map(|slot| self.location(slot))
      .filter(|&(offset, _)| offset != 0)
      .map(|(offset, sectors)| offset + sectors)
      .max()
      .unwrap_or(FIRST_DATA_SECTOR)
      .max(FIRST_DATA_SECTOR)
  }

  /// Encodes, compresses and stores a chunk. The slot's sectors are reused
  /// when the new data fits, otherwise the chunk moves to the end of the file.
  pub fn write_chunk(
    &mut self,
    cx: i32,
    cz: i32,
    root: &NamedTag,
    mode: Compression,
    level: u32,
    timestamp: u32,
  ) -> Result<()> {
    let raw = write_root(root)?;
    let payload = deflate(&raw, mode, level)?;
    let sectors = required_sectors(payload.len());
    if sectors > MAX_CHUNK_SECTORS {
      return Err(WorldError::ChunkTooLarge { x: cx, z: cz, sectors });
    }

    let slot = ChunkCoords::new(cx, cz).region_slot();
    let (old_offset, old_sectors) = self.location(slot);
    let offset = if old_offset >= FIRST_DATA_SECTOR && sectors <= old_sectors {
      old_offset
    } else {
      self.end_of_data()
    };

    let start = offset * SECTOR_BYTES;
    let end = start + sectors * SECTOR_BYTES;
    if self.buffer.len() < end {
      self.buffer.resize(end, 0);
    }

    BigEndian::write_u32(&mut self.buffer[start..start + 4], payload.len() as u32 + 1);
    self.buffer[start + 4] = mode as u8;
    let data_end = start + CHUNK_HEADER_BYTES + payload.len();
    self.buffer[start + CHUNK_HEADER_BYTES..data_end].copy_from_slice(&payload);
    self.buffer[data_end..end].fill(0);

    self.set_location(slot, offset, sectors);
    self.set_timestamp(slot, timestamp);
    self.modified = true;
    debug!(
      "[region {}] wrote chunk ({}, {}): {} -> {} bytes in {} sectors at {}",
      self.coords.file_name(),
      cx,
      cz,
      raw.len(),
      payload.len(),
      sectors,
      offset
    );
    Ok(())
  }

  /// Frees a slot. Its sectors are left in place until the file is rewritten.
  pub fn remove_chunk(&mut self, cx: i32, cz: i32) {
    let slot = ChunkCoords::new(cx, cz).region_slot();
    self.set_location(slot, 0, 0);
    self.set_timestamp(slot, 0);
    self.modified = true;
  }

  /// Path of this region inside a world directory.
  pub fn path_in(&self, world_dir: impl AsRef<Path>) -> PathBuf {
    world_dir.as_ref().join("region").join(self.coords.file_name())
  }

  /// Writes `<world_dir>/region/r.<x>.<z>.mca`, creating `region/` if needed.
  pub fn save(&mut self, world_dir: impl AsRef<Path>) -> Result<()> {
    let path = self.path_in(world_dir);
    let open_error = |source| WorldError::File {
      context: format!("Unable to open {} for writing", path.display()),
      source,
    };
    if let Some(dir) = path.parent() {
      fs::create_dir_all(dir).map_err(open_error)?;
    }
    fs::write(&path, &self.buffer).map_err(open_error)?;
    self.modified = false;
    debug!("[region {}] saved {} bytes", self.coords.file_name(), self.buffer.len());
    Ok(())
  }

  /// Saves and releases the region.
  pub fn unload(mut self, world_dir: impl AsRef<Path>) -> Result<()> {
    self.save(world_dir)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::nbt::{Compound, Tag};

  fn sample(x: i32, filler: usize) -> NamedTag {
    let mut level = Compound::new();
    level.insert("xPos", Tag::Int(x));
    level.insert("Noise", Tag::ByteArray((0..filler).map(|i| (i * 7919 % 251) as u8).collect()));
    let mut root = Compound::new();
    root.insert("Level", Tag::Compound(level));
    NamedTag::new("", root)
  }

  #[test]
  fn filename_parsing() {
    assert_eq!(parse_region_filename("r.0.0.mca"), Some(RegionCoords::new(0, 0)));
    assert_eq!(
      parse_region_filename("/saves/world/region/r.-3.12.mca"),
      Some(RegionCoords::new(-3, 12))
    );
    assert_eq!(parse_region_filename("r.1.mca"), None);
    assert_eq!(parse_region_filename("r.a.b.mca"), None);
    assert_eq!(parse_region_filename("r.0.0.mcr"), None);
    assert_eq!(parse_region_filename("0.0.mca"), None);
  }

  #[test]
  fn sector_math() {
    assert_eq!(required_sectors(0), 1);
    assert_eq!(required_sectors(4091), 1);
    assert_eq!(required_sectors(4092), 2);
    assert_eq!(pad_size(8192), 8192);
    assert_eq!(pad_size(8193), 12288);
  }

  #[test]
  fn write_then_read() {
    let mut region = Region::new(-1, 0);
    assert!(region.read_chunk(-1, 3).unwrap().is_none());

    let tag = sample(-1, 100);
    region.write_chunk(-1, 3, &tag, Compression::Zlib, 6, 1234).unwrap();
    assert_eq!(region.read_chunk(-1, 3).unwrap(), Some(tag));
    assert_eq!(region.timestamp(-1, 3), 1234);
    assert_eq!(region.chunks(), vec![ChunkCoords::new(-1, 3)]);

    // Slot 31 + 3 * 32, first data sector, one sector long.
    let entry = BigEndian::read_u32(&region.as_bytes()[4 * 127..4 * 128]);
    assert_eq!(entry, (2 << 8) | 1);
    assert_eq!(region.as_bytes().len(), 3 * SECTOR_BYTES);
  }

  #[test]
  fn rewrite_in_place_or_append() {
    let mut region = Region::new(0, 0);
    region.write_chunk(0, 0, &sample(0, 10), Compression::Zlib, 6, 1).unwrap();
    region.write_chunk(1, 0, &sample(1, 10), Compression::Zlib, 6, 1).unwrap();
    assert_eq!(region.location(0), (2, 1));
    assert_eq!(region.location(1), (3, 1));

    // Still fits one sector: same place.
    region.write_chunk(0, 0, &sample(0, 20), Compression::Zlib, 6, 2).unwrap();
    assert_eq!(region.location(0), (2, 1));

    // Incompressible data larger than a sector moves to the end.
    let big = sample(0, 6000);
    region.write_chunk(0, 0, &big, Compression::None, 6, 3).unwrap();
    assert_eq!(region.location(0), (4, 2));
    assert_eq!(region.read_chunk(0, 0).unwrap(), Some(big));
    assert_eq!(region.read_chunk(1, 0).unwrap(), Some(sample(1, 10)));
  }

  #[test]
  fn gzip_chunks_are_readable() {
    let mut region = Region::new(0, 0);
    region.write_chunk(5, 2, &sample(5, 50), Compression::Gzip, 6, 0).unwrap();
    let start = 2 * SECTOR_BYTES;
    assert_eq!(region.as_bytes()[start + 4], 1);
    assert_eq!(region.read_chunk(5, 2).unwrap(), Some(sample(5, 50)));
  }

  #[test]
  fn corrupt_headers_are_reported() {
    let mut region = Region::new(0, 0);
    region.set_location(0, 40, 1);
    assert!(matches!(region.read_chunk(0, 0), Err(WorldError::InvalidRegion(_))));

    let mut region = Region::new(0, 0);
    region.write_chunk(1, 0, &sample(1, 10), Compression::Zlib, 6, 0).unwrap();
    region.buffer[2 * SECTOR_BYTES + 4] = 9;
    assert!(matches!(
      region.read_chunk(1, 0),
      Err(WorldError::UnsupportedCompression(9))
    ));

    assert!(Region::from_bytes(RegionCoords::new(0, 0), vec![0; 100]).is_err());
  }

  #[test]
  fn remove_clears_slot() {
    let mut region = Region::new(0, 0);
    region.write_chunk(2, 2, &sample(2, 10), Compression::Zlib, 6, 9).unwrap();
    region.remove_chunk(2, 2);
    assert!(!region.contains_chunk(2, 2));
    assert_eq!(region.timestamp(2, 2), 0);
  }

  #[test]
  fn chunk_too_large() {
    let mut region = Region::new(0, 0);
    let err = region
      .write_chunk(0, 0, &sample(0, 256 * SECTOR_BYTES), Compression::None, 0, 0)
      .unwrap_err();
    assert!(matches!(err, WorldError::ChunkTooLarge { sectors, .. } if sectors > 255));
  }

  #[test]
  fn save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut region = Region::new(-2, 5);
    region.write_chunk(-64, 160, &sample(-64, 30), Compression::Zlib, 6, 77).unwrap();
    region.save(dir.path()).unwrap();
    assert!(!region.is_modified());

    let path = dir.path().join("region").join("r.-2.5.mca");
    let loaded = Region::load(&path).unwrap();
    assert_eq!(loaded.coords(), RegionCoords::new(-2, 5));
    assert_eq!(loaded.read_chunk(-64, 160).unwrap(), Some(sample(-64, 30)));
    assert_eq!(loaded.chunks(), vec![ChunkCoords::new(-64, 160)]);
  }

  #[test]
  fn short_files_are_padded() {
    let mut bytes = Region::new(0, 0).as_bytes().to_vec();
    bytes.extend_from_slice(&[0; 100]);
    let region = Region::from_bytes(RegionCoords::new(0, 0), bytes).unwrap();
    assert_eq!(region.as_bytes().len(), 3 * SECTOR_BYTES);
  }
}
