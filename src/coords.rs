//! Defines coordinate systems and constants related to Anvil world geometry.

use std::ops::{BitAnd, Shr};

// --- World Geometry Constants (Anvil, 1.2 - 1.12) ---

/// Width/Length of a chunk section in blocks (16).
pub const SECTION_WIDTH: i32 = 16;
/// Height of a chunk section in blocks (16).
pub const SECTION_HEIGHT: i32 = 16;
/// Volume of a chunk section in blocks (16*16*16 = 4096).
pub const SECTION_VOLUME: usize = (SECTION_WIDTH * SECTION_HEIGHT * SECTION_WIDTH) as usize;
/// Number of block columns in a chunk (16*16 = 256).
pub const COLUMN_COUNT: usize = (SECTION_WIDTH * SECTION_WIDTH) as usize;

/// The total height of the world in blocks (256).
pub const WORLD_HEIGHT: i32 = 256;
/// The number of sections stacked in a chunk column (16).
pub const SECTION_COUNT: usize = (WORLD_HEIGHT / SECTION_HEIGHT) as usize;

/// Chunks along each side of a region (32).
pub const REGION_WIDTH: i32 = 32;
/// Chunk slots in a region file (32*32 = 1024).
pub const REGION_CHUNKS: usize = (REGION_WIDTH * REGION_WIDTH) as usize;

/// Absolute block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldCoords {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

/// Represents the X and Z coordinates of a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoords {
  pub x: i32,
  pub z: i32,
}

/// Coordinates of a region file, as in `r.<x>.<z>.mca`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoords {
  pub x: i32,
  pub z: i32,
}

/// Coordinates relative to the chunk column (x/z 0-15, y 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRelCoords {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

/// Represents coordinates relative to the start (min corner) of a chunk section (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionRelCoords {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

impl WorldCoords {
  pub fn new(x: i32, y: i32, z: i32) -> Self {
    WorldCoords { x, y, z }
  }

  /// Converts world coordinates to the coordinates of the containing chunk column.
  pub fn to_chunk_coords(&self) -> ChunkCoords {
    ChunkCoords {
      x: self.x.shr(4),
      z: self.z.shr(4),
    }
  }

  /// Position inside the containing chunk column. Y is passed through.
  pub fn to_column_rel_coords(&self) -> ColumnRelCoords {
    ColumnRelCoords {
      x: self.x.bitand(15),
      y: self.y,
      z: self.z.bitand(15),
    }
  }
}

impl ChunkCoords {
  pub fn new(x: i32, z: i32) -> Self {
    ChunkCoords { x, z }
  }

  /// Region containing this chunk (arithmetic shift, so -1 maps to region -1).
  pub fn to_region_coords(&self) -> RegionCoords {
    RegionCoords {
      x: self.x.shr(5),
      z: self.z.shr(5),
    }
  }

  /// Slot of this chunk in its region's header (0-1023).
  #[inline]
  pub fn region_slot(&self) -> usize {
    (self.x.bitand(31) + self.z.bitand(31) * REGION_WIDTH) as usize
  }

  /// World coordinates of the chunk's minimum corner at y = 0.
  pub fn origin(&self) -> WorldCoords {
    WorldCoords {
      x: self.x * SECTION_WIDTH,
      y: 0,
      z: self.z * SECTION_WIDTH,
    }
  }
}

impl RegionCoords {
  pub fn new(x: i32, z: i32) -> Self {
    RegionCoords { x, z }
  }

  /// Absolute coordinates of the chunk in `slot`.
  pub fn chunk_at_slot(&self, slot: usize) -> ChunkCoords {
    let slot = slot as i32;
    ChunkCoords {
      x: self.x * REGION_WIDTH + slot.bitand(31),
      z: self.z * REGION_WIDTH + slot / REGION_WIDTH,
    }
  }

  pub fn file_name(&self) -> String {
    format!("r.{}.{}.mca", self.x, self.z)
  }
}

impl ColumnRelCoords {
  /// True when x/z are 0-15 and y is 0-255.
  pub fn in_bounds(&self) -> bool {
    (0..SECTION_WIDTH).contains(&self.x)
      && (0..SECTION_WIDTH).contains(&self.z)
      && (0..WORLD_HEIGHT).contains(&self.y)
  }

  /// Index of the containing section (0-15). Only meaningful when in bounds.
  pub fn section_index(&self) -> usize {
    self.y.shr(4) as usize
  }

  pub fn to_section_rel_coords(&self) -> SectionRelCoords {
    SectionRelCoords {
      x: self.x,
      y: self.y.bitand(15),
      z: self.z,
    }
  }
}

/// Calculates the index within a section's flat block arrays (0-4095), YZX order.
/// Assumes input coordinates are already validated (0-15).
#[inline]
pub fn get_section_block_index(coords: SectionRelCoords) -> usize {
  (coords.y as usize * SECTION_WIDTH as usize * SECTION_WIDTH as usize)
    + (coords.z as usize * SECTION_WIDTH as usize)
    + coords.x as usize
}

/// Index into per-column arrays such as `Biomes` and `HeightMap` (0-255), ZX order.
#[inline]
pub fn get_column_index(x: i32, z: i32) -> usize {
  (z as usize * SECTION_WIDTH as usize) + x as usize
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn negative_world_coords_map_to_the_right_chunk() {
    let c = WorldCoords::new(-1, 70, -17);
    assert_eq!(c.to_chunk_coords(), ChunkCoords::new(-1, -2));
    let rel = c.to_column_rel_coords();
    assert_eq!((rel.x, rel.y, rel.z), (15, 70, 15));
  }

  #[test]
  fn region_slots_wrap_for_negative_chunks() {
    let chunk = ChunkCoords::new(-1, -32);
    assert_eq!(chunk.to_region_coords(), RegionCoords::new(-1, -1));
    assert_eq!(chunk.region_slot(), 31);
    assert_eq!(ChunkCoords::new(5, 2).region_slot(), 69);

    let region = chunk.to_region_coords();
    assert_eq!(region.chunk_at_slot(chunk.region_slot()), chunk);
  }

  #[test]
  fn section_indexing() {
    let rel = ColumnRelCoords { x: 3, y: 37, z: 9 };
    assert!(rel.in_bounds());
    assert_eq!(rel.section_index(), 2);
    let s = rel.to_section_rel_coords();
    assert_eq!(get_section_block_index(s), 5 * 256 + 9 * 16 + 3);
    assert!(!ColumnRelCoords { x: 0, y: 256, z: 0 }.in_bounds());
  }
}
