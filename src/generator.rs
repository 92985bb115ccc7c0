//! Seeded simplex noise and a simple terrain generator built on it.

use std::sync::{Arc, RwLock};

use glam::DVec3;
use log::debug;
use napi_derive::napi;

use crate::block::{ids, Block, MAX_NIBBLE};
use crate::chunk::{Chunk, NapiChunk};
use crate::coords::{ChunkCoords, SECTION_WIDTH, WORLD_HEIGHT};
use crate::error::Result;
use crate::nbt::Tag;

const PERMUTATIONS: usize = 256;

/// Skew and unskew factors for three dimensions.
const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// Midpoints of the edges of a cube.
const GRADIENTS: [DVec3; 12] = [
  DVec3::new(1.0, 1.0, 0.0),
  DVec3::new(-1.0, 1.0, 0.0),
  DVec3::new(1.0, -1.0, 0.0),
  DVec3::new(-1.0, -1.0, 0.0),
  DVec3::new(1.0, 0.0, 1.0),
  DVec3::new(-1.0, 0.0, 1.0),
  DVec3::new(1.0, 0.0, -1.0),
  DVec3::new(-1.0, 0.0, -1.0),
  DVec3::new(0.0, 1.0, 1.0),
  DVec3::new(0.0, -1.0, 1.0),
  DVec3::new(0.0, 1.0, -1.0),
  DVec3::new(0.0, -1.0, -1.0),
];

pub const SEA_LEVEL: i32 = 62;
const BASE_HEIGHT: f64 = 64.0;
/// Keeps room for bedrock plus the dirt layer under the surface.
const MIN_SURFACE: i32 = 5;
const DIRT_DEPTH: i32 = 3;
/// Sky light lost per block of water.
const WATER_OPACITY: i32 = 3;

const BIOME_OCEAN: u8 = 0;
const BIOME_PLAINS: u8 = 1;

#[derive(Debug, Clone)]
pub struct Generator {
  seed: i32,
  /// 256 entries, repeated once so wrapped indices need no masking.
  perm: Vec<u8>,
}

impl Generator {
  pub fn new(seed: i32) -> Self {
    let mut perm = vec![0u8; PERMUTATIONS * 2];
    let mut state = seed;
    for i in (0..PERMUTATIONS).rev() {
      let mut position = state.rem_euclid(PERMUTATIONS as i32) as usize;
      // Filled slots hold values above `i`, free ones still hold 0.
      while perm[position] as usize > i {
        position = (position + 1) % PERMUTATIONS;
      }
      state = state.wrapping_add(i as i32 * 17);
      perm[position] = i as u8;
      perm[position + PERMUTATIONS] = i as u8;
    }
    Generator { seed, perm }
  }

  pub fn seed(&self) -> i32 {
    self.seed
  }

  pub fn permutation(&self) -> &[u8] {
    &self.perm[..PERMUTATIONS]
  }

  #[inline]
  fn perm(&self, index: usize) -> usize {
    self.perm[index] as usize
  }

  fn corner(&self, offset: DVec3, gradient: usize) -> f64 {
    let t = 0.6 - offset.length_squared();
    if t < 0.0 {
      0.0
    } else {
      let t2 = t * t;
      t2 * t2 * GRADIENTS[gradient].dot(offset)
    }
  }

  /// 3D simplex noise in [-1, 1].
  pub fn noise(&self, x: f64, y: f64, z: f64) -> f64 {
    let p = DVec3::new(x, y, z);

    // Skew into the simplex grid to find the containing cell.
    let s = (x + y + z) * F3;
    let cell = (p + s).floor();
    let t = cell.element_sum() * G3;
    let d0 = p - (cell - t);

    // Which of the six tetrahedra of the cell holds the point.
    let (o1, o2) = if d0.x >= d0.y {
      if d0.y >= d0.z {
        (DVec3::X, DVec3::new(1.0, 1.0, 0.0))
      } else if d0.x >= d0.z {
        (DVec3::X, DVec3::new(1.0, 0.0, 1.0))
      } else {
        (DVec3::Z, DVec3::new(1.0, 0.0, 1.0))
      }
    } else if d0.y < d0.z {
      (DVec3::Z, DVec3::new(0.0, 1.0, 1.0))
    } else if d0.x < d0.z {
      (DVec3::Y, DVec3::new(0.0, 1.0, 1.0))
    } else {
      (DVec3::Y, DVec3::new(1.0, 1.0, 0.0))
    };

    let d1 = d0 - o1 + G3;
    let d2 = d0 - o2 + 2.0 * G3;
    let d3 = d0 - 1.0 + 3.0 * G3;

    let ii = (cell.x as i64 & 0xff) as usize;
    let jj = (cell.y as i64 & 0xff) as usize;
    let kk = (cell.z as i64 & 0xff) as usize;
    let gradient = |o: DVec3| {
      let (a, b, c) = (o.x as usize, o.y as usize, o.z as usize);
      self.perm(ii + a + self.perm(jj + b + self.perm(kk + c))) % GRADIENTS.len()
    };

    let n = self.corner(d0, gradient(DVec3::ZERO))
      + self.corner(d1, gradient(o1))
      + self.corner(d2, gradient(o2))
      + self.corner(d3, gradient(DVec3::ONE));
    32.0 * n
  }

  /// Y of the topmost solid block of the column at world x/z.
  pub fn height(&self, x: i32, z: i32) -> i32 {
    let (x, z) = (x as f64, z as f64);
    let continent = self.noise(x / 256.0, 0.0, z / 256.0);
    let hills = self.noise(x / 48.0, 11.5, z / 48.0);
    let detail = self.noise(x / 12.0, 23.25, z / 12.0);
    let height = BASE_HEIGHT + continent * 20.0 + hills * 8.0 + detail * 2.0;
    (height.floor() as i32).clamp(MIN_SURFACE, WORLD_HEIGHT - 2)
  }

  /// Builds a terrain column: bedrock, stone, a dirt layer, then grass, or
  /// sand under water where the surface is below sea level.
  pub fn generate_chunk(&self, cx: i32, cz: i32) -> Result<Chunk> {
    let origin = ChunkCoords::new(cx, cz).origin();
    let mut chunk = Chunk::new(cx, cz);
    let bedrock = Block::of(ids::BEDROCK, 0);
    let stone = Block::of(ids::STONE, 0);
    let dirt = Block::of(ids::DIRT, 0);

    for z in 0..SECTION_WIDTH {
      for x in 0..SECTION_WIDTH {
        let surface = self.height(origin.x + x, origin.z + z);
        let underwater = surface < SEA_LEVEL;

        chunk.set_block(x, 0, z, bedrock)?;
        for y in 1..surface - DIRT_DEPTH {
          chunk.set_block(x, y, z, stone)?;
        }
        for y in (surface - DIRT_DEPTH).max(1)..surface {
          chunk.set_block(x, y, z, dirt)?;
        }

        let top = if underwater { ids::SAND } else { ids::GRASS };
        chunk.set_block(x, surface, z, Block::of(top, 0))?;

        for y in surface + 1..=SEA_LEVEL {
          let depth = SEA_LEVEL - y + 1;
          let sky = (MAX_NIBBLE as i32 - depth * WATER_OPACITY).max(0) as u8;
          chunk.set_block(x, y, z, Block::new(ids::WATER, 0, 0, sky)?)?;
        }

        chunk.set_biome(x, z, if underwater { BIOME_OCEAN } else { BIOME_PLAINS })?;
      }
    }

    // Let the game redo lighting with its own rules.
    chunk.set_level_tag("LightPopulated", Tag::Byte(0))?;
    debug!(
      "[generator {}] chunk ({}, {}) with {} sections",
      self.seed,
      cx,
      cz,
      chunk.populated_sections()
    );
    Ok(chunk)
  }
}

#[napi(js_name = "Generator")]
pub struct NapiGenerator {
  inner: Generator,
}

#[napi]
impl NapiGenerator {
  #[napi(constructor)]
  pub fn new(seed: i32) -> Self {
    NapiGenerator {
      inner: Generator::new(seed),
    }
  }

  #[napi(getter)]
  pub fn seed(&self) -> i32 {
    self.inner.seed()
  }

  /// Get the noise strength at a particular point in three dimensional space.
  #[napi]
  pub fn noise(&self, x: f64, y: f64, z: f64) -> f64 {
    self.inner.noise(x, y, z)
  }

  #[napi]
  pub fn height(&self, x: i32, z: i32) -> i32 {
    self.inner.height(x, z)
  }

  #[napi]
  pub fn generate_chunk(&self, chunk_x: i32, chunk_z: i32) -> napi::Result<NapiChunk> {
    let chunk = self.inner.generate_chunk(chunk_x, chunk_z)?;
    Ok(NapiChunk::from_shared(Arc::new(RwLock::new(chunk))))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_is_a_permutation() {
    for seed in [0, 123, -7, i32::MAX] {
      let generator = Generator::new(seed);
      let mut seen = [false; PERMUTATIONS];
      for &v in generator.permutation() {
        assert!(!seen[v as usize]);
        seen[v as usize] = true;
      }
      assert_eq!(&generator.perm[..PERMUTATIONS], &generator.perm[PERMUTATIONS..]);
    }
  }

  #[test]
  fn first_entry_lands_on_seed_slot() {
    let generator = Generator::new(123);
    assert_eq!(generator.permutation()[123], 255);
  }

  #[test]
  fn deterministic_per_seed() {
    let a = Generator::new(42);
    let b = Generator::new(42);
    let c = Generator::new(43);
    let points = [(0.5, 1.25, -3.75), (10.1, -2.2, 7.7), (-100.3, 64.0, 0.9)];
    for (x, y, z) in points {
      assert_eq!(a.noise(x, y, z), b.noise(x, y, z));
    }
    assert!(points
      .iter()
      .any(|&(x, y, z)| a.noise(x, y, z) != c.noise(x, y, z)));
  }

  #[test]
  fn noise_is_bounded_and_zero_at_origin() {
    let generator = Generator::new(2024);
    assert_eq!(generator.noise(0.0, 0.0, 0.0), 0.0);
    let mut max: f64 = 0.0;
    for i in 0..4000 {
      let f = i as f64;
      let n = generator.noise(f * 0.137, f * -0.071, f * 0.293);
      assert!(n.abs() <= 1.0, "noise {} out of range", n);
      max = max.max(n.abs());
    }
    assert!(max > 0.1);
  }

  #[test]
  fn generated_chunk_layers() {
    let generator = Generator::new(9);
    let chunk = generator.generate_chunk(3, -2).unwrap();
    for (x, z) in [(0, 0), (7, 11), (15, 15)] {
      let surface = generator.height(48 + x, -32 + z);
      assert_eq!(chunk.get_block(x, 0, z).unwrap().id, ids::BEDROCK);
      assert_eq!(chunk.get_block(x, surface - 1, z).unwrap().id, ids::DIRT);
      let top = chunk.get_block(x, surface, z).unwrap();
      if surface >= SEA_LEVEL {
        assert_eq!(top.id, ids::GRASS);
        assert_eq!(chunk.height(x, z).unwrap(), surface + 1);
        assert_eq!(chunk.get_block(x, surface + 1, z).unwrap(), Block::AIR);
        assert_eq!(chunk.biome(x, z).unwrap(), BIOME_PLAINS);
      } else {
        assert_eq!(top.id, ids::SAND);
        assert_eq!(chunk.get_block(x, SEA_LEVEL, z).unwrap().id, ids::WATER);
        assert_eq!(chunk.height(x, z).unwrap(), SEA_LEVEL + 1);
      }
      assert_eq!(chunk.get_block(x, 200, z).unwrap().sky_light, 15);
    }
  }
}
