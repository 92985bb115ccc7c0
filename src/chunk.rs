//! Defines the `ChunkSection` and `Chunk` structs representing Anvil chunk data,
//! plus the `Chunk` class exposed to JavaScript.

use crate::block::{Block, JsBlock, MAX_NIBBLE};
use crate::coords::{
  get_column_index, get_section_block_index, ChunkCoords, ColumnRelCoords, COLUMN_COUNT,
  SECTION_COUNT, SECTION_VOLUME, SECTION_WIDTH, WORLD_HEIGHT,
};
use crate::error::{Result, WorldError};
use crate::nbt::json::compound_to_json;
use crate::nbt::schema::{self, CHUNK};
use crate::nbt::{Compound, List, NamedTag, Tag, TagId};
use crate::nibble::NibbleArray;
use log::{trace, warn};
use napi_derive::napi;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Biome value Minecraft uses for "not generated yet".
pub const UNSET_BIOME: u8 = 0xff;

/// Represents a 16x16x16 section of a chunk column.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSection {
  /// Low eight bits of every block id.
  blocks: Vec<u8>,
  /// High four bits of block ids; only present once an id above 255 is stored.
  add: Option<NibbleArray>,
  data: NibbleArray,
  block_light: NibbleArray,
  sky_light: NibbleArray,
}

impl ChunkSection {
  /// An all-air section. Sky light starts full, as for sections above the terrain.
  pub fn new() -> Self {
    ChunkSection {
      blocks: vec![0; SECTION_VOLUME],
      add: None,
      data: NibbleArray::new(),
      block_light: NibbleArray::new(),
      sky_light: NibbleArray::filled(MAX_NIBBLE),
    }
  }

  /// Decodes one entry of the `Sections` list, returning its Y index too.
  pub fn from_nbt(section: &Compound) -> Result<(usize, Self)> {
    let y = section
      .get_i8("Y")
      .ok_or_else(|| WorldError::InvalidChunk("section without Y".to_string()))?;
    if !(0..SECTION_COUNT as i8).contains(&y) {
      return Err(WorldError::InvalidChunk(format!("section Y {} out of range", y)));
    }

    let blocks = section
      .get_byte_array("Blocks")
      .ok_or_else(|| WorldError::InvalidChunk(format!("section {} without Blocks", y)))?;
    if blocks.len() != SECTION_VOLUME {
      return Err(WorldError::InvalidChunk(format!(
        "section {} Blocks holds {} bytes, expected {}",
        y,
        blocks.len(),
        SECTION_VOLUME
      )));
    }

    let nibbles = |name: &str, default: u8| -> Result<NibbleArray> {
      match section.get_byte_array(name) {
        Some(bytes) => NibbleArray::from_bytes(bytes, name),
        None => Ok(NibbleArray::filled(default)),
      }
    };

    let add = match section.get_byte_array("Add") {
      Some(bytes) => Some(NibbleArray::from_bytes(bytes, "Add")?),
      None => None,
    };

    Ok((
      y as usize,
      ChunkSection {
        blocks: blocks.to_vec(),
        add,
        data: nibbles("Data", 0)?,
        block_light: nibbles("BlockLight", 0)?,
        sky_light: nibbles("SkyLight", MAX_NIBBLE)?,
      },
    ))
  }

  pub fn to_nbt(&self, y: usize) -> Compound {
    let mut section = Compound::new();
    section.insert("Y", Tag::Byte(y as i8));
    section.insert("Blocks", Tag::ByteArray(self.blocks.clone()));
    if let Some(add) = &self.add {
      section.insert("Add", Tag::ByteArray(add.as_bytes().to_vec()));
    }
    section.insert("Data", Tag::ByteArray(self.data.as_bytes().to_vec()));
    section.insert("BlockLight", Tag::ByteArray(self.block_light.as_bytes().to_vec()));
    section.insert("SkyLight", Tag::ByteArray(self.sky_light.as_bytes().to_vec()));
    section
  }

  #[inline]
  pub fn block_id(&self, index: usize) -> u16 {
    let high = self.add.as_ref().map_or(0, |add| add.get(index)) as u16;
    (high << 8) | self.blocks[index] as u16
  }

  #[inline]
  pub fn get_block(&self, index: usize) -> Block {
    Block {
      id: self.block_id(index),
      data: self.data.get(index),
      block_light: self.block_light.get(index),
      sky_light: self.sky_light.get(index),
    }
  }

  pub fn set_block(&mut self, index: usize, block: Block) {
    self.blocks[index] = (block.id & 0xff) as u8;
    let high = (block.id >> 8) as u8;
    match self.add.as_mut() {
      Some(add) => add.set(index, high),
      None if high != 0 => {
        let mut add = NibbleArray::new();
        add.set(index, high);
        self.add = Some(add);
      }
      None => {}
    }
    self.data.set(index, block.data);
    self.block_light.set(index, block.block_light);
    self.sky_light.set(index, block.sky_light);
  }

  /// True when every block is air.
  pub fn is_empty(&self) -> bool {
    self.blocks.iter().all(|&b| b == 0) && self.add.as_ref().map_or(true, NibbleArray::is_zero)
  }
}

impl Default for ChunkSection {
  fn default() -> Self {
    ChunkSection::new()
  }
}

/// Level tags decoded into fields; everything else is carried through untouched.
const DECODED_LEVEL_TAGS: &[&str] = &[
  "xPos",
  "zPos",
  "LastUpdate",
  "TerrainPopulated",
  "Biomes",
  "HeightMap",
  "Sections",
];

/// Represents a 16x256x16 chunk column.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
  x: i32,
  z: i32,
  pub last_update: i64,
  pub terrain_populated: bool,
  biomes: Vec<u8>,
  height_map: Vec<i32>,
  /// Indexed from 0 (lowest section) to SECTION_COUNT - 1.
  sections: Vec<Option<ChunkSection>>,
  /// Remaining `Level` tags: Entities, TileEntities, TileTicks and the like.
  level_extra: Compound,
  /// Root tags next to `Level`, e.g. DataVersion.
  root_extra: Compound,
  root_name: String,
  modified: bool,
}

impl Chunk {
  /// Creates a new, empty chunk column.
  pub fn new(x: i32, z: i32) -> Self {
    let mut level_extra = Compound::new();
    for name in ["Entities", "TileEntities"] {
      let element = match schema::lookup(CHUNK, name) {
        Some(entry) if entry.empty_byte_list => TagId::ByteArray,
        Some(entry) => entry.element,
        None => TagId::Compound,
      };
      level_extra.insert(name, Tag::List(List::new(element)));
    }

    Chunk {
      x,
      z,
      last_update: 0,
      terrain_populated: false,
      biomes: vec![UNSET_BIOME; COLUMN_COUNT],
      height_map: vec![0; COLUMN_COUNT],
      sections: vec![None; SECTION_COUNT],
      level_extra,
      root_extra: Compound::new(),
      root_name: String::new(),
      modified: true,
    }
  }

  pub fn from_nbt(root: NamedTag) -> Result<Self> {
    let NamedTag { name, mut compound } = root;
    let level = match compound.remove("Level") {
      Some(Tag::Compound(level)) => level,
      Some(other) => {
        return Err(WorldError::InvalidChunk(format!(
          "Level is a {}, expected a compound",
          other.kind()
        )))
      }
      None => return Err(WorldError::InvalidChunk("missing Level compound".to_string())),
    };

    let x = level
      .get_i32("xPos")
      .ok_or_else(|| WorldError::InvalidChunk("missing xPos".to_string()))?;
    let z = level
      .get_i32("zPos")
      .ok_or_else(|| WorldError::InvalidChunk("missing zPos".to_string()))?;

    let biomes = match level.get_byte_array("Biomes") {
      Some(b) if b.len() == COLUMN_COUNT => b.to_vec(),
      Some(b) => {
        return Err(WorldError::InvalidChunk(format!(
          "Biomes holds {} bytes, expected {}",
          b.len(),
          COLUMN_COUNT
        )))
      }
      None => vec![UNSET_BIOME; COLUMN_COUNT],
    };

    let height_map = match level.get_int_array("HeightMap") {
      Some(h) if h.len() == COLUMN_COUNT => Some(h.to_vec()),
      Some(h) => {
        return Err(WorldError::InvalidChunk(format!(
          "HeightMap holds {} ints, expected {}",
          h.len(),
          COLUMN_COUNT
        )))
      }
      None => None,
    };

    let mut sections = vec![None; SECTION_COUNT];
    if let Some(list) = level.get_list("Sections") {
      for item in list.iter() {
        let section = item
          .as_compound()
          .ok_or_else(|| WorldError::InvalidChunk("Sections holds a non-compound".to_string()))?;
        let (y, section) = ChunkSection::from_nbt(section)?;
        if sections[y].is_some() {
          warn!("[chunk {}, {}] duplicate section Y {}, keeping the last", x, z, y);
        }
        sections[y] = Some(section);
      }
    }

    let mut level_extra = Compound::new();
    for (tag_name, tag) in level.iter() {
      if !DECODED_LEVEL_TAGS.contains(&tag_name) {
        level_extra.insert(tag_name, tag.clone());
      }
    }

    let mut chunk = Chunk {
      x,
      z,
      last_update: level.get_i64("LastUpdate").unwrap_or(0),
      terrain_populated: level.get_i8("TerrainPopulated").unwrap_or(0) != 0,
      biomes,
      height_map: height_map.clone().unwrap_or_else(|| vec![0; COLUMN_COUNT]),
      sections,
      level_extra,
      root_extra: compound,
      root_name: name,
      modified: false,
    };
    if height_map.is_none() {
      chunk.recalculate_height_map();
    }
    trace!(
      "[chunk {}, {}] decoded {} sections",
      x,
      z,
      chunk.sections.iter().flatten().count()
    );
    Ok(chunk)
  }

  pub fn to_nbt(&self) -> NamedTag {
    let mut level = Compound::new();
    level.insert("xPos", Tag::Int(self.x));
    level.insert("zPos", Tag::Int(self.z));
    level.insert("LastUpdate", Tag::Long(self.last_update));
    level.insert("TerrainPopulated", Tag::Byte(self.terrain_populated as i8));
    level.insert("Biomes", Tag::ByteArray(self.biomes.clone()));
    level.insert("HeightMap", Tag::IntArray(self.height_map.clone()));

    let mut sections = List::new(TagId::Compound);
    sections.items = self
      .sections
      .iter()
      .enumerate()
      .filter_map(|(y, s)| s.as_ref().map(|s| Tag::Compound(s.to_nbt(y))))
      .collect();
    level.insert("Sections", Tag::List(sections));

    for (name, tag) in self.level_extra.iter() {
      level.insert(name, tag.clone());
    }

    let mut root = Compound::new();
    root.insert("Level", Tag::Compound(level));
    for (name, tag) in self.root_extra.iter() {
      root.insert(name, tag.clone());
    }
    NamedTag::new(self.root_name.clone(), root)
  }

  pub fn to_json(&self) -> serde_json::Value {
    compound_to_json(&self.to_nbt().compound)
  }

  pub fn x(&self) -> i32 {
    self.x
  }

  pub fn z(&self) -> i32 {
    self.z
  }

  pub fn coords(&self) -> ChunkCoords {
    ChunkCoords::new(self.x, self.z)
  }

  pub fn is_modified(&self) -> bool {
    self.modified
  }

  pub fn mark_saved(&mut self) {
    self.modified = false;
  }

  pub fn mark_modified(&mut self) {
    self.modified = true;
  }

  /// Gets an immutable reference to the chunk section at the given section Y index.
  pub fn section(&self, y: usize) -> Option<&ChunkSection> {
    self.sections.get(y).and_then(|s| s.as_ref())
  }

  /// Inserts or replaces a chunk section at the given section Y index.
  pub fn insert_section(&mut self, y: usize, section: ChunkSection) -> Result<()> {
    let slot = self
      .sections
      .get_mut(y)
      .ok_or_else(|| WorldError::InvalidChunk(format!("section Y {} out of range", y)))?;
    *slot = Some(section);
    self.recalculate_height_map();
    self.modified = true;
    Ok(())
  }

  /// Loaded sections with their Y index, lowest first.
  pub fn sections(&self) -> impl Iterator<Item = (usize, &ChunkSection)> {
    self
      .sections
      .iter()
      .enumerate()
      .filter_map(|(y, s)| s.as_ref().map(|s| (y, s)))
  }

  /// A tag of `Level` that is not decoded into a field (Entities, TileEntities...).
  pub fn level_tag(&self, name: &str) -> Option<&Tag> {
    self.level_extra.get(name)
  }

  pub fn set_level_tag(&mut self, name: &str, tag: Tag) -> Result<()> {
    if DECODED_LEVEL_TAGS.contains(&name) {
      return Err(WorldError::InvalidChunk(format!(
        "{} is managed by the chunk itself",
        name
      )));
    }
    self.level_extra.insert(name, tag);
    self.modified = true;
    Ok(())
  }

  fn locate(x: i32, y: i32, z: i32) -> Result<ColumnRelCoords> {
    let rel = ColumnRelCoords { x, y, z };
    if rel.in_bounds() {
      Ok(rel)
    } else {
      Err(WorldError::OutOfBounds { x, y, z })
    }
  }

  fn column_index(x: i32, z: i32) -> Result<usize> {
    if (0..SECTION_WIDTH).contains(&x) && (0..SECTION_WIDTH).contains(&z) {
      Ok(get_column_index(x, z))
    } else {
      Err(WorldError::OutOfBounds { x, y: 0, z })
    }
  }

  /// Block at chunk-relative coordinates. Missing sections read as open-sky air.
  pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Block> {
    let rel = Self::locate(x, y, z)?;
    Ok(
      self
        .section(rel.section_index())
        .map(|s| s.get_block(get_section_block_index(rel.to_section_rel_coords())))
        .unwrap_or(Block::AIR),
    )
  }

  /// Sets the block at chunk-relative coordinates. Creates a new section if necessary.
  pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> Result<()> {
    let rel = Self::locate(x, y, z)?;
    let section_y = rel.section_index();
    let index = get_section_block_index(rel.to_section_rel_coords());

    if self.sections[section_y].is_none() {
      if block == Block::AIR {
        // Nothing to store: an absent section already reads as this.
        return Ok(());
      }
      self.sections[section_y] = Some(ChunkSection::new());
    }
    if let Some(section) = self.sections[section_y].as_mut() {
      section.set_block(index, block);
    }

    self.update_height(x, y, z, block.is_air());
    self.modified = true;
    Ok(())
  }

  /// Raw biome id of a column (255 when unset).
  pub fn biome(&self, x: i32, z: i32) -> Result<u8> {
    Ok(self.biomes[Self::column_index(x, z)?])
  }

  pub fn set_biome(&mut self, x: i32, z: i32, biome: u8) -> Result<()> {
    let index = Self::column_index(x, z)?;
    self.biomes[index] = biome;
    self.modified = true;
    Ok(())
  }

  /// Height map value: one above the highest non-air block of the column, 0 if empty.
  pub fn height(&self, x: i32, z: i32) -> Result<i32> {
    Ok(self.height_map[Self::column_index(x, z)?])
  }

  fn column_top(&self, x: i32, z: i32, from_y: i32) -> i32 {
    for y in (0..from_y).rev() {
      let rel = ColumnRelCoords { x, y, z };
      if let Some(section) = self.section(rel.section_index()) {
        if section.block_id(get_section_block_index(rel.to_section_rel_coords())) != 0 {
          return y + 1;
        }
      }
    }
    0
  }

  fn update_height(&mut self, x: i32, y: i32, z: i32, is_air: bool) {
    let index = get_column_index(x, z);
    let current = self.height_map[index];
    if !is_air && y + 1 > current {
      self.height_map[index] = y + 1;
    } else if is_air && y + 1 == current {
      self.height_map[index] = self.column_top(x, z, y);
    }
  }

  /// Rebuilds the height map from the block data.
  pub fn recalculate_height_map(&mut self) {
    for z in 0..SECTION_WIDTH {
      for x in 0..SECTION_WIDTH {
        self.height_map[get_column_index(x, z)] = self.column_top(x, z, WORLD_HEIGHT);
      }
    }
  }

  /// Number of sections that hold at least one non-air block.
  pub fn populated_sections(&self) -> usize {
    self.sections().filter(|(_, s)| !s.is_empty()).count()
  }
}

#[napi(js_name = "Chunk")]
pub struct NapiChunk {
  inner: Arc<RwLock<Chunk>>,
}

impl NapiChunk {
  pub fn from_shared(inner: Arc<RwLock<Chunk>>) -> Self {
    NapiChunk { inner }
  }

  pub fn shared(&self) -> Arc<RwLock<Chunk>> {
    self.inner.clone()
  }

  fn read(&self) -> Result<RwLockReadGuard<'_, Chunk>> {
    self.inner.read().map_err(|_| WorldError::LockPoisoned)
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, Chunk>> {
    self.inner.write().map_err(|_| WorldError::LockPoisoned)
  }
}

#[napi]
impl NapiChunk {
  #[napi(constructor)]
  pub fn new(chunk_x: i32, chunk_z: i32) -> Self {
    NapiChunk {
      inner: Arc::new(RwLock::new(Chunk::new(chunk_x, chunk_z))),
    }
  }

  /// Chunk X
  #[napi(getter)]
  pub fn x(&self) -> napi::Result<i32> {
    Ok(self.read()?.x())
  }

  /// Chunk Z
  #[napi(getter)]
  pub fn z(&self) -> napi::Result<i32> {
    Ok(self.read()?.z())
  }

  #[napi]
  pub fn get_block(&self, x: i32, y: i32, z: i32) -> napi::Result<JsBlock> {
    Ok(self.read()?.get_block(x, y, z)?.into())
  }

  #[napi]
  pub fn set_block(&self, x: i32, y: i32, z: i32, block: JsBlock) -> napi::Result<()> {
    let block = Block::try_from(block)?;
    self.write()?.set_block(x, y, z, block)?;
    Ok(())
  }

  #[napi]
  pub fn get_biome(&self, x: i32, z: i32) -> napi::Result<u32> {
    Ok(self.read()?.biome(x, z)? as u32)
  }

  #[napi]
  pub fn set_biome(&self, x: i32, z: i32, biome: u32) -> napi::Result<()> {
    let biome = u8::try_from(biome)
      .map_err(|_| napi::Error::new(napi::Status::InvalidArg, format!("biome {} is not a byte", biome)))?;
    self.write()?.set_biome(x, z, biome)?;
    Ok(())
  }

  #[napi]
  pub fn height(&self, x: i32, z: i32) -> napi::Result<i32> {
    Ok(self.read()?.height(x, z)?)
  }

  /// The chunk's NBT as a plain object.
  #[napi(js_name = "toJSON")]
  pub fn to_json(&self) -> napi::Result<serde_json::Value> {
    Ok(self.read()?.to_json())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::nbt::{read_root, write_root};

  #[test]
  fn missing_sections_read_as_air() {
    let chunk = Chunk::new(0, 0);
    assert_eq!(chunk.get_block(4, 100, 4).unwrap(), Block::AIR);
    assert!(matches!(
      chunk.get_block(16, 0, 0),
      Err(WorldError::OutOfBounds { .. })
    ));
    assert!(chunk.get_block(0, 256, 0).is_err());
  }

  #[test]
  fn set_block_creates_section_and_tracks_height() {
    let mut chunk = Chunk::new(1, 2);
    chunk.mark_saved();
    chunk.set_block(3, 40, 5, Block::new(1, 0, 0, 0).unwrap()).unwrap();
    assert!(chunk.is_modified());
    assert!(chunk.section(2).is_some());
    assert_eq!(chunk.height(3, 5).unwrap(), 41);

    chunk.set_block(3, 10, 5, Block::of(3, 0)).unwrap();
    assert_eq!(chunk.height(3, 5).unwrap(), 41);

    chunk.set_block(3, 40, 5, Block::AIR).unwrap();
    assert_eq!(chunk.height(3, 5).unwrap(), 11);
  }

  #[test]
  fn ids_above_255_use_the_add_nibble() {
    let mut chunk = Chunk::new(0, 0);
    let block = Block::new(0x2a5, 9, 3, 12).unwrap();
    chunk.set_block(15, 255, 15, block).unwrap();
    assert_eq!(chunk.get_block(15, 255, 15).unwrap(), block);

    let section = chunk.section(15).unwrap();
    let index = get_section_block_index(crate::coords::SectionRelCoords { x: 15, y: 15, z: 15 });
    assert_eq!(section.blocks[index], 0xa5);
    assert_eq!(section.add.as_ref().unwrap().get(index), 0x2);
  }

  #[test]
  fn air_in_missing_section_is_a_no_op() {
    let mut chunk = Chunk::new(0, 0);
    chunk.set_block(0, 0, 0, Block::AIR).unwrap();
    assert_eq!(chunk.sections().count(), 0);
  }

  #[test]
  fn nbt_round_trip_preserves_unknown_tags() {
    let mut chunk = Chunk::new(-4, 7);
    chunk.set_block(1, 65, 1, Block::new(2, 0, 0, 15).unwrap()).unwrap();
    chunk.set_biome(1, 1, 4).unwrap();
    chunk.set_level_tag("InhabitedTime", Tag::Long(1234)).unwrap();
    chunk.last_update = 99;
    chunk.terrain_populated = true;

    let mut nbt = chunk.to_nbt();
    nbt.compound.insert("DataVersion", Tag::Int(1343));
    let bytes = write_root(&nbt).unwrap();
    let back = Chunk::from_nbt(read_root(&bytes).unwrap()).unwrap();

    assert_eq!(back.coords(), ChunkCoords::new(-4, 7));
    assert!(!back.is_modified());
    assert_eq!(back.get_block(1, 65, 1).unwrap().id, 2);
    assert_eq!(back.biome(1, 1).unwrap(), 4);
    assert_eq!(back.biome(0, 0).unwrap(), UNSET_BIOME);
    assert_eq!(back.height(1, 1).unwrap(), 66);
    assert_eq!(back.level_tag("InhabitedTime"), Some(&Tag::Long(1234)));
    assert_eq!(back.last_update, 99);
    assert!(back.terrain_populated);
    assert_eq!(back.to_nbt().compound.get_i32("DataVersion"), Some(1343));
    assert_eq!(
      back.level_tag("Entities").and_then(Tag::as_list).map(|l| l.element),
      Some(TagId::ByteArray)
    );
  }

  #[test]
  fn managed_tags_cannot_be_overridden() {
    let mut chunk = Chunk::new(0, 0);
    assert!(chunk.set_level_tag("Sections", Tag::Int(0)).is_err());
  }

  #[test]
  fn decoding_validates_structure() {
    let missing_level = NamedTag::new("", Compound::new());
    assert!(matches!(
      Chunk::from_nbt(missing_level),
      Err(WorldError::InvalidChunk(_))
    ));

    let mut nbt = Chunk::new(0, 0).to_nbt();
    nbt
      .compound
      .get_compound_mut("Level")
      .unwrap()
      .insert("Biomes", Tag::ByteArray(vec![0; 10]));
    assert!(Chunk::from_nbt(nbt).is_err());
  }

  #[test]
  fn missing_height_map_is_recomputed() {
    let mut chunk = Chunk::new(0, 0);
    chunk.set_block(7, 20, 8, Block::of(1, 0)).unwrap();
    let mut nbt = chunk.to_nbt();
    nbt.compound.get_compound_mut("Level").unwrap().remove("HeightMap");
    let back = Chunk::from_nbt(nbt).unwrap();
    assert_eq!(back.height(7, 8).unwrap(), 21);
  }
}
