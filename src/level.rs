//! `level.dat`: the gzip-compressed NBT file describing a world.
//! Everything of interest lives in the root's `Data` compound.

use std::fs;
use std::path::Path;

use log::debug;

use crate::compression::{Compression, DEFAULT_LEVEL};
use crate::error::{Result, WorldError};
use crate::nbt::json::{compound_from_json, compound_to_json};
use crate::nbt::schema::LEVEL_DAT;
use crate::nbt::{read_compressed, write_compressed, Compound, NamedTag, Tag};

/// Anvil's `version` value.
pub const ANVIL_VERSION: i32 = 19133;

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
  data: Compound,
  /// Root tags other than `Data`, written back unchanged.
  extra: Compound,
  root_name: String,
}

impl Level {
  /// A fresh level with the fields Minecraft writes for a new default world.
  pub fn new(name: &str, seed: i64) -> Self {
    let mut data = Compound::new();
    data.insert("version", Tag::Int(ANVIL_VERSION));
    data.insert("initialized", Tag::Byte(1));
    data.insert("LevelName", Tag::String(name.to_string()));
    data.insert("generatorName", Tag::String("default".to_string()));
    data.insert("generatorVersion", Tag::Int(1));
    data.insert("generatorOptions", Tag::String(String::new()));
    data.insert("RandomSeed", Tag::Long(seed));
    data.insert("MapFeatures", Tag::Byte(1));
    data.insert("LastPlayed", Tag::Long(0));
    data.insert("SizeOnDisk", Tag::Long(0));
    data.insert("allowCommands", Tag::Byte(0));
    data.insert("hardcore", Tag::Byte(0));
    data.insert("GameType", Tag::Int(0));
    data.insert("Time", Tag::Long(0));
    data.insert("DayTime", Tag::Long(0));
    data.insert("SpawnX", Tag::Int(0));
    data.insert("SpawnY", Tag::Int(64));
    data.insert("SpawnZ", Tag::Int(0));
    data.insert("raining", Tag::Byte(0));
    data.insert("rainTime", Tag::Int(0));
    data.insert("thundering", Tag::Byte(0));
    data.insert("thunderTime", Tag::Int(0));

    let mut rules = Compound::new();
    for rule in [
      "commandBlockOutput",
      "doFireTick",
      "doMobLoot",
      "doMobSpawning",
      "doTileDrops",
      "keepInventory",
      "mobGriefing",
    ] {
      let enabled = rule != "keepInventory";
      rules.insert(rule, Tag::String(enabled.to_string()));
    }
    data.insert("GameRules", Tag::Compound(rules));

    Level {
      data,
      extra: Compound::new(),
      root_name: String::new(),
    }
  }

  pub fn from_nbt(root: NamedTag) -> Result<Self> {
    let NamedTag { name, mut compound } = root;
    match compound.remove("Data") {
      Some(Tag::Compound(data)) => Ok(Level {
        data,
        extra: compound,
        root_name: name,
      }),
      Some(other) => Err(WorldError::InvalidNbt(format!(
        "level.dat Data is a {}, expected a compound",
        other.kind()
      ))),
      None => Err(WorldError::InvalidNbt("level.dat has no Data compound".to_string())),
    }
  }

  pub fn to_nbt(&self) -> NamedTag {
    let mut root = Compound::new();
    root.insert("Data", Tag::Compound(self.data.clone()));
    for (name, tag) in self.extra.iter() {
      root.insert(name, tag.clone());
    }
    NamedTag::new(self.root_name.clone(), root)
  }

  pub fn from_bytes(bytes: &[u8], inflate_limit: usize) -> Result<Self> {
    Self::from_nbt(read_compressed(bytes, Compression::Gzip, inflate_limit)?)
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    write_compressed(&self.to_nbt(), Compression::Gzip, DEFAULT_LEVEL)
  }

  /// Reads `path`, refusing to inflate more than `inflate_limit` bytes.
  pub fn load(path: impl AsRef<Path>, inflate_limit: usize) -> Result<Self> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|_| WorldError::MissingLevel(path.display().to_string()))?;
    debug!("[level] read {} bytes from {}", bytes.len(), path.display());
    Self::from_bytes(&bytes, inflate_limit)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = self.to_bytes()?;
    fs::write(path, &bytes).map_err(|source| WorldError::File {
      context: format!("Unable to open {} for writing", path.display()),
      source,
    })?;
    debug!("[level] wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
  }

  pub fn data(&self) -> &Compound {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut Compound {
    &mut self.data
  }

  /// `Data` as a JSON object.
  pub fn to_json(&self) -> serde_json::Value {
    compound_to_json(self.data())
  }

  /// Replaces `Data` from a JSON object. Existing tags keep their types.
  pub fn set_json(&mut self, value: &serde_json::Value) -> Result<()> {
    self.data = compound_from_json(value, LEVEL_DAT, Some(&self.data))?;
    Ok(())
  }

  pub fn name(&self) -> Option<&str> {
    self.data().get_str("LevelName")
  }

  pub fn set_name(&mut self, name: &str) {
    self.data_mut().insert("LevelName", Tag::String(name.to_string()));
  }

  pub fn seed(&self) -> i64 {
    self.data().get_i64("RandomSeed").unwrap_or(0)
  }

  pub fn spawn(&self) -> (i32, i32, i32) {
    let data = self.data();
    (
      data.get_i32("SpawnX").unwrap_or(0),
      data.get_i32("SpawnY").unwrap_or(0),
      data.get_i32("SpawnZ").unwrap_or(0),
    )
  }

  pub fn set_spawn(&mut self, x: i32, y: i32, z: i32) {
    let data = self.data_mut();
    data.insert("SpawnX", Tag::Int(x));
    data.insert("SpawnY", Tag::Int(y));
    data.insert("SpawnZ", Tag::Int(z));
  }

  pub fn time(&self) -> i64 {
    self.data().get_i64("Time").unwrap_or(0)
  }

  pub fn day_time(&self) -> i64 {
    self.data().get_i64("DayTime").unwrap_or(0)
  }

  pub fn game_type(&self) -> i32 {
    self.data().get_i32("GameType").unwrap_or(0)
  }

  pub fn hardcore(&self) -> bool {
    self.data().get_i8("hardcore").unwrap_or(0) != 0
  }

  pub fn raining(&self) -> bool {
    self.data().get_i8("raining").unwrap_or(0) != 0
  }

  pub fn thundering(&self) -> bool {
    self.data().get_i8("thundering").unwrap_or(0) != 0
  }

  pub fn last_played(&self) -> i64 {
    self.data().get_i64("LastPlayed").unwrap_or(0)
  }

  /// Milliseconds since the epoch, as Minecraft stores it.
  pub fn set_last_played(&mut self, millis: i64) {
    self.data_mut().insert("LastPlayed", Tag::Long(millis));
  }

  /// A game rule; `None` when absent or not "true"/"false".
  pub fn game_rule(&self, name: &str) -> Option<bool> {
    match self.data().get_compound("GameRules")?.get_str(name)? {
      "true" => Some(true),
      "false" => Some(false),
      _ => None,
    }
  }

  pub fn set_game_rule(&mut self, name: &str, value: bool) {
    let data = self.data_mut();
    if data.get_compound("GameRules").is_none() {
      data.insert("GameRules", Tag::Compound(Compound::new()));
    }
    if let Some(rules) = data.get_compound_mut("GameRules") {
      rules.insert(name, Tag::String(value.to_string()));
    }
  }
}
