//! Known tag names for `level.dat` and chunk data.
//!
//! Untyped values coming from the host (JSON numbers, arrays) carry no NBT
//! type, so these tables decide what a given tag name is written as.

use super::TagId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSchema {
    pub name: &'static str,
    pub id: TagId,
    /// Empty instances of this list are written with a byte array element id.
    pub empty_byte_list: bool,
    /// Element type for list tags.
    pub element: TagId,
}

const fn tag(name: &'static str, id: TagId) -> TagSchema {
    TagSchema {
        name,
        id,
        empty_byte_list: false,
        element: TagId::End,
    }
}

const fn list(name: &'static str, element: TagId, empty_byte_list: bool) -> TagSchema {
    TagSchema {
        name,
        id: TagId::List,
        empty_byte_list,
        element,
    }
}

pub const LEVEL_DAT: &[TagSchema] = &[
    tag("Data", TagId::Compound),
    tag("version", TagId::Int),
    tag("initialized", TagId::Byte),
    tag("LevelName", TagId::String),
    tag("generatorName", TagId::String),
    tag("generatorVersion", TagId::Int),
    tag("generatorOptions", TagId::String),
    tag("RandomSeed", TagId::Long),
    tag("MapFeatures", TagId::Byte),
    tag("LastPlayed", TagId::Long),
    tag("SizeOnDisk", TagId::Long),
    tag("allowCommands", TagId::Byte),
    tag("hardcore", TagId::Byte),
    tag("GameType", TagId::Int),
    tag("Time", TagId::Long),
    tag("DayTime", TagId::Long),
    tag("SpawnX", TagId::Int),
    tag("SpawnY", TagId::Int),
    tag("SpawnZ", TagId::Int),
    tag("raining", TagId::Byte),
    tag("rainTime", TagId::Int),
    tag("thundering", TagId::Byte),
    tag("thunderTime", TagId::Int),
    tag("Player", TagId::Compound),
    tag("GameRules", TagId::Compound),
    tag("commandBlockOutput", TagId::String),
    tag("doFireTick", TagId::String),
    tag("doMobLoot", TagId::String),
    tag("doMobSpawning", TagId::String),
    tag("doTileDrops", TagId::String),
    tag("keepInventory", TagId::String),
    tag("mobGriefing", TagId::String),
];

pub const CHUNK: &[TagSchema] = &[
    tag("Level", TagId::Compound),
    tag("xPos", TagId::Int),
    tag("zPos", TagId::Int),
    tag("LastUpdate", TagId::Long),
    tag("TerrainPopulated", TagId::Byte),
    tag("Biomes", TagId::ByteArray),
    tag("HeightMap", TagId::IntArray),
    list("Sections", TagId::Compound, false),
    tag("Y", TagId::Byte),
    tag("Blocks", TagId::ByteArray),
    tag("Add", TagId::ByteArray),
    tag("Data", TagId::ByteArray),
    tag("BlockLight", TagId::ByteArray),
    tag("SkyLight", TagId::ByteArray),
    list("Entities", TagId::Compound, true),
    list("TileEntities", TagId::Compound, true),
    list("TileTicks", TagId::Compound, false),
];

pub fn lookup(table: &'static [TagSchema], name: &str) -> Option<&'static TagSchema> {
    table.iter().find(|entry| entry.name == name)
}
