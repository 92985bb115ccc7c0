//! Blocks as stored in Anvil sections: a 12-bit id split across `Blocks`
//! and `Add`, plus data, block light and sky light nibbles.

use std::collections::HashMap;

use log::debug;
use napi_derive::napi;

use crate::error::{Result, WorldError};

pub const MAX_BLOCK_ID: u16 = 0x0fff;
pub const MAX_NIBBLE: u8 = 0x0f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Block ID, twelve bits.
    pub id: u16,
    /// Four bits of additional block data.
    pub data: u8,
    /// Four bits recording the amount of block-emitted light.
    pub block_light: u8,
    /// Four bits recording the amount of sunlight or moonlight.
    pub sky_light: u8,
}

impl Block {
    pub const AIR: Block = Block {
        id: 0,
        data: 0,
        block_light: 0,
        sky_light: MAX_NIBBLE,
    };

    pub fn new(id: u16, data: u8, block_light: u8, sky_light: u8) -> Result<Self> {
        if id > MAX_BLOCK_ID {
            return Err(WorldError::InvalidBlock(format!(
                "id {} does not fit in twelve bits",
                id
            )));
        }
        for (name, value) in [("data", data), ("blocklight", block_light), ("skylight", sky_light)] {
            if value > MAX_NIBBLE {
                return Err(WorldError::InvalidBlock(format!(
                    "{} {} does not fit in four bits",
                    name, value
                )));
            }
        }
        Ok(Block {
            id,
            data,
            block_light,
            sky_light,
        })
    }

    /// A block of type `id` with no data and no light.
    pub fn of(id: u16, data: u8) -> Self {
        Block {
            id: id & MAX_BLOCK_ID,
            data: data & MAX_NIBBLE,
            block_light: 0,
            sky_light: 0,
        }
    }

    pub fn is_air(&self) -> bool {
        self.id == 0
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::AIR
    }
}

/// Legacy ids used by the terrain generator.
pub mod ids {
    pub const AIR: u16 = 0;
    pub const STONE: u16 = 1;
    pub const GRASS: u16 = 2;
    pub const DIRT: u16 = 3;
    pub const BEDROCK: u16 = 7;
    pub const WATER: u16 = 9;
    pub const SAND: u16 = 12;
}

// Simple struct to exchange blocks with JS
#[napi(object)]
#[derive(Debug, Clone, Copy)]
pub struct JsBlock {
    pub id: u32,
    pub data: u32,
    pub blocklight: u32,
    pub skylight: u32,
}

impl From<Block> for JsBlock {
    fn from(block: Block) -> Self {
        JsBlock {
            id: block.id as u32,
            data: block.data as u32,
            blocklight: block.block_light as u32,
            skylight: block.sky_light as u32,
        }
    }
}

impl TryFrom<JsBlock> for Block {
    type Error = WorldError;

    fn try_from(js: JsBlock) -> Result<Self> {
        let nibble = |name: &str, v: u32| {
            u8::try_from(v)
                .map_err(|_| WorldError::InvalidBlock(format!("{} {} does not fit in four bits", name, v)))
        };
        let id = u16::try_from(js.id)
            .map_err(|_| WorldError::InvalidBlock(format!("id {} does not fit in twelve bits", js.id)))?;
        Block::new(
            id,
            nibble("data", js.data)?,
            nibble("blocklight", js.blocklight)?,
            nibble("skylight", js.skylight)?,
        )
    }
}

/// Numeric id <-> name table for one Minecraft version.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    names: HashMap<u16, String>,
    ids: HashMap<String, u16>,
}

impl BlockRegistry {
    /// Loads the block list of `version` (for example "1.12.2") from minecraft-data.
    pub fn load(version: &str) -> Result<Self> {
        let versions = minecraft_data_rs::api::versions_by_minecraft_version()
            .map_err(|e| WorldError::Registry(format!("{:?}", e)))?;
        let version_info = versions
            .get(version)
            .cloned()
            .ok_or_else(|| WorldError::Registry(format!("unknown Minecraft version {}", version)))?;
        let api = minecraft_data_rs::api::Api::new(version_info);
        let blocks = api
            .blocks
            .blocks_array()
            .map_err(|e| WorldError::Registry(format!("{:?}", e)))?;
        debug!("[registry] loaded {} blocks for {}", blocks.len(), version);

        Ok(Self::from_entries(
            blocks
                .into_iter()
                .filter_map(|b| u16::try_from(b.id).ok().map(|id| (id, b.name))),
        ))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (u16, String)>) -> Self {
        let mut registry = BlockRegistry::default();
        for (id, name) in entries {
            registry.ids.insert(name.clone(), id);
            registry.names.insert(id, name);
        }
        registry
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<u16> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
