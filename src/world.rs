// src/world.rs
use crate::block::{Block, BlockRegistry, JsBlock};
use crate::chunk::{Chunk, NapiChunk, UNSET_BIOME};
use crate::compression::{Compression, DEFAULT_LEVEL};
use crate::config::{JsWorldOptions, WorldConfig, DEFAULT_INFLATE_LIMIT};
use crate::coords::{ChunkCoords, RegionCoords, WorldCoords, WORLD_HEIGHT};
use crate::error::{Result, WorldError};
use crate::level::Level;
use crate::nbt::json::{compound_from_json, compound_to_json};
use crate::nbt::schema::{CHUNK, LEVEL_DAT};
use crate::nbt::{read_compressed, write_compressed, NamedTag};
use crate::region::{parse_region_filename, Region};
use dashmap::DashMap;
use log::{debug, info};
use napi::bindgen_prelude::{Buffer, Either};
use napi_derive::napi;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

type Shared<T> = Arc<RwLock<T>>;

/// A world directory: `level.dat` plus `region/*.mca`, with chunks and
/// regions cached as they are touched.
pub struct World {
    path: PathBuf,
    config: WorldConfig,
    level: RwLock<Level>,
    chunks: DashMap<ChunkCoords, Shared<Chunk>>,
    regions: DashMap<RegionCoords, Shared<Region>>,
    registry: OnceLock<BlockRegistry>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| WorldError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| WorldError::LockPoisoned)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl World {
    /// Opens an existing world; fails with `MissingLevel` without a `level.dat`.
    pub fn open(path: impl AsRef<Path>, config: WorldConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let level = Level::load(path.join("level.dat"), config.inflate_limit)?;
        info!(
            "[world] opened {} ({})",
            path.display(),
            level.name().unwrap_or("unnamed")
        );
        Ok(Self::with_level(path, level, config))
    }

    /// Creates the directory layout and a fresh `level.dat`.
    pub fn create(path: impl AsRef<Path>, name: &str, seed: i64, config: WorldConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let region_dir = path.join("region");
        fs::create_dir_all(&region_dir).map_err(|source| WorldError::File {
            context: format!("Unable to create {}", region_dir.display()),
            source,
        })?;
        let level = Level::new(name, seed);
        level.save(path.join("level.dat"))?;
        info!("[world] created {} with seed {}", path.display(), seed);
        Ok(Self::with_level(path, level, config))
    }

    fn with_level(path: PathBuf, level: Level, config: WorldConfig) -> Self {
        World {
            path,
            config,
            level: RwLock::new(level),
            chunks: DashMap::new(),
            regions: DashMap::new(),
            registry: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn level(&self) -> Result<RwLockReadGuard<'_, Level>> {
        read(&self.level)
    }

    pub fn level_mut(&self) -> Result<RwLockWriteGuard<'_, Level>> {
        write(&self.level)
    }

    fn region_path(&self, coords: RegionCoords) -> PathBuf {
        self.path.join("region").join(coords.file_name())
    }

    /// The cached region, else the one on disk, else `None`.
    pub fn region(&self, coords: RegionCoords) -> Result<Option<Shared<Region>>> {
        if let Some(entry) = self.regions.get(&coords) {
            return Ok(Some(entry.value().clone()));
        }
        let path = self.region_path(coords);
        if !path.is_file() {
            return Ok(None);
        }
        let region = Region::load(&path)?.with_inflate_limit(self.config.inflate_limit);
        let shared = self
            .regions
            .entry(coords)
            .or_insert_with(|| Arc::new(RwLock::new(region)))
            .clone();
        Ok(Some(shared))
    }

    fn region_or_create(&self, coords: RegionCoords) -> Result<Shared<Region>> {
        if let Some(region) = self.region(coords)? {
            return Ok(region);
        }
        debug!("[world] new region {}", coords.file_name());
        let region = Region::new(coords.x, coords.z).with_inflate_limit(self.config.inflate_limit);
        Ok(self
            .regions
            .entry(coords)
            .or_insert_with(|| Arc::new(RwLock::new(region)))
            .clone())
    }

    /// A chunk from the cache, or read from its region file. `None` when the
    /// chunk was never generated.
    pub fn chunk(&self, cx: i32, cz: i32) -> Result<Option<Shared<Chunk>>> {
        let coords = ChunkCoords::new(cx, cz);
        if let Some(entry) = self.chunks.get(&coords) {
            return Ok(Some(entry.value().clone()));
        }

        let region = match self.region(coords.to_region_coords())? {
            Some(region) => region,
            None => return Ok(None),
        };
        let root = read(&region)?.read_chunk(cx, cz)?;
        let chunk = match root {
            Some(root) => Chunk::from_nbt(root)?,
            None => return Ok(None),
        };
        if chunk.coords() != coords {
            return Err(WorldError::InvalidChunk(format!(
                "slot for ({}, {}) holds chunk ({}, {})",
                cx,
                cz,
                chunk.x(),
                chunk.z()
            )));
        }
        debug!("[world] loaded chunk ({}, {})", cx, cz);
        Ok(Some(
            self.chunks
                .entry(coords)
                .or_insert_with(|| Arc::new(RwLock::new(chunk)))
                .clone(),
        ))
    }

    pub fn get_or_create_chunk(&self, cx: i32, cz: i32) -> Result<Shared<Chunk>> {
        if let Some(chunk) = self.chunk(cx, cz)? {
            return Ok(chunk);
        }
        Ok(self
            .chunks
            .entry(ChunkCoords::new(cx, cz))
            .or_insert_with(|| Arc::new(RwLock::new(Chunk::new(cx, cz))))
            .clone())
    }

    /// Puts a chunk in the cache, replacing any cached chunk at its position.
    pub fn insert_chunk(&self, chunk: Chunk) -> Result<Shared<Chunk>> {
        let shared = Arc::new(RwLock::new(chunk));
        self.attach_chunk(shared.clone())?;
        Ok(shared)
    }

    /// Caches an already shared chunk, so edits through other handles to it
    /// are saved with the world.
    pub fn attach_chunk(&self, shared: Shared<Chunk>) -> Result<()> {
        let coords = {
            let mut chunk = write(&shared)?;
            chunk.mark_modified();
            chunk.coords()
        };
        self.chunks.insert(coords, shared);
        Ok(())
    }

    /// Drops a chunk from the cache, writing it back first when modified.
    /// Returns false if it was not loaded.
    ///
    /// Handles to the chunk stay usable but are detached: their later edits
    /// are only saved once the chunk is attached again.
    pub fn unload_chunk(&self, cx: i32, cz: i32) -> Result<bool> {
        let coords = ChunkCoords::new(cx, cz);
        let shared = match self.chunks.get(&coords) {
            Some(entry) => entry.value().clone(),
            None => return Ok(false),
        };
        {
            let mut chunk = write(&shared)?;
            if chunk.is_modified() {
                let region = self.region_or_create(coords.to_region_coords())?;
                let mut region = write(&region)?;
                self.store_chunk(&mut region, &mut chunk, unix_now())?;
                region.save(&self.path)?;
            }
        }
        self.chunks.remove(&coords);
        debug!("[world] unloaded chunk ({}, {})", cx, cz);
        Ok(true)
    }

    /// Writes back the cached chunks of a region, saves it if modified and
    /// drops it from the cache. Returns false if it was not loaded.
    pub fn unload_region(&self, rx: i32, rz: i32) -> Result<bool> {
        let coords = RegionCoords::new(rx, rz);
        let shared = match self.regions.get(&coords) {
            Some(entry) => entry.value().clone(),
            None => return Ok(false),
        };
        let now = unix_now();
        for entry in self.chunks.iter() {
            let mut chunk = write(entry.value())?;
            if chunk.is_modified() && chunk.coords().to_region_coords() == coords {
                self.store_chunk(&mut *write(&shared)?, &mut chunk, now)?;
            }
        }
        drop(shared);

        if let Some((_, shared)) = self.regions.remove(&coords) {
            match Arc::try_unwrap(shared) {
                Ok(lock) => {
                    let region = lock.into_inner().map_err(|_| WorldError::LockPoisoned)?;
                    if region.is_modified() {
                        region.unload(&self.path)?;
                    }
                }
                // Another handle still holds the region.
                Err(shared) => {
                    let mut region = write(&shared)?;
                    if region.is_modified() {
                        region.save(&self.path)?;
                    }
                }
            }
        }
        debug!("[world] unloaded region {}", coords.file_name());
        Ok(true)
    }

    pub fn loaded_regions(&self) -> Vec<RegionCoords> {
        let mut coords: Vec<RegionCoords> = self.regions.iter().map(|entry| *entry.key()).collect();
        coords.sort();
        coords
    }

    fn store_chunk(&self, region: &mut Region, chunk: &mut Chunk, timestamp: u64) -> Result<()> {
        region.write_chunk(
            chunk.x(),
            chunk.z(),
            &chunk.to_nbt(),
            self.config.chunk_compression,
            self.config.compression_level,
            timestamp as u32,
        )?;
        chunk.mark_saved();
        Ok(())
    }

    fn check_height(coords: WorldCoords) -> Result<()> {
        if (0..WORLD_HEIGHT).contains(&coords.y) {
            Ok(())
        } else {
            Err(WorldError::OutOfBounds {
                x: coords.x,
                y: coords.y,
                z: coords.z,
            })
        }
    }

    /// Block at world coordinates; chunks that do not exist read as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Block> {
        let coords = WorldCoords::new(x, y, z);
        Self::check_height(coords)?;
        let chunk_coords = coords.to_chunk_coords();
        match self.chunk(chunk_coords.x, chunk_coords.z)? {
            Some(chunk) => {
                let rel = coords.to_column_rel_coords();
                let guard = read(&chunk)?;
                guard.get_block(rel.x, rel.y, rel.z)
            }
            None => Ok(Block::AIR),
        }
    }

    pub fn set_block(&self, x: i32, y: i32, z: i32, block: Block) -> Result<()> {
        let coords = WorldCoords::new(x, y, z);
        Self::check_height(coords)?;
        let chunk_coords = coords.to_chunk_coords();
        let chunk = self
            .chunk(chunk_coords.x, chunk_coords.z)?
            .ok_or(WorldError::ChunkNotLoaded {
                x: chunk_coords.x,
                z: chunk_coords.z,
            })?;
        let rel = coords.to_column_rel_coords();
        let mut guard = write(&chunk)?;
        guard.set_block(rel.x, rel.y, rel.z, block)
    }

    /// Biome id of the column at world x/z, 255 when unknown.
    pub fn biome(&self, x: i32, z: i32) -> Result<u8> {
        let coords = WorldCoords::new(x, 0, z);
        let chunk_coords = coords.to_chunk_coords();
        match self.chunk(chunk_coords.x, chunk_coords.z)? {
            Some(chunk) => {
                let rel = coords.to_column_rel_coords();
                let guard = read(&chunk)?;
                guard.biome(rel.x, rel.z)
            }
            None => Ok(UNSET_BIOME),
        }
    }

    pub fn loaded_chunks(&self) -> Vec<ChunkCoords> {
        let mut coords: Vec<ChunkCoords> = self.chunks.iter().map(|entry| *entry.key()).collect();
        coords.sort();
        coords
    }

    /// Region files present in `region/`, ordered by coordinates.
    pub fn region_files(&self) -> Result<Vec<(RegionCoords, PathBuf)>> {
        let dir = self.path.join("region");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some(coords) = parse_region_filename(&path.to_string_lossy()) {
                files.push((coords, path));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Writes every modified chunk into its region, every modified region to
    /// disk, then `level.dat`.
    pub fn save(&self) -> Result<()> {
        let now = unix_now();
        let mut touched = BTreeSet::new();
        for entry in self.chunks.iter() {
            let mut chunk = write(entry.value())?;
            if !chunk.is_modified() {
                continue;
            }
            let coords = chunk.coords().to_region_coords();
            let region = self.region_or_create(coords)?;
            self.store_chunk(&mut *write(&region)?, &mut chunk, now)?;
            touched.insert(coords);
        }

        let mut saved = 0;
        for entry in self.regions.iter() {
            let mut region = write(entry.value())?;
            if region.is_modified() {
                region.save(&self.path)?;
                saved += 1;
            }
        }

        let mut level = self.level_mut()?;
        level.set_last_played((now * 1000) as i64);
        level.save(self.path.join("level.dat"))?;
        info!(
            "[world] saved {} ({} chunk regions touched, {} region files written)",
            self.path.display(),
            touched.len(),
            saved
        );
        Ok(())
    }

    /// Uses `registry` for name lookups instead of loading minecraft-data.
    pub fn set_registry(&self, registry: BlockRegistry) -> bool {
        self.registry.set(registry).is_ok()
    }

    fn registry(&self) -> Result<&BlockRegistry> {
        if let Some(registry) = self.registry.get() {
            return Ok(registry);
        }
        let loaded = BlockRegistry::load(&self.config.registry_version)?;
        Ok(self.registry.get_or_init(|| loaded))
    }

    pub fn block_name(&self, id: u16) -> Result<Option<String>> {
        Ok(self.registry()?.name(id).map(str::to_string))
    }
}

/// Reads one chunk straight from a region file.
pub fn load_chunk(region_path: impl AsRef<Path>, cx: i32, cz: i32, inflate_limit: usize) -> Result<Option<Chunk>> {
    let region = Region::load(region_path)?.with_inflate_limit(inflate_limit);
    match region.read_chunk(cx, cz)? {
        Some(root) => Chunk::from_nbt(root).map(Some),
        None => Ok(None),
    }
}

/// Guesses the wrapping of an NBT buffer from its first bytes.
fn sniff_compression(bytes: &[u8]) -> Compression {
    match bytes {
        [0x1f, 0x8b, ..] => Compression::Gzip,
        [0x78, ..] => Compression::Zlib,
        _ => Compression::None,
    }
}

fn scheme_arg(scheme: u32) -> Result<Compression> {
    let scheme = u8::try_from(scheme).map_err(|_| WorldError::UnsupportedCompression(u8::MAX))?;
    Compression::try_from(scheme)
}

#[napi(object)]
#[derive(Debug, Clone, Copy)]
pub struct JsChunkCoords {
    pub x: i32,
    pub z: i32,
}

#[napi(object)]
#[derive(Debug, Clone, Copy)]
pub struct JsRegionCoords {
    pub x: i32,
    pub z: i32,
}

#[napi(object)]
#[derive(Debug, Clone, Copy)]
pub struct JsBlockCoords {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[napi(js_name = "World")]
pub struct NapiWorld {
    world: Arc<World>,
}

#[napi]
impl NapiWorld {
    /// Opens the world directory at `path`.
    #[napi(constructor)]
    pub fn new(path: String, options: Option<JsWorldOptions>) -> napi::Result<Self> {
        let config = WorldConfig::try_from(options.unwrap_or_default())?;
        Ok(NapiWorld {
            world: Arc::new(World::open(path, config)?),
        })
    }

    /// Creates a new world directory with a fresh `level.dat`. Seeds beyond
    /// the safe integer range are passed as decimal strings.
    #[napi(factory)]
    pub fn create(
        path: String,
        name: String,
        seed: Either<i64, String>,
        options: Option<JsWorldOptions>,
    ) -> napi::Result<Self> {
        let seed = match seed {
            Either::A(seed) => seed,
            Either::B(text) => text
                .parse()
                .map_err(|_| WorldError::InvalidNbt(format!("'{}' is not a valid seed", text)))?,
        };
        let config = WorldConfig::try_from(options.unwrap_or_default())?;
        Ok(NapiWorld {
            world: Arc::new(World::create(path, &name, seed, config)?),
        })
    }

    /// Path to the base minecraft world directory
    #[napi(getter)]
    pub fn path(&self) -> String {
        self.world.path().display().to_string()
    }

    /// Object containing level.dat attributes
    #[napi(getter)]
    pub fn level(&self) -> napi::Result<serde_json::Value> {
        Ok(self.world.level()?.to_json())
    }

    #[napi]
    pub fn set_level(&self, level: serde_json::Value) -> napi::Result<()> {
        self.world.level_mut()?.set_json(&level)?;
        Ok(())
    }

    #[napi(getter)]
    pub fn level_name(&self) -> napi::Result<Option<String>> {
        Ok(self.world.level()?.name().map(str::to_string))
    }

    /// The world seed as a decimal string, since it rarely fits a double.
    #[napi(getter)]
    pub fn seed(&self) -> napi::Result<String> {
        Ok(self.world.level()?.seed().to_string())
    }

    #[napi(getter)]
    pub fn spawn(&self) -> napi::Result<JsBlockCoords> {
        let (x, y, z) = self.world.level()?.spawn();
        Ok(JsBlockCoords { x, y, z })
    }

    /// The chunk at the given chunk coordinates, or null if it was never generated.
    #[napi]
    pub fn get_chunk(&self, chunk_x: i32, chunk_z: i32) -> napi::Result<Option<NapiChunk>> {
        Ok(self.world.chunk(chunk_x, chunk_z)?.map(NapiChunk::from_shared))
    }

    /// The chunk at the given coordinates, created empty when it does not exist yet.
    #[napi]
    pub fn create_chunk(&self, chunk_x: i32, chunk_z: i32) -> napi::Result<NapiChunk> {
        Ok(NapiChunk::from_shared(self.world.get_or_create_chunk(chunk_x, chunk_z)?))
    }

    #[napi]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> napi::Result<JsBlock> {
        Ok(self.world.get_block(x, y, z)?.into())
    }

    #[napi]
    pub fn set_block(&self, x: i32, y: i32, z: i32, block: JsBlock) -> napi::Result<()> {
        self.world.set_block(x, y, z, Block::try_from(block)?)?;
        Ok(())
    }

    #[napi]
    pub fn get_biome(&self, x: i32, z: i32) -> napi::Result<u32> {
        Ok(self.world.biome(x, z)? as u32)
    }

    /// Returns a list of coordinates for all currently loaded chunks.
    #[napi(ts_return_type = "{ x: number; z: number; }[]")]
    pub fn get_loaded_chunks(&self) -> Vec<JsChunkCoords> {
        self.world
            .loaded_chunks()
            .into_iter()
            .map(|c| JsChunkCoords { x: c.x, z: c.z })
            .collect()
    }

    /// Unloads a chunk, saving it first if it changed. `Chunk` objects for it
    /// stop being part of the world until passed to `insertChunk`.
    #[napi]
    pub fn unload_chunk(&self, chunk_x: i32, chunk_z: i32) -> napi::Result<bool> {
        Ok(self.world.unload_chunk(chunk_x, chunk_z)?)
    }

    /// Adds a chunk, such as one from `Generator.generateChunk`, to the world.
    /// It replaces any loaded chunk at the same position and is written on the next save.
    #[napi]
    pub fn insert_chunk(&self, chunk: &NapiChunk) -> napi::Result<()> {
        self.world.attach_chunk(chunk.shared())?;
        Ok(())
    }

    /// Releases a cached region file, writing pending changes first.
    #[napi]
    pub fn unload_region(&self, region_x: i32, region_z: i32) -> napi::Result<bool> {
        Ok(self.world.unload_region(region_x, region_z)?)
    }

    #[napi(ts_return_type = "{ x: number; z: number; }[]")]
    pub fn get_loaded_regions(&self) -> Vec<JsRegionCoords> {
        self.world
            .loaded_regions()
            .into_iter()
            .map(|c| JsRegionCoords { x: c.x, z: c.z })
            .collect()
    }

    #[napi]
    pub fn region_files(&self) -> napi::Result<Vec<String>> {
        Ok(self
            .world
            .region_files()?
            .into_iter()
            .map(|(_, path)| path.display().to_string())
            .collect())
    }

    /// Save the world! (out to files, anyway)
    #[napi]
    pub fn save(&self) -> napi::Result<()> {
        self.world.save()?;
        Ok(())
    }

    #[napi]
    pub fn block_name(&self, id: u32) -> napi::Result<Option<String>> {
        let id = u16::try_from(id).map_err(|_| WorldError::InvalidBlock(format!("id {} does not fit in twelve bits", id)))?;
        Ok(self.world.block_name(id)?)
    }
}

/// Get a specified chunk from a region file, as a plain object.
#[napi]
pub fn get_chunk(region_file: String, chunk_x: i32, chunk_z: i32) -> napi::Result<Option<serde_json::Value>> {
    Ok(load_chunk(region_file, chunk_x, chunk_z, DEFAULT_INFLATE_LIMIT)?.map(|c| c.to_json()))
}

/// Decodes an NBT buffer. Without `compression` the wrapping is detected.
#[napi]
pub fn decode_nbt(buffer: Buffer, compression: Option<u32>) -> napi::Result<serde_json::Value> {
    let bytes: &[u8] = buffer.as_ref();
    let mode = match compression {
        Some(scheme) => scheme_arg(scheme)?,
        None => sniff_compression(bytes),
    };
    let root = read_compressed(bytes, mode, DEFAULT_INFLATE_LIMIT)?;
    Ok(compound_to_json(&root.compound))
}

/// Encodes an object as NBT. Objects with a `Level` key are typed as chunk
/// data, anything else as `level.dat`.
#[napi]
pub fn encode_nbt(value: serde_json::Value, compression: Option<u32>) -> napi::Result<Buffer> {
    let mode = match compression {
        Some(scheme) => scheme_arg(scheme)?,
        None => Compression::None,
    };
    let bytes = encode_json(&value, mode)?;
    Ok(bytes.into())
}

fn encode_json(value: &serde_json::Value, mode: Compression) -> Result<Vec<u8>> {
    let table = if value.get("Level").is_some() { CHUNK } else { LEVEL_DAT };
    let compound = compound_from_json(value, table, None)?;
    write_compressed(&NamedTag::new("", compound), mode, DEFAULT_LEVEL)
}

/// Region coordinates encoded in a region file name, or null.
#[napi]
pub fn region_information(filename: String) -> Option<JsRegionCoords> {
    parse_region_filename(&filename).map(|c| JsRegionCoords { x: c.x, z: c.z })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ids;
    use crate::generator::Generator;
    use serde_json::json;

    fn new_world(dir: &Path) -> World {
        World::create(dir, "Test", 1234, WorldConfig::default()).unwrap()
    }

    #[test]
    fn open_requires_level_dat() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            World::open(dir.path(), WorldConfig::default()),
            Err(WorldError::MissingLevel(_))
        ));
    }

    #[test]
    fn blocks_survive_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let world = new_world(dir.path());
            world.get_or_create_chunk(-1, 2).unwrap();
            let stone = Block::new(ids::STONE, 0, 0, 0).unwrap();
            world.set_block(-5, 70, 33, stone).unwrap();
            world.set_block(-16, 0, 32, Block::new(300, 4, 2, 0).unwrap()).unwrap();
            world.save().unwrap();
            // Nothing left to write.
            world.save().unwrap();
        }

        let world = World::open(dir.path(), WorldConfig::default()).unwrap();
        assert_eq!(world.level().unwrap().name(), Some("Test"));
        assert!(world.level().unwrap().last_played() > 0);
        assert!(world.loaded_chunks().is_empty());
        assert_eq!(world.get_block(-5, 70, 33).unwrap().id, ids::STONE);
        assert_eq!(world.get_block(-16, 0, 32).unwrap(), Block::new(300, 4, 2, 0).unwrap());
        assert_eq!(world.loaded_chunks(), vec![ChunkCoords::new(-1, 2)]);

        let files = world.region_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, RegionCoords::new(-1, 0));

        let region = world.region(RegionCoords::new(-1, 0)).unwrap().unwrap();
        assert!(read(&region).unwrap().timestamp(-1, 2) > 0);
    }

    #[test]
    fn set_block_needs_a_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let world = new_world(dir.path());
        let err = world.set_block(100, 64, 100, Block::of(ids::DIRT, 0)).unwrap_err();
        assert!(matches!(err, WorldError::ChunkNotLoaded { x: 6, z: 6 }));
        assert_eq!(err.to_string(), "Chunk at 6, 6 not loaded");
        assert_eq!(world.get_block(100, 64, 100).unwrap(), Block::AIR);
        assert!(matches!(
            world.get_block(0, 256, 0),
            Err(WorldError::OutOfBounds { .. })
        ));
        assert_eq!(world.biome(100, 100).unwrap(), UNSET_BIOME);
    }

    #[test]
    fn unload_writes_modified_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let world = new_world(dir.path());
        let chunk = Generator::new(5).generate_chunk(0, 0).unwrap();
        world.insert_chunk(chunk).unwrap();
        assert!(world.unload_chunk(0, 0).unwrap());
        assert!(!world.unload_chunk(0, 0).unwrap());

        let path = dir.path().join("region").join("r.0.0.mca");
        let loaded = load_chunk(&path, 0, 0, DEFAULT_INFLATE_LIMIT).unwrap().unwrap();
        assert_eq!(loaded.get_block(3, 0, 3).unwrap().id, ids::BEDROCK);
        assert!(load_chunk(&path, 1, 0, DEFAULT_INFLATE_LIMIT).unwrap().is_none());

        let reloaded = world.chunk(0, 0).unwrap().unwrap();
        let guard = read(&reloaded).unwrap();
        assert!(!guard.is_modified());
        assert_eq!(guard.coords(), ChunkCoords::new(0, 0));
    }

    #[test]
    fn unloading_a_region_shrinks_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let world = new_world(dir.path());
        world.get_or_create_chunk(0, 0).unwrap();
        world.get_or_create_chunk(40, 0).unwrap();
        world.set_block(1, 10, 1, Block::of(ids::STONE, 0)).unwrap();
        world.save().unwrap();
        assert_eq!(
            world.loaded_regions(),
            vec![RegionCoords::new(0, 0), RegionCoords::new(1, 0)]
        );

        world.set_block(2, 10, 2, Block::of(ids::DIRT, 0)).unwrap();
        assert!(world.unload_region(0, 0).unwrap());
        assert!(!world.unload_region(0, 0).unwrap());
        assert_eq!(world.loaded_regions(), vec![RegionCoords::new(1, 0)]);

        let path = dir.path().join("region").join("r.0.0.mca");
        let chunk = load_chunk(&path, 0, 0, DEFAULT_INFLATE_LIMIT).unwrap().unwrap();
        assert_eq!(chunk.get_block(1, 10, 1).unwrap().id, ids::STONE);
        assert_eq!(chunk.get_block(2, 10, 2).unwrap().id, ids::DIRT);
        assert!(!read(&world.chunk(0, 0).unwrap().unwrap()).unwrap().is_modified());

        // Reading through the region again brings it back.
        world.unload_chunk(0, 0).unwrap();
        assert_eq!(world.get_block(2, 10, 2).unwrap().id, ids::DIRT);
        assert!(world.loaded_regions().contains(&RegionCoords::new(0, 0)));
    }

    #[test]
    fn detached_chunks_can_be_attached_again() {
        let dir = tempfile::tempdir().unwrap();
        let world = new_world(dir.path());
        let handle = world.get_or_create_chunk(3, 3).unwrap();
        assert!(world.unload_chunk(3, 3).unwrap());

        write(&handle).unwrap().set_block(0, 5, 0, Block::of(ids::STONE, 0)).unwrap();
        assert_eq!(world.get_block(48, 5, 48).unwrap(), Block::AIR);

        world.attach_chunk(handle).unwrap();
        assert_eq!(world.get_block(48, 5, 48).unwrap().id, ids::STONE);
        world.save().unwrap();
        let path = dir.path().join("region").join("r.0.0.mca");
        let chunk = load_chunk(&path, 3, 3, DEFAULT_INFLATE_LIMIT).unwrap().unwrap();
        assert_eq!(chunk.get_block(0, 5, 0).unwrap().id, ids::STONE);
    }

    #[test]
    fn inflate_limit_covers_level_dat() {
        let dir = tempfile::tempdir().unwrap();
        new_world(dir.path());
        let config = WorldConfig {
            inflate_limit: 8,
            ..WorldConfig::default()
        };
        assert!(matches!(
            World::open(dir.path(), config),
            Err(WorldError::DecompressionError(_))
        ));
        assert!(World::open(dir.path(), WorldConfig::default()).is_ok());
    }

    #[test]
    fn block_names_come_from_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let world = new_world(dir.path());
        assert!(world.set_registry(BlockRegistry::from_entries([(1, "stone".to_string())])));
        assert_eq!(world.block_name(1).unwrap().as_deref(), Some("stone"));
        assert_eq!(world.block_name(2).unwrap(), None);
    }

    #[test]
    fn json_encoding_picks_the_schema() {
        let chunk = json!({ "Level": { "xPos": 1, "zPos": 2, "Entities": [] } });
        let bytes = encode_json(&chunk, Compression::None).unwrap();
        let root = read_compressed(&bytes, sniff_compression(&bytes), DEFAULT_INFLATE_LIMIT).unwrap();
        let level = root.compound.get_compound("Level").unwrap();
        assert_eq!(level.get_i32("zPos"), Some(2));
        assert_eq!(level.get_list("Entities").map(|l| l.element), Some(crate::nbt::TagId::ByteArray));

        let data = json!({ "Data": { "RandomSeed": 5, "hardcore": true } });
        let bytes = encode_json(&data, Compression::Gzip).unwrap();
        assert_eq!(sniff_compression(&bytes), Compression::Gzip);
        let level = Level::from_bytes(&bytes, DEFAULT_INFLATE_LIMIT).unwrap();
        assert_eq!(level.seed(), 5);
        assert!(level.hardcore());

        assert!(encode_json(&json!({ "Nope": 1 }), Compression::None).is_err());
    }

    #[test]
    fn region_information_parses_names() {
        let coords = region_information("saves/w/region/r.-1.4.mca".to_string()).unwrap();
        assert_eq!((coords.x, coords.z), (-1, 4));
        assert!(region_information("level.dat".to_string()).is_none());
    }
}
