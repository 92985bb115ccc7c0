#![deny(clippy::all)]

//! A NAPI-RS extension for reading and writing Minecraft Anvil worlds:
//! NBT, region files, chunks, `level.dat`, plus a seeded simplex terrain generator.

// Make modules public so the JS classes and Rust callers share the same types.
pub mod block;
pub mod chunk;
pub mod compression;
pub mod config;
pub mod coords;
pub mod error;
pub mod generator;
pub mod level;
pub mod nbt;
pub mod nibble;
pub mod region;
pub mod world;

pub use error::{Result, WorldError};
