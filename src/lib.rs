//! Blockmap spatial index for a 2.5-D Doom-style map.
//!
//! * [`blockmap::BlockMap`] buckets lines, actors and sector islands into a
//!   uniform grid and runs the gameplay traversals over it.
//! * [`world::BspBlockmap`] caches BSP point location on a coarser grid.
//! * [`sim`] keeps `hecs` entities linked as they move.

pub mod blockmap;
pub mod config;
pub mod defs;
pub mod sim;
pub mod world;

pub use blockmap::{BlockMap, BlockmapError};
pub use config::{BlockmapConfig, ConfigError};
pub use world::{BspBlockmap, BspError, BspTree};
