//! # claimbox - persistent spatial index of world claims
//!
//! Claims are named, owned, axis-aligned 3D regions of a voxel world. This
//! crate answers, for any block, "which claims contain this point" and "are
//! these two blocks in the same claims", cheaply enough to ask on every block
//! edit, and persists claims in a versioned record layout.
//!
//! ## Features
//!
//! - **Claim geometry**: [`ClaimBox`] derives a half-open box from an origin and radii
//! - **Persistent R\*-tree**: [`SpatialIndex`] shares unchanged subtrees between versions,
//!   so every published snapshot stays valid and lock-free to query
//! - **Per-world stores**: [`ClaimStore`] publishes a new snapshot on each change
//! - **Schema migration**: legacy (version 0) claim lists load into the current layout
//!
//! ## Quick Start
//!
//! ```rust
//! use claimbox::prelude::*;
//!
//! let spawn = ClaimBox::centered(BlockPos::new(0, 64, 0), 16, 16).unwrap();
//! let farm = ClaimBox::centered(BlockPos::new(40, 64, 0), 8, 8).unwrap();
//!
//! let index = SpatialIndex::new().insert(spawn, "spawn").insert(farm, "farm");
//! let empty = index.remove(&farm).remove(&spawn);
//!
//! let hits: Vec<_> = index.query_point(BlockPos::new(36, 60, 2)).collect();
//! assert_eq!(hits, vec![&"farm"]);
//! // Earlier versions are untouched by later edits.
//! assert_eq!(index.len(), 2);
//! assert!(empty.is_empty());
//! ```

pub mod claim;
pub mod codec;
pub mod config;
pub mod geometry;
pub mod prelude;
pub mod registry;
pub mod spatial_index;
pub mod storage;
pub mod store;

#[cfg(test)]
mod comparison_tests;

pub use claim::{Claim, World, WorldId};
pub use codec::SchemaVersion;
pub use config::{ConfigError, IndexConfig};
pub use geometry::{Aabb3, BlockPos, Bounded, ClaimBox};
pub use registry::ClaimRegistry;
pub use spatial_index::SpatialIndex;
pub use storage::{Compound, ReadView, StorageError, WriteView};
pub use store::{ClaimIndex, ClaimSnapshots, ClaimStore};
