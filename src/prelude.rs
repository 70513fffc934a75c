//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the crate.
//! Users can import everything they need with:
//!
//! ```
//! use claimbox::prelude::*;
//! ```

pub use crate::{
    Aabb3, BlockPos, Claim, ClaimBox, ClaimRegistry, ClaimStore, Compound, IndexConfig, ReadView, SchemaVersion,
    SpatialIndex, World, WorldId, WriteView,
};
