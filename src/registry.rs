//! One claim store per loaded world, and the queries event hooks ask of them.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::claim::{Claim, WorldId};
use crate::config::IndexConfig;
use crate::geometry::BlockPos;
use crate::store::ClaimStore;

/// Claim stores of every loaded world.
pub struct ClaimRegistry<C> {
    config: IndexConfig,
    worlds: HashMap<WorldId, ClaimStore<C>>,
}

impl<C> ClaimRegistry<C> {
    /// Creates a registry with no worlds.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Creates a registry whose stores use `config`.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            config,
            worlds: HashMap::new(),
        }
    }

    /// Attaches an empty store to a newly loaded world and returns it.
    ///
    /// A world that is already loaded keeps its store.
    pub fn world_loaded(&mut self, world: WorldId) -> &mut ClaimStore<C> {
        let config = self.config;
        self.worlds.entry(world).or_insert_with_key(|id| {
            debug!("attached claim store to {id}");
            ClaimStore::with_config(id.clone(), config)
        })
    }

    /// Detaches and returns the store of an unloaded world.
    pub fn world_unloaded(&mut self, world: &WorldId) -> Option<ClaimStore<C>> {
        let store = self.worlds.remove(world);
        if store.is_some() {
            debug!("detached claim store from {world}");
        }
        store
    }

    /// Store of a loaded world.
    pub fn store(&self, world: &WorldId) -> Option<&ClaimStore<C>> {
        self.worlds.get(world)
    }

    /// Mutable store of a loaded world.
    pub fn store_mut(&mut self, world: &WorldId) -> Option<&mut ClaimStore<C>> {
        self.worlds.get_mut(world)
    }

    /// Loaded worlds, in no particular order.
    pub fn worlds(&self) -> impl Iterator<Item = &WorldId> {
        self.worlds.keys()
    }
}

impl<C: Claim> ClaimRegistry<C> {
    /// True unless a claim in `world` containing `pos` is rejected by `allows`.
    ///
    /// Worlds without a store have no claims.
    pub fn can_modify(&self, world: &WorldId, pos: BlockPos, allows: impl FnMut(&C) -> bool) -> bool {
        self.store(world).is_none_or(|store| store.can_modify(pos, allows))
    }

    /// True if `a` and `b` in `world` are inside exactly the same claims.
    pub fn has_matching_claims(&self, world: &WorldId, a: BlockPos, b: BlockPos) -> bool {
        self.store(world).is_none_or(|store| store.has_matching_claims(a, b))
    }
}

impl<C> Default for ClaimRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ClaimRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimRegistry")
            .field("worlds", &self.worlds.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
