//! Per-world claim storage.
//!
//! A [`ClaimStore`] owns the published [`ClaimIndex`] of one world. Mutation
//! goes through `&mut self`, so there is exactly one writer; each mutation
//! builds a new index and swaps it into the publish slot. Readers on other
//! threads hold a [`ClaimSnapshots`] handle, take one snapshot, and query that
//! snapshot only.
//!
//! The publish slot is an `RwLock` around the current `Arc`. Taking a snapshot
//! holds the read lock only long enough to clone that pointer, and publishing
//! holds the write lock only to swap it. Queries run on the snapshot with no
//! lock held.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use thiserror::Error;

use crate::claim::{Claim, World, WorldId};
use crate::codec::{self, SchemaVersion, read_claim_box, write_claim_box};
use crate::config::IndexConfig;
use crate::geometry::{Aabb3, BlockPos, ClaimBox};
use crate::spatial_index::SpatialIndex;
use crate::storage::{Compound, ReadView, StorageError, WriteView};

/// Spatial index of the claims in one world.
pub type ClaimIndex<C> = SpatialIndex<ClaimBox, C>;

type Slot<C> = Arc<RwLock<Arc<ClaimIndex<C>>>>;

fn read_slot<C>(slot: &Slot<C>) -> Arc<ClaimIndex<C>> {
    Arc::clone(&slot.read().unwrap_or_else(PoisonError::into_inner))
}

/// Why a stored claim record was dropped during load.
#[derive(Debug, Error)]
enum RecordError {
    #[error("geometry is missing or degenerate")]
    NoGeometry,
    #[error(transparent)]
    Data(#[from] StorageError),
}

/// Claims of a single world.
pub struct ClaimStore<C> {
    world: WorldId,
    config: IndexConfig,
    current: Slot<C>,
}

/// Read-only handle for taking snapshots of a store from other threads.
pub struct ClaimSnapshots<C> {
    current: Slot<C>,
}

impl<C> ClaimSnapshots<C> {
    /// The index as currently published.
    pub fn snapshot(&self) -> Arc<ClaimIndex<C>> {
        read_slot(&self.current)
    }
}

impl<C> Clone for ClaimSnapshots<C> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<C> fmt::Debug for ClaimSnapshots<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSnapshots")
            .field("len", &self.snapshot().len())
            .finish_non_exhaustive()
    }
}

impl<C> ClaimStore<C> {
    /// Creates an empty store for `world`.
    pub fn new(world: WorldId) -> Self {
        Self::with_config(world, IndexConfig::default())
    }

    /// Creates an empty store whose indexes use `config`.
    pub fn with_config(world: WorldId, config: IndexConfig) -> Self {
        Self {
            world,
            config,
            current: Arc::new(RwLock::new(Arc::new(SpatialIndex::with_config(config)))),
        }
    }

    /// World this store belongs to.
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    /// The index as currently published.
    ///
    /// Briefly takes the slot's read lock to clone the pointer; the returned
    /// snapshot is queried without any lock.
    pub fn snapshot(&self) -> Arc<ClaimIndex<C>> {
        read_slot(&self.current)
    }

    /// Handle that can be sent to reader threads.
    pub fn snapshots(&self) -> ClaimSnapshots<C> {
        ClaimSnapshots {
            current: Arc::clone(&self.current),
        }
    }

    /// Number of indexed claims.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the world has no claims.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn publish(&mut self, index: ClaimIndex<C>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
    }
}

impl<C: Claim> ClaimStore<C> {
    /// Indexes `claim` under its current geometry, replacing any claim with equal geometry.
    pub fn add(&mut self, claim: C) {
        let next = self.snapshot().insert(claim.claim_box(), claim);
        self.publish(next);
    }

    /// Removes the entry keyed by `claim`'s current geometry.
    ///
    /// Does nothing if the claim's geometry changed since it was added.
    pub fn remove(&mut self, claim: &C) {
        let next = self.snapshot().remove(&claim.claim_box());
        self.publish(next);
    }

    /// Claims containing `pos`.
    pub fn claims_at(&self, pos: BlockPos) -> Vec<C> {
        self.snapshot().query_point(pos).cloned().collect()
    }

    /// Claims whose region intersects `region`, with their geometry.
    pub fn claims_in(&self, region: &Aabb3) -> Vec<(ClaimBox, C)> {
        self.snapshot()
            .query_region(region)
            .map(|(k, c)| (*k, c.clone()))
            .collect()
    }

    /// True unless some claim containing `pos` is rejected by `allows`.
    ///
    /// `allows` carries the ownership and trust policy of the caller.
    pub fn can_modify(&self, pos: BlockPos, allows: impl FnMut(&C) -> bool) -> bool {
        self.snapshot().query_point(pos).all(allows)
    }

    /// True if `a` and `b` are inside exactly the same claims (or both in none).
    pub fn has_matching_claims(&self, a: BlockPos, b: BlockPos) -> bool {
        let snapshot = self.snapshot();
        let at_a: HashSet<ClaimBox> = snapshot.query_point_entries(a).map(|(k, _)| *k).collect();
        let at_b: HashSet<ClaimBox> = snapshot.query_point_entries(b).map(|(k, _)| *k).collect();
        at_a == at_b
    }

    /// Replaces every claim with those stored in `view`.
    ///
    /// Records are read with the layout named by the view's `Version` field.
    /// Records without usable geometry or claim data are dropped. Each loaded
    /// claim is bound to this world, refreshed against `world` and has its
    /// updates enabled before it is indexed. The new index is published once.
    pub fn load<R: ReadView, W: World + ?Sized>(&mut self, view: &R, world: &W) {
        let version = SchemaVersion::read(view);
        let mut index = SpatialIndex::with_config(self.config);
        let mut dropped = 0_usize;
        for (i, record) in view.list(codec::CLAIMS).iter().enumerate() {
            let parsed = match version {
                SchemaVersion::Legacy => read_legacy_record::<C, R>(record),
                SchemaVersion::Current => read_current_record::<C, R>(record),
            };
            let mut claim = match parsed {
                Ok(claim) => claim,
                Err(reason) => {
                    warn!("dropping claim record {i} in {}: {reason}", self.world);
                    dropped += 1;
                    continue;
                }
            };
            claim.bind_world(&self.world);
            claim.refresh_from_world(world);
            claim.enable_updates();
            index = index.insert(claim.claim_box(), claim);
        }
        info!(
            "loaded {} claims in {} ({version:?} layout, {dropped} dropped)",
            index.len(),
            self.world
        );
        self.publish(index);
    }

    /// Writes every claim to `view` in the latest layout.
    ///
    /// Records are appended to the view's `Claims` list, so `view` should be empty.
    pub fn save<W: WriteView>(&self, view: &mut W) {
        let snapshot = self.snapshot();
        view.put_int(codec::VERSION, SchemaVersion::LATEST.tag());
        for claim in snapshot.values() {
            let record = view.push_list(codec::CLAIMS);
            claim.write_data(record);
            write_claim_box(record, &claim.claim_box());
        }
        debug!("saved {} claims in {}", snapshot.len(), self.world);
    }

    /// Loads claims from a file written by [`ClaimStore::save_to`].
    ///
    /// # Errors
    /// Returns [`StorageError`] if the file cannot be read or parsed; the
    /// current claims are kept in that case.
    pub fn load_from<P: AsRef<Path>, W: World + ?Sized>(&mut self, path: P, world: &W) -> Result<(), StorageError> {
        let view = Compound::read_from(path)?;
        self.load(&view, world);
        Ok(())
    }

    /// Saves every claim to a file.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the file cannot be written.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let mut view = Compound::new();
        self.save(&mut view);
        view.write_to(path)
    }
}

/// Version 0: geometry in a `Box` child, claim data in an `Info` child.
fn read_legacy_record<C: Claim, R: ReadView>(record: &R) -> Result<C, RecordError> {
    let claim_box = record
        .child(codec::LEGACY_BOX)
        .and_then(|b| read_claim_box(b))
        .ok_or(RecordError::NoGeometry)?;
    let info = record
        .child(codec::LEGACY_INFO)
        .ok_or(StorageError::MissingField(codec::LEGACY_INFO))?;
    Ok(C::read_data(info, claim_box, SchemaVersion::Legacy)?)
}

/// Version 1 and later: geometry and claim data share one record.
fn read_current_record<C: Claim, R: ReadView>(record: &R) -> Result<C, RecordError> {
    let claim_box = read_claim_box(record).ok_or(RecordError::NoGeometry)?;
    Ok(C::read_data(record, claim_box, SchemaVersion::Current)?)
}

impl<C> fmt::Debug for ClaimStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimStore")
            .field("world", &self.world)
            .field("len", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
