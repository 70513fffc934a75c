//! Seams to the claim and world types owned by the host game.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::SchemaVersion;
use crate::geometry::ClaimBox;
use crate::storage::{ReadView, StorageError, WriteView};

/// Registry key of a world, e.g. `"overworld"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    /// Wraps a world key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The world key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Live world state handed to claims while they are loaded.
pub trait World {
    /// Identity of the world.
    fn id(&self) -> &WorldId;
}

/// A protected region owned by the host game.
///
/// The store keys each claim by [`Claim::claim_box`]. Callers must remove a
/// claim from its store before changing its geometry and re-add it afterwards;
/// otherwise the old entry stays indexed and a later remove finds nothing.
pub trait Claim: Clone {
    /// Geometry the claim currently holds.
    fn claim_box(&self) -> ClaimBox;

    /// Decodes claim data stored with `version`'s layout.
    ///
    /// `claim_box` has already been decoded from the same record (current
    /// layout) or its `Box` sibling (legacy layout).
    ///
    /// # Errors
    /// Returns [`StorageError`] when required claim data is missing or invalid;
    /// the record is then skipped.
    fn read_data<R: ReadView>(view: &R, claim_box: ClaimBox, version: SchemaVersion) -> Result<Self, StorageError>;

    /// Encodes claim data. Must not write the geometry field names in
    /// [`crate::codec::GEOMETRY_FIELDS`].
    fn write_data<W: WriteView>(&self, view: &mut W);

    /// Records which world the claim belongs to.
    fn bind_world(&mut self, world: &WorldId);

    /// Recomputes fields derived from the live world, such as occupied chunk counts.
    fn refresh_from_world<W: World + ?Sized>(&mut self, _world: &W) {}

    /// Allows the claim to emit change notifications from now on.
    fn enable_updates(&mut self) {}
}
