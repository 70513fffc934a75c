//! Versioned record layout for claim geometry and claim lists.
//!
//! | Field       | Type                 | Default if absent |
//! |-------------|----------------------|-------------------|
//! | `OriginPos` | packed [`BlockPos`]  | origin            |
//! | `Radius`    | int                  | 0                 |
//! | `Height`    | int                  | value of `Radius` |
//! | `NoShift`   | bool                 | false             |
//!
//! A record with `Radius <= 0` or `Height <= 0` decodes to no geometry. All
//! four fields are always written.

use crate::geometry::{BlockPos, ClaimBox};
use crate::storage::{ReadView, WriteView};

/// Packed origin block.
pub const ORIGIN_POS: &str = "OriginPos";
/// Horizontal half-extent.
pub const RADIUS: &str = "Radius";
/// Vertical half-extent.
pub const HEIGHT: &str = "Height";
/// Unshifted upper corner flag.
pub const NO_SHIFT: &str = "NoShift";

/// Schema version field of a claim list.
pub const VERSION: &str = "Version";
/// Ordered list of claim records.
pub const CLAIMS: &str = "Claims";
/// Geometry child of a legacy claim record.
pub const LEGACY_BOX: &str = "Box";
/// Claim data child of a legacy claim record.
pub const LEGACY_INFO: &str = "Info";

/// Field names a current-layout claim record reserves for its geometry.
pub const GEOMETRY_FIELDS: [&str; 4] = [ORIGIN_POS, RADIUS, HEIGHT, NO_SHIFT];

/// Layout of the records in a claim list, selected by its `Version` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// Version 0: each record holds a `Box` child and an `Info` child.
    Legacy,
    /// Version 1: geometry fields sit next to the claim data in one record.
    Current,
}

impl SchemaVersion {
    /// The version every save writes.
    pub const LATEST: Self = Self::Current;

    /// Maps a stored version number to a layout.
    ///
    /// Unknown numbers are read with the latest known layout.
    ///
    /// # Example
    /// ```
    /// use claimbox::codec::SchemaVersion;
    /// assert_eq!(SchemaVersion::from_tag(0), SchemaVersion::Legacy);
    /// assert_eq!(SchemaVersion::from_tag(1), SchemaVersion::Current);
    /// assert_eq!(SchemaVersion::from_tag(7), SchemaVersion::Current);
    /// ```
    pub const fn from_tag(tag: i32) -> Self {
        match tag {
            0 => Self::Legacy,
            _ => Self::LATEST,
        }
    }

    /// Version number written for this layout.
    pub const fn tag(self) -> i32 {
        match self {
            Self::Legacy => 0,
            Self::Current => 1,
        }
    }

    /// Reads the `Version` field of a claim list, defaulting to legacy.
    pub fn read<R: ReadView>(view: &R) -> Self {
        Self::from_tag(view.get_int(VERSION).unwrap_or(0))
    }
}

/// Decodes geometry from a record, `None` when the radii are not positive.
///
/// # Example
/// ```
/// use claimbox::codec::{read_claim_box, write_claim_box};
/// use claimbox::geometry::{BlockPos, ClaimBox};
/// use claimbox::storage::{Compound, WriteView};
///
/// let claim_box = ClaimBox::centered(BlockPos::new(10, 64, 10), 5, 3).unwrap();
/// let mut record = Compound::new();
/// write_claim_box(&mut record, &claim_box);
/// assert_eq!(read_claim_box(&record), Some(claim_box));
///
/// record.put_int("Radius", 0);
/// assert_eq!(read_claim_box(&record), None);
/// ```
pub fn read_claim_box<R: ReadView>(view: &R) -> Option<ClaimBox> {
    let origin = BlockPos::from_long(view.get_long(ORIGIN_POS).unwrap_or(0));
    let radius = view.get_int(RADIUS).unwrap_or(0);
    let height = view.get_int(HEIGHT).unwrap_or(radius);
    let no_shift = view.get_bool(NO_SHIFT).unwrap_or(false);
    ClaimBox::new(origin, radius, height, no_shift)
}

/// Encodes geometry into a record, writing every field.
pub fn write_claim_box<W: WriteView>(view: &mut W, claim_box: &ClaimBox) {
    view.put_long(ORIGIN_POS, claim_box.origin().as_long());
    view.put_int(RADIUS, claim_box.radius());
    view.put_int(HEIGHT, claim_box.radius_y());
    view.put_bool(NO_SHIFT, claim_box.no_shift());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Compound;

    fn record(origin: BlockPos, radius: Option<i32>, height: Option<i32>, no_shift: Option<bool>) -> Compound {
        let mut view = Compound::new();
        view.put_long(ORIGIN_POS, origin.as_long());
        if let Some(r) = radius {
            view.put_int(RADIUS, r);
        }
        if let Some(h) = height {
            view.put_int(HEIGHT, h);
        }
        if let Some(n) = no_shift {
            view.put_bool(NO_SHIFT, n);
        }
        view
    }

    #[test]
    fn test_round_trip() {
        for &(radius, radius_y, no_shift) in &[(1, 1, false), (5, 3, true), (64, 320, false)] {
            let b = ClaimBox::new(BlockPos::new(-120, 70, 4_000), radius, radius_y, no_shift).expect("valid");
            let mut view = Compound::new();
            write_claim_box(&mut view, &b);
            assert_eq!(read_claim_box(&view), Some(b));
        }
    }

    #[test]
    fn test_writes_every_field() {
        let b = ClaimBox::new(BlockPos::ORIGIN, 3, 3, false).expect("valid");
        let mut view = Compound::new();
        write_claim_box(&mut view, &b);
        for field in GEOMETRY_FIELDS {
            assert!(view.get(field).is_some(), "{field} missing");
        }
        assert_eq!(view.get_bool(NO_SHIFT), Some(false));
    }

    #[test]
    fn test_zero_radius_dominates() {
        let view = record(BlockPos::ORIGIN, Some(0), Some(4), Some(false));
        assert_eq!(read_claim_box(&view), None);
        let view = record(BlockPos::new(9, 9, 9), Some(0), Some(100), Some(true));
        assert_eq!(read_claim_box(&view), None);
    }

    #[test]
    fn test_zero_height_is_empty() {
        let view = record(BlockPos::ORIGIN, Some(4), Some(0), None);
        assert_eq!(read_claim_box(&view), None);
    }

    #[test]
    fn test_height_defaults_to_radius() {
        let view = record(BlockPos::new(1, 2, 3), Some(6), None, None);
        let b = read_claim_box(&view).expect("valid geometry");
        assert_eq!(b.radius_y(), 6);
        assert!(!b.no_shift());
    }

    #[test]
    fn test_oversized_radii_are_empty() {
        let view = record(BlockPos::new(10, 64, 10), Some(i32::MAX), Some(5), None);
        assert_eq!(read_claim_box(&view), None);
        let view = record(BlockPos::new(10, 64, 10), Some(5), Some(i32::MAX), Some(false));
        assert_eq!(read_claim_box(&view), None);
        // Height defaults to the radius, so it overflows too.
        let view = record(BlockPos::new(-10, 0, 0), Some(i32::MAX - 5), None, Some(true));
        assert_eq!(read_claim_box(&view), None);
    }

    #[test]
    fn test_world_edge_origin_round_trip() {
        let edge = BlockPos::new(-33_554_432, -2048, 33_554_431);
        let b = ClaimBox::new(edge, 1_000_000, 2_000, false).expect("fits in i32");
        let mut view = Compound::new();
        write_claim_box(&mut view, &b);
        assert!(view.get_long(ORIGIN_POS).is_some_and(|packed| packed < 0));
        assert_eq!(read_claim_box(&view), Some(b));
    }

    #[test]
    fn test_missing_radius_is_empty() {
        assert_eq!(read_claim_box(&Compound::new()), None);
    }

    #[test]
    fn test_version_dispatch() {
        let mut view = Compound::new();
        assert_eq!(SchemaVersion::read(&view), SchemaVersion::Legacy);
        view.put_int(VERSION, 1);
        assert_eq!(SchemaVersion::read(&view), SchemaVersion::Current);
        view.put_int(VERSION, -4);
        assert_eq!(SchemaVersion::read(&view), SchemaVersion::Current);
        assert_eq!(SchemaVersion::LATEST.tag(), 1);
    }
}
