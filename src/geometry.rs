//! Claim geometry: block positions, half-open 3D boxes and the claim box itself.
//!
//! A [`ClaimBox`] is described by an origin block and two half-extents. Its
//! bounding box is derived, never stored independently:
//!
//! - `lower = origin - (radius, radius_y, radius)`
//! - `upper = origin + (radius + 1, radius_y + 1, radius + 1)`, or without the
//!   `+ 1` when `no_shift` is set.
//!
//! Boxes are half-open (`lower <= p < upper`), so a shifted claim of radius `r`
//! covers `2r + 1` blocks per horizontal axis, centred on its origin.

use std::fmt;

use serde::{Deserialize, Serialize};

const BITS_XZ: u32 = 26;
const BITS_Y: u32 = 12;
const MASK_XZ: i64 = (1_i64 << BITS_XZ) - 1;
const MASK_Y: i64 = (1_i64 << BITS_Y) - 1;
const SHIFT_Z: u32 = BITS_Y;
const SHIFT_X: u32 = BITS_Y + BITS_XZ;

/// Integer block position in a voxel world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// East/west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North/south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// The world origin `(0, 0, 0)`.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Creates a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position moved by the given deltas, clamped to the `i32` range.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy), self.z.saturating_add(dz))
    }

    /// Returns this position moved by the given deltas, or `None` if a coordinate overflows.
    pub const fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        match (self.x.checked_add(dx), self.y.checked_add(dy), self.z.checked_add(dz)) {
            (Some(x), Some(y), Some(z)) => Some(Self::new(x, y, z)),
            _ => None,
        }
    }

    /// Packs the position into 64 bits: X in the top 26 bits, Z in the next 26,
    /// Y in the low 12.
    ///
    /// Coordinates outside the packable range (`±2^25` horizontally, `±2^11`
    /// vertically) wrap, matching the storage format of the world.
    pub const fn as_long(self) -> i64 {
        ((self.x as i64 & MASK_XZ) << SHIFT_X) | ((self.z as i64 & MASK_XZ) << SHIFT_Z) | (self.y as i64 & MASK_Y)
    }

    /// Unpacks a position written by [`BlockPos::as_long`].
    pub const fn from_long(packed: i64) -> Self {
        let x = packed >> SHIFT_X;
        let y = (packed << (64 - BITS_Y)) >> (64 - BITS_Y);
        let z = (packed << (64 - SHIFT_X)) >> (64 - BITS_XZ);
        Self::new(x as i32, y as i32, z as i32)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Half-open axis-aligned box over block coordinates: `lower <= p < upper`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Aabb3 {
    /// Inclusive lower corner.
    pub lower: BlockPos,
    /// Exclusive upper corner.
    pub upper: BlockPos,
}

impl Aabb3 {
    /// Creates a box from its corners.
    pub const fn new(lower: BlockPos, upper: BlockPos) -> Self {
        Self { lower, upper }
    }

    /// The unit box occupied by a single block.
    pub const fn block(pos: BlockPos) -> Self {
        Self::new(pos, pos.offset(1, 1, 1))
    }

    /// Returns true if the point lies inside the box.
    #[inline]
    pub const fn contains_point(&self, p: BlockPos) -> bool {
        self.lower.x <= p.x
            && p.x < self.upper.x
            && self.lower.y <= p.y
            && p.y < self.upper.y
            && self.lower.z <= p.z
            && p.z < self.upper.z
    }

    /// Returns true if `other` lies entirely inside this box.
    #[inline]
    pub const fn contains(&self, other: &Self) -> bool {
        self.lower.x <= other.lower.x
            && other.upper.x <= self.upper.x
            && self.lower.y <= other.lower.y
            && other.upper.y <= self.upper.y
            && self.lower.z <= other.lower.z
            && other.upper.z <= self.upper.z
    }

    /// Returns true if the interiors of the two boxes overlap.
    #[inline]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.lower.x < other.upper.x
            && other.lower.x < self.upper.x
            && self.lower.y < other.upper.y
            && other.lower.y < self.upper.y
            && self.lower.z < other.upper.z
            && other.lower.z < self.upper.z
    }

    /// Smallest box enclosing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            BlockPos::new(
                self.lower.x.min(other.lower.x),
                self.lower.y.min(other.lower.y),
                self.lower.z.min(other.lower.z),
            ),
            BlockPos::new(
                self.upper.x.max(other.upper.x),
                self.upper.y.max(other.upper.y),
                self.upper.z.max(other.upper.z),
            ),
        )
    }

    /// Volume of the overlap of the two boxes, zero if they do not intersect.
    pub fn overlap_volume(&self, other: &Self) -> i128 {
        let dx = extent(self.lower.x.max(other.lower.x), self.upper.x.min(other.upper.x));
        let dy = extent(self.lower.y.max(other.lower.y), self.upper.y.min(other.upper.y));
        let dz = extent(self.lower.z.max(other.lower.z), self.upper.z.min(other.upper.z));
        i128::from(dx) * i128::from(dy) * i128::from(dz)
    }

    /// Number of blocks covered by the box.
    ///
    /// Each extent is below `2^32`, so the product always fits in `i128`.
    pub fn volume(&self) -> i128 {
        i128::from(extent(self.lower.x, self.upper.x))
            * i128::from(extent(self.lower.y, self.upper.y))
            * i128::from(extent(self.lower.z, self.upper.z))
    }

    /// Sum of the edge lengths along each axis (half the perimeter).
    pub fn margin(&self) -> i64 {
        extent(self.lower.x, self.upper.x) + extent(self.lower.y, self.upper.y) + extent(self.lower.z, self.upper.z)
    }

    /// Lower and upper bound along `axis` (0 = x, 1 = y, 2 = z).
    pub(crate) const fn axis_bounds(&self, axis: usize) -> (i32, i32) {
        match axis {
            0 => (self.lower.x, self.upper.x),
            1 => (self.lower.y, self.upper.y),
            _ => (self.lower.z, self.upper.z),
        }
    }
}

#[inline]
fn extent(lo: i32, hi: i32) -> i64 {
    (i64::from(hi) - i64::from(lo)).max(0)
}

/// Anything the spatial index can key on.
pub trait Bounded {
    /// The box the key occupies.
    fn aabb(&self) -> Aabb3;
}

impl Bounded for Aabb3 {
    fn aabb(&self) -> Aabb3 {
        *self
    }
}

/// Region of a claim: an origin block plus horizontal and vertical half-extents.
///
/// A `ClaimBox` always has positive radii. Degenerate geometry has no value of
/// this type; code that may lack geometry holds an `Option<ClaimBox>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClaimBox {
    origin: BlockPos,
    radius: i32,
    radius_y: i32,
    no_shift: bool,
    aabb: Aabb3,
}

impl ClaimBox {
    /// Builds a claim box, or `None` when either radius is not positive or a
    /// corner of the box falls outside the `i32` range.
    ///
    /// # Example
    /// ```
    /// use claimbox::geometry::{BlockPos, ClaimBox};
    /// let claim_box = ClaimBox::new(BlockPos::new(10, 64, 10), 5, 3, false).unwrap();
    /// assert_eq!(claim_box.aabb().lower, BlockPos::new(5, 61, 5));
    /// assert_eq!(claim_box.aabb().upper, BlockPos::new(16, 68, 16));
    /// assert!(ClaimBox::new(BlockPos::ORIGIN, 0, 4, false).is_none());
    /// ```
    pub fn new(origin: BlockPos, radius: i32, radius_y: i32, no_shift: bool) -> Option<Self> {
        if radius <= 0 || radius_y <= 0 {
            return None;
        }
        let shift = if no_shift { 0 } else { 1 };
        let reach = radius.checked_add(shift)?;
        let reach_y = radius_y.checked_add(shift)?;
        let lower = origin.checked_offset(-radius, -radius_y, -radius)?;
        let upper = origin.checked_offset(reach, reach_y, reach)?;
        Some(Self {
            origin,
            radius,
            radius_y,
            no_shift,
            aabb: Aabb3::new(lower, upper),
        })
    }

    /// Shifted claim box (`no_shift = false`), the usual shape of a placed claim.
    pub fn centered(origin: BlockPos, radius: i32, radius_y: i32) -> Option<Self> {
        Self::new(origin, radius, radius_y, false)
    }

    /// Origin block of the claim.
    pub const fn origin(&self) -> BlockPos {
        self.origin
    }

    /// Horizontal half-extent.
    pub const fn radius(&self) -> i32 {
        self.radius
    }

    /// Vertical half-extent.
    pub const fn radius_y(&self) -> i32 {
        self.radius_y
    }

    /// Whether the upper corner is left unshifted.
    pub const fn no_shift(&self) -> bool {
        self.no_shift
    }

    /// Half-extent along X.
    pub const fn x(&self) -> i32 {
        self.radius
    }

    /// Half-extent along Y.
    pub const fn y(&self) -> i32 {
        self.radius_y
    }

    /// Half-extent along Z.
    pub const fn z(&self) -> i32 {
        self.radius
    }

    /// The derived bounding box.
    pub const fn aabb(&self) -> Aabb3 {
        self.aabb
    }

    /// Returns true if the block lies inside the claim.
    pub const fn contains(&self, pos: BlockPos) -> bool {
        self.aabb.contains_point(pos)
    }
}

impl Bounded for ClaimBox {
    fn aabb(&self) -> Aabb3 {
        self.aabb
    }
}

impl fmt::Display for ClaimBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "claim at {} r={} h={}{}",
            self.origin,
            self.radius,
            self.radius_y,
            if self.no_shift { " (no shift)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(origin: BlockPos, radius: i32, radius_y: i32, no_shift: bool) -> ClaimBox {
        ClaimBox::new(origin, radius, radius_y, no_shift).expect("valid radii")
    }

    #[test]
    fn test_shifted_box_corners() {
        let b = claim(BlockPos::new(10, 64, 10), 5, 3, false);
        assert_eq!(b.aabb().lower, BlockPos::new(5, 61, 5));
        assert_eq!(b.aabb().upper, BlockPos::new(16, 68, 16));
    }

    #[test]
    fn test_no_shift_box_corners() {
        let b = claim(BlockPos::new(10, 64, 10), 5, 3, true);
        assert_eq!(b.aabb().lower, BlockPos::new(5, 61, 5));
        assert_eq!(b.aabb().upper, BlockPos::new(15, 67, 15));
    }

    #[test]
    fn test_extent_formula() {
        for &(radius, radius_y) in &[(1, 1), (2, 7), (16, 3), (100, 255)] {
            for &no_shift in &[false, true] {
                let b = claim(BlockPos::new(-7, 12, 300), radius, radius_y, no_shift);
                let a = b.aabb();
                let shift = if no_shift { 0 } else { 1 };
                assert_eq!(a.upper.x - a.lower.x, 2 * radius + shift, "x extent");
                assert_eq!(a.upper.z - a.lower.z, 2 * radius + shift, "z extent");
                assert_eq!(a.upper.y - a.lower.y, 2 * radius_y + shift, "y extent");
            }
        }
    }

    #[test]
    fn test_degenerate_radii_have_no_box() {
        assert!(ClaimBox::new(BlockPos::ORIGIN, 0, 4, false).is_none());
        assert!(ClaimBox::new(BlockPos::ORIGIN, 4, 0, false).is_none());
        assert!(ClaimBox::new(BlockPos::new(1, 2, 3), -1, 5, true).is_none());
    }

    #[test]
    fn test_corner_outside_i32_has_no_box() {
        assert!(ClaimBox::new(BlockPos::new(10, 64, 10), i32::MAX, 5, false).is_none());
        assert!(ClaimBox::new(BlockPos::new(10, 64, 10), 5, i32::MAX, true).is_none());
        assert!(ClaimBox::new(BlockPos::new(i32::MAX - 3, 0, 0), 3, 3, false).is_none());
        assert!(ClaimBox::new(BlockPos::new(i32::MIN + 2, 0, 0), 3, 3, true).is_none());
        // The last representable corner still builds.
        let edge = claim(BlockPos::new(i32::MAX - 4, 0, i32::MIN + 3), 3, 3, false);
        assert_eq!(edge.aabb().upper.x, i32::MAX);
        assert_eq!(edge.aabb().lower.z, i32::MIN);
    }

    #[test]
    fn test_offset_saturates_and_checked_offset_fails() {
        let p = BlockPos::new(i32::MAX - 1, 0, i32::MIN + 1);
        assert_eq!(p.offset(5, 0, -5), BlockPos::new(i32::MAX, 0, i32::MIN));
        assert_eq!(p.checked_offset(5, 0, 0), None);
        assert_eq!(p.checked_offset(1, 2, -1), Some(BlockPos::new(i32::MAX, 2, i32::MIN)));
    }

    #[test]
    fn test_volume_of_whole_coordinate_space() {
        let everything = Aabb3::new(BlockPos::new(i32::MIN, i32::MIN, i32::MIN), BlockPos::new(i32::MAX, i32::MAX, i32::MAX));
        let side = i128::from(u32::MAX);
        assert_eq!(everything.volume(), side * side * side);
        assert_eq!(everything.overlap_volume(&everything), everything.volume());
        assert_eq!(everything.margin(), 3 * i64::from(u32::MAX));
    }

    #[test]
    fn test_no_shift_is_part_of_identity() {
        let a = claim(BlockPos::ORIGIN, 3, 3, false);
        let b = claim(BlockPos::ORIGIN, 3, 3, true);
        assert_ne!(a, b);
        assert_eq!(a.aabb().lower, b.aabb().lower);
    }

    #[test]
    fn test_contains_is_half_open() {
        let b = claim(BlockPos::ORIGIN, 2, 2, false);
        assert!(b.contains(BlockPos::new(-2, -2, -2)));
        assert!(b.contains(BlockPos::new(2, 2, 2)));
        assert!(!b.contains(BlockPos::new(3, 0, 0)));
        assert!(!b.contains(BlockPos::new(0, -3, 0)));
    }

    #[test]
    fn test_pack_round_trip() {
        for pos in [
            BlockPos::ORIGIN,
            BlockPos::new(10, 64, 10),
            BlockPos::new(-1, -1, -1),
            BlockPos::new(-30_000_000, -2048, 29_999_999),
            BlockPos::new(33_554_431, 2047, -33_554_432),
        ] {
            assert_eq!(BlockPos::from_long(pos.as_long()), pos, "round trip of {pos}");
        }
    }

    #[test]
    fn test_pack_layout() {
        assert_eq!(BlockPos::new(0, 1, 0).as_long(), 1);
        assert_eq!(BlockPos::new(0, 0, 1).as_long(), 1 << 12);
        assert_eq!(BlockPos::new(1, 0, 0).as_long(), 1 << 38);
        assert_eq!(BlockPos::new(-1, -1, -1).as_long(), -1);
    }

    #[test]
    fn test_overlap_and_union() {
        let a = Aabb3::new(BlockPos::new(0, 0, 0), BlockPos::new(4, 4, 4));
        let b = Aabb3::new(BlockPos::new(2, 2, 2), BlockPos::new(6, 6, 6));
        let c = Aabb3::new(BlockPos::new(4, 0, 0), BlockPos::new(8, 4, 4));
        assert_eq!(a.overlap_volume(&b), 8);
        assert_eq!(a.overlap_volume(&c), 0);
        assert!(!a.intersects(&c), "touching faces do not intersect");
        assert_eq!(a.union(&b), Aabb3::new(BlockPos::ORIGIN, BlockPos::new(6, 6, 6)));
        assert_eq!(a.volume(), 64);
        assert_eq!(a.margin(), 12);
    }
}
