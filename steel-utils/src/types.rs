// Wrapper types making it harder to accidentaly use the wrong underlying type.
//
// Positions have an unpacked struct form and a packed `i64` key form. The
// packed form is what hot paths hash, order and offset; the structs are for
// callers that want named fields.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// Packed key that never names a real block or section.
///
/// Both packings place it far outside the world border, so it is used by the
/// propagators as the implicit "source" node.
pub const SELF_SOURCE: i64 = i64::MAX;

/// Adds `delta` to a bit-sliced field of `packed` without touching the other
/// fields. Carries out of the field are dropped, so the field wraps the same
/// way an unpack/add/repack would.
#[inline]
const fn add_to_field(packed: i64, delta: i32, offset: u32, mask: i64) -> i64 {
    let field = mask << offset;
    let step = (((delta as i64) & mask) as u64) << offset;
    let sum = (packed as u64).wrapping_add(step) as i64;
    (packed & !field) | (sum & field)
}

/// Packed block position helpers.
///
/// Layout: X is 26 bits at offset 38, Z is 26 bits at offset 12, Y is 12 bits at offset 0.
pub mod block_pos {
    use super::add_to_field;
    use crate::direction::Direction;

    const PACKED_X_LENGTH: u32 = 26;
    const PACKED_Z_LENGTH: u32 = 26;
    const PACKED_Y_LENGTH: u32 = 64 - PACKED_X_LENGTH - PACKED_Z_LENGTH;
    const PACKED_X_MASK: i64 = (1 << PACKED_X_LENGTH) - 1;
    const PACKED_Y_MASK: i64 = (1 << PACKED_Y_LENGTH) - 1;
    const PACKED_Z_MASK: i64 = (1 << PACKED_Z_LENGTH) - 1;
    const Y_OFFSET: u32 = 0;
    const Z_OFFSET: u32 = PACKED_Y_LENGTH;
    const X_OFFSET: u32 = PACKED_Y_LENGTH + PACKED_Z_LENGTH;

    /// Lowest block Y a packed key can hold.
    pub const MIN_BLOCK_Y: i32 = -(1 << (PACKED_Y_LENGTH - 1));
    /// Highest block Y a packed key can hold.
    pub const MAX_BLOCK_Y: i32 = (1 << (PACKED_Y_LENGTH - 1)) - 1;

    /// Packs block coordinates into a key.
    #[must_use]
    #[inline]
    pub const fn pack(x: i32, y: i32, z: i32) -> i64 {
        (((x as i64) & PACKED_X_MASK) << X_OFFSET)
            | (((y as i64) & PACKED_Y_MASK) << Y_OFFSET)
            | (((z as i64) & PACKED_Z_MASK) << Z_OFFSET)
    }

    /// The X coordinate of a packed block position.
    #[must_use]
    #[inline]
    pub const fn x(packed: i64) -> i32 {
        ((packed << (64 - X_OFFSET - PACKED_X_LENGTH)) >> (64 - PACKED_X_LENGTH)) as i32
    }

    /// The Y coordinate of a packed block position.
    #[must_use]
    #[inline]
    pub const fn y(packed: i64) -> i32 {
        ((packed << (64 - PACKED_Y_LENGTH)) >> (64 - PACKED_Y_LENGTH)) as i32
    }

    /// The Z coordinate of a packed block position.
    #[must_use]
    #[inline]
    pub const fn z(packed: i64) -> i32 {
        ((packed << (64 - Z_OFFSET - PACKED_Z_LENGTH)) >> (64 - PACKED_Z_LENGTH)) as i32
    }

    /// Offsets a packed block position per axis, operating on the packed fields.
    #[must_use]
    #[inline]
    pub const fn offset(packed: i64, dx: i32, dy: i32, dz: i32) -> i64 {
        let packed = add_to_field(packed, dx, X_OFFSET, PACKED_X_MASK);
        let packed = add_to_field(packed, dy, Y_OFFSET, PACKED_Y_MASK);
        add_to_field(packed, dz, Z_OFFSET, PACKED_Z_MASK)
    }

    /// Offsets a packed block position one step in `dir`.
    #[must_use]
    #[inline]
    pub const fn offset_dir(packed: i64, dir: Direction) -> i64 {
        let (dx, dy, dz) = dir.offset();
        offset(packed, dx, dy, dz)
    }

    /// Rounds the Y coordinate down to the bottom of its section.
    #[must_use]
    #[inline]
    pub const fn flat_index(packed: i64) -> i64 {
        packed & !15
    }
}

/// Packed section position helpers.
///
/// Layout: X is 22 bits at offset 42, Z is 22 bits at offset 20, Y is 20 bits at offset 0.
/// The wide Y field leaves room for sections far outside any build height.
pub mod section_pos {
    use super::{add_to_field, block_pos};
    use crate::direction::Direction;

    const PACKED_X_LENGTH: u32 = 22;
    const PACKED_Y_LENGTH: u32 = 20;
    const PACKED_Z_LENGTH: u32 = 22;
    const PACKED_X_MASK: i64 = (1 << PACKED_X_LENGTH) - 1;
    const PACKED_Y_MASK: i64 = (1 << PACKED_Y_LENGTH) - 1;
    const PACKED_Z_MASK: i64 = (1 << PACKED_Z_LENGTH) - 1;
    const Y_OFFSET: u32 = 0;
    const Z_OFFSET: u32 = 20;
    const X_OFFSET: u32 = 42;

    /// Packs section coordinates into a key.
    #[must_use]
    #[inline]
    pub const fn pack(x: i32, y: i32, z: i32) -> i64 {
        (((x as i64) & PACKED_X_MASK) << X_OFFSET)
            | (((y as i64) & PACKED_Y_MASK) << Y_OFFSET)
            | (((z as i64) & PACKED_Z_MASK) << Z_OFFSET)
    }

    /// The section X coordinate of a packed section position.
    #[must_use]
    #[inline]
    pub const fn x(packed: i64) -> i32 {
        ((packed << (64 - X_OFFSET - PACKED_X_LENGTH)) >> (64 - PACKED_X_LENGTH)) as i32
    }

    /// The section Y coordinate of a packed section position.
    #[must_use]
    #[inline]
    pub const fn y(packed: i64) -> i32 {
        ((packed << (64 - PACKED_Y_LENGTH)) >> (64 - PACKED_Y_LENGTH)) as i32
    }

    /// The section Z coordinate of a packed section position.
    #[must_use]
    #[inline]
    pub const fn z(packed: i64) -> i32 {
        ((packed << (64 - Z_OFFSET - PACKED_Z_LENGTH)) >> (64 - PACKED_Z_LENGTH)) as i32
    }

    /// Offsets a packed section position per axis, operating on the packed fields.
    #[must_use]
    #[inline]
    pub const fn offset(packed: i64, dx: i32, dy: i32, dz: i32) -> i64 {
        let packed = add_to_field(packed, dx, X_OFFSET, PACKED_X_MASK);
        let packed = add_to_field(packed, dy, Y_OFFSET, PACKED_Y_MASK);
        add_to_field(packed, dz, Z_OFFSET, PACKED_Z_MASK)
    }

    /// Offsets a packed section position one step in `dir`.
    #[must_use]
    #[inline]
    pub const fn offset_dir(packed: i64, dir: Direction) -> i64 {
        let (dx, dy, dz) = dir.offset();
        offset(packed, dx, dy, dz)
    }

    /// The section containing a packed block position.
    #[must_use]
    #[inline]
    pub const fn block_to_section(block: i64) -> i64 {
        pack(
            block_to_section_coord(block_pos::x(block)),
            block_to_section_coord(block_pos::y(block)),
            block_to_section_coord(block_pos::z(block)),
        )
    }

    /// Clears the Y field, giving the key of the section's column.
    #[must_use]
    #[inline]
    pub const fn zero_node(packed: i64) -> i64 {
        packed & !PACKED_Y_MASK
    }

    /// Block coordinate to section coordinate.
    #[must_use]
    #[inline]
    pub const fn block_to_section_coord(coord: i32) -> i32 {
        coord >> 4
    }

    /// Section coordinate to the coordinate of its first block.
    #[must_use]
    #[inline]
    pub const fn section_to_block_coord(coord: i32) -> i32 {
        coord << 4
    }

    /// Block coordinate relative to its section (0-15).
    #[must_use]
    #[inline]
    pub const fn section_relative(coord: i32) -> usize {
        (coord & 15) as usize
    }

    /// Calls `f` with every section that contains the block or one of its 26 neighbours.
    ///
    /// Sections may repeat.
    pub fn around_and_at_block_pos(block: i64, mut f: impl FnMut(i64)) {
        let x = block_pos::x(block);
        let y = block_pos::y(block);
        let z = block_pos::z(block);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    f(pack(
                        block_to_section_coord(x + dx),
                        block_to_section_coord(y + dy),
                        block_to_section_coord(z + dz),
                    ));
                }
            }
        }
    }
}

/// A block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// World X coordinate.
    pub x: i32,
    /// World Y coordinate.
    pub y: i32,
    /// World Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The packed key of this position.
    #[must_use]
    pub const fn as_long(self) -> i64 {
        block_pos::pack(self.x, self.y, self.z)
    }

    /// Unpacks a packed key.
    #[must_use]
    pub const fn from_long(packed: i64) -> Self {
        Self::new(block_pos::x(packed), block_pos::y(packed), block_pos::z(packed))
    }

    /// The neighbouring position in `dir`.
    #[must_use]
    pub const fn relative(self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The chunk column containing this position.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(
            section_pos::block_to_section_coord(self.x),
            section_pos::block_to_section_coord(self.z),
        )
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// A section position (a 16x16x16 cube of blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionPos {
    /// Section X coordinate.
    pub x: i32,
    /// Section Y coordinate.
    pub y: i32,
    /// Section Z coordinate.
    pub z: i32,
}

impl SectionPos {
    /// Creates a section position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The section at height `y` in a chunk column.
    #[must_use]
    pub const fn of_chunk(chunk: ChunkPos, y: i32) -> Self {
        Self::new(chunk.x, y, chunk.z)
    }

    /// The packed key of this section.
    #[must_use]
    pub const fn as_long(self) -> i64 {
        section_pos::pack(self.x, self.y, self.z)
    }

    /// Unpacks a packed key.
    #[must_use]
    pub const fn from_long(packed: i64) -> Self {
        Self::new(
            section_pos::x(packed),
            section_pos::y(packed),
            section_pos::z(packed),
        )
    }

    /// The chunk column this section belongs to.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    /// The first (lowest) block of this section.
    #[must_use]
    pub const fn origin(self) -> BlockPos {
        BlockPos::new(
            section_pos::section_to_block_coord(self.x),
            section_pos::section_to_block_coord(self.y),
            section_pos::section_to_block_coord(self.z),
        )
    }
}

impl Display for SectionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionPos[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// A chunk position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X coordinate.
    pub x: i32,
    /// Chunk Z coordinate.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a chunk position.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The packed section key of this column with Y cleared.
    #[must_use]
    pub const fn column_key(self) -> i64 {
        section_pos::zero_node(section_pos::pack(self.x, 0, self.z))
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_pack_round_trip_extremes() {
        for (x, y, z) in [
            (0, 0, 0),
            (-1, -1, -1),
            (30_000_000, block_pos::MAX_BLOCK_Y, -30_000_000),
            (-30_000_000, block_pos::MIN_BLOCK_Y, 30_000_000),
            (17, -64, -33),
        ] {
            let packed = block_pos::pack(x, y, z);
            assert_eq!(
                (block_pos::x(packed), block_pos::y(packed), block_pos::z(packed)),
                (x, y, z)
            );
        }
    }

    #[test]
    fn test_block_y_wraps_past_the_packed_range() {
        assert_eq!(block_pos::MIN_BLOCK_Y, -2048);
        assert_eq!(block_pos::MAX_BLOCK_Y, 2047);
        let top = block_pos::pack(0, block_pos::MAX_BLOCK_Y, 0);
        assert_eq!(block_pos::y(block_pos::offset(top, 0, 1, 0)), block_pos::MIN_BLOCK_Y);
    }

    #[test]
    fn test_block_offset_matches_repack() {
        let packed = block_pos::pack(15, -1, -16);
        let offsets = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (3, -17, 40),
        ];
        for (dx, dy, dz) in offsets {
            assert_eq!(
                block_pos::offset(packed, dx, dy, dz),
                block_pos::pack(15 + dx, -1 + dy, -16 + dz)
            );
        }
    }

    #[test]
    fn test_block_offset_dir() {
        let packed = BlockPos::new(0, 0, 0).as_long();
        assert_eq!(
            BlockPos::from_long(block_pos::offset_dir(packed, Direction::West)),
            BlockPos::new(-1, 0, 0)
        );
        assert_eq!(
            BlockPos::from_long(block_pos::offset_dir(packed, Direction::Down)),
            BlockPos::new(0, -1, 0)
        );
    }

    #[test]
    fn test_flat_index() {
        let packed = block_pos::pack(5, 37, 9);
        assert_eq!(BlockPos::from_long(block_pos::flat_index(packed)), BlockPos::new(5, 32, 9));
        let packed = block_pos::pack(5, -1, 9);
        assert_eq!(BlockPos::from_long(block_pos::flat_index(packed)), BlockPos::new(5, -16, 9));
    }

    #[test]
    fn test_section_pack_and_offset() {
        let packed = section_pos::pack(-3, -5, 7);
        assert_eq!(SectionPos::from_long(packed), SectionPos::new(-3, -5, 7));
        assert_eq!(
            section_pos::offset(packed, 1, -1, 0),
            section_pos::pack(-2, -6, 7)
        );
        assert_eq!(
            section_pos::offset_dir(packed, Direction::Up),
            section_pos::pack(-3, -4, 7)
        );
    }

    #[test]
    fn test_block_to_section() {
        let block = block_pos::pack(-1, 16, 31);
        assert_eq!(
            SectionPos::from_long(section_pos::block_to_section(block)),
            SectionPos::new(-1, 1, 1)
        );
    }

    #[test]
    fn test_zero_node_is_column_key() {
        let a = section_pos::pack(4, 10, -2);
        let b = section_pos::pack(4, -3, -2);
        assert_eq!(section_pos::zero_node(a), section_pos::zero_node(b));
        assert_eq!(section_pos::zero_node(a), ChunkPos::new(4, -2).column_key());
    }

    #[test]
    fn test_around_and_at_block_pos_corner() {
        let mut seen = Vec::new();
        section_pos::around_and_at_block_pos(block_pos::pack(0, 0, 0), |s| seen.push(s));
        assert_eq!(seen.len(), 27);
        assert!(seen.contains(&section_pos::pack(-1, -1, -1)));
        assert!(seen.contains(&section_pos::pack(0, 0, 0)));
        assert!(!seen.contains(&section_pos::pack(1, 0, 0)));
    }

    #[test]
    fn test_self_source_is_not_a_world_block() {
        let pos = BlockPos::from_long(SELF_SOURCE);
        assert!(pos.x.abs() > 30_000_000 || pos.z.abs() > 30_000_000);
    }
}
