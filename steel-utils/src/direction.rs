//! Cardinal directions used for voxel and section adjacency.

use serde::{Deserialize, Serialize};

/// Six cardinal directions.
///
/// The ordinal values (0-5) are stable and are used as indices into
/// per-face tables indexed by direction ordinal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Downward (-Y direction) - ordinal 0
    Down = 0,
    /// Upward (+Y direction) - ordinal 1
    Up = 1,
    /// North (-Z direction) - ordinal 2
    North = 2,
    /// South (+Z direction) - ordinal 3
    South = 3,
    /// West (-X direction) - ordinal 4
    West = 4,
    /// East (+X direction) - ordinal 5
    East = 5,
}

impl Direction {
    /// All six directions in array form for iteration.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// The four horizontal directions.
    pub const HORIZONTALS: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Up => Self::Down,
            Self::North => Self::South,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::East => Self::West,
        }
    }

    /// Gets the offset in the given direction.
    ///
    /// Returns (dx, dy, dz) for this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::Down => (0, -1, 0),
            Self::Up => (0, 1, 0),
            Self::North => (0, 0, -1),
            Self::South => (0, 0, 1),
            Self::West => (-1, 0, 0),
            Self::East => (1, 0, 0),
        }
    }

    /// Returns the direction whose unit offset is exactly `(dx, dy, dz)`.
    ///
    /// Any other vector (zero, diagonal, or longer than one step) yields `None`.
    #[must_use]
    pub const fn from_normal(dx: i32, dy: i32, dz: i32) -> Option<Self> {
        match (dx, dy, dz) {
            (0, -1, 0) => Some(Self::Down),
            (0, 1, 0) => Some(Self::Up),
            (0, 0, -1) => Some(Self::North),
            (0, 0, 1) => Some(Self::South),
            (-1, 0, 0) => Some(Self::West),
            (1, 0, 0) => Some(Self::East),
            _ => None,
        }
    }

    /// Whether this is one of the four horizontal directions.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        !matches!(self, Self::Down | Self::Up)
    }
}
