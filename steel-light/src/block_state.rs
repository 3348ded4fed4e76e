//! Interfaces the light engine consumes from the rest of the world.
//!
//! The engine never sees real block states. It asks a [`LightChunkGetter`] for a
//! [`BlockGetter`] per chunk column and reads a [`LightBlockState`] per voxel, which
//! carries only what light cares about: emission, opacity and face shapes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use steel_utils::{BlockPos, ChunkPos, Direction, SectionPos};

/// The two independent kinds of light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightLayer {
    /// Light coming down from the sky.
    Sky,
    /// Light emitted by blocks.
    Block,
}

/// Coverage of one block face, as a 4x4 grid packed into a `u16`.
///
/// Bit `v * 4 + u` covers cell (u, v) of the face projected along its axis. Both
/// sides of a shared face use the same world-aligned projection, so a block's
/// east face and its neighbour's west face index the same cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FaceShape(pub u16);

impl FaceShape {
    /// A face with no occluding geometry.
    pub const EMPTY: Self = Self(0);
    /// A fully covered face.
    pub const FULL: Self = Self(u16::MAX);
    /// The lower half of a face (bottom two rows).
    pub const LOWER_HALF: Self = Self(0x00FF);
    /// The upper half of a face (top two rows).
    pub const UPPER_HALF: Self = Self(0xFF00);

    /// Whether the face covers nothing.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the face is fully covered.
    #[must_use]
    pub const fn is_full(self) -> bool {
        self.0 == u16::MAX
    }

    /// Whether two touching faces together seal the shared face.
    #[must_use]
    pub const fn occludes_with(self, other: Self) -> bool {
        self.0 | other.0 == u16::MAX
    }
}

/// The light-relevant properties of a block state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBlockState {
    /// Emitted block light (0-15).
    pub emission: u8,
    /// How much light is lost passing through this block (0-15).
    pub opacity: u8,
    /// Per-face occlusion shapes indexed by `Direction as usize`, or `None` when the
    /// state does not use its shape for light occlusion.
    pub faces: Option<[FaceShape; 6]>,
}

impl LightBlockState {
    /// Fully transparent, non-emitting.
    pub const AIR: Self = Self {
        emission: 0,
        opacity: 0,
        faces: None,
    };

    /// A full opaque cube.
    pub const OPAQUE: Self = Self {
        emission: 0,
        opacity: 15,
        faces: Some([FaceShape::FULL; 6]),
    };

    /// What a voxel in an unavailable chunk looks like.
    pub const UNLOADED: Self = Self::OPAQUE;

    /// A transparent block that emits `emission` block light.
    #[must_use]
    pub const fn emitting(emission: u8) -> Self {
        Self {
            emission,
            opacity: 0,
            faces: None,
        }
    }

    /// A transparent block with partial light absorption, e.g. water or leaves.
    #[must_use]
    pub const fn filtering(opacity: u8) -> Self {
        Self {
            emission: 0,
            opacity,
            faces: None,
        }
    }

    /// A block that lets light through its body but occludes with the given face shapes,
    /// e.g. slabs and stairs.
    #[must_use]
    pub const fn shaped(faces: [FaceShape; 6]) -> Self {
        Self {
            emission: 0,
            opacity: 0,
            faces: Some(faces),
        }
    }

    /// The occlusion shape of one face.
    #[must_use]
    pub const fn face_shape(&self, dir: Direction) -> FaceShape {
        match self.faces {
            Some(faces) => faces[dir as usize],
            None => FaceShape::EMPTY,
        }
    }

    /// Whether light leaving this block through `dir` is blocked by `neighbor`.
    #[must_use]
    pub const fn occludes_face(&self, dir: Direction, neighbor: &Self) -> bool {
        self.face_shape(dir)
            .occludes_with(neighbor.face_shape(dir.opposite()))
    }
}

/// Read access to the block states of one chunk column.
pub trait BlockGetter: Send + Sync {
    /// The light properties of the block at `pos`.
    fn light_state(&self, pos: BlockPos) -> LightBlockState;
}

/// The world as seen by the light engine.
pub trait LightChunkGetter: Send + Sync {
    /// Block access for a chunk column, or `None` when it is not available for lighting.
    fn chunk_for_lighting(&self, chunk: ChunkPos) -> Option<Arc<dyn BlockGetter>>;

    /// Called once per affected section after a layer publishes new light data.
    fn on_light_update(&self, layer: LightLayer, section: SectionPos);
}
