//! # Steel Utils
//!
//! Coordinate types and small helpers shared by the Steel crates.

pub mod direction;
pub mod types;

pub use direction::Direction;
pub use types::{BlockPos, ChunkPos, SELF_SOURCE, SectionPos, block_pos, section_pos};
