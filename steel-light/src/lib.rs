//! # Steel Light
//!
//! Incremental block and sky light for a sectioned voxel world.
//!
//! Light is stored per 16x16x16 section as nibble arrays ([`DataLayer`]). Changes are
//! repaired incrementally by a bucketed level propagator instead of relighting whole
//! chunks, and every finished drain is published as an immutable generation that
//! [`LightReader`]s on other threads can read without locking.

pub mod block_state;
pub mod config;
pub mod data_layer;
pub mod engine;
pub mod error;
pub mod level_light_engine;
pub mod node_queue;
pub mod propagator;
pub mod section_storage;
pub mod storage_map;
pub mod threaded;

pub use block_state::{BlockGetter, FaceShape, LightBlockState, LightChunkGetter, LightLayer};
pub use config::LightConfig;
pub use data_layer::DataLayer;
pub use engine::{BlockLightEngine, LightEngine, SkyLightEngine};
pub use error::LightError;
pub use level_light_engine::{LayerLightReader, LevelLightEngine, LightReader};
pub use propagator::{LevelGraph, LevelPropagator};
pub use storage_map::DataLayerStorageMap;
pub use threaded::{TaskType, ThreadedLevelLightEngine};
