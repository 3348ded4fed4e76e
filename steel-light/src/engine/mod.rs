//! Voxel light engines.
//!
//! [`LightEngine`] owns the voxel [`LevelPropagator`], the section storage of one
//! light layer and a chunk cache. The physics that differ between block and sky light
//! live behind [`LightRules`]. Levels are inverted light: level `15 - light`, so the
//! brightest voxel is the propagator's level 0.

mod block;
mod chunk_cache;
mod sky;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use steel_utils::{BlockPos, ChunkPos, Direction, SELF_SOURCE, block_pos, section_pos};

pub use block::BlockLightRules;
pub use chunk_cache::ChunkCache;
pub use sky::SkyLightRules;

use crate::block_state::{LightBlockState, LightChunkGetter, LightLayer};
use crate::config::LightConfig;
use crate::data_layer::DataLayer;
use crate::error::LightError;
use crate::propagator::{LevelGraph, LevelPropagator};
use crate::section_storage::{EdgeTask, LayerLightSectionStorage};

/// Block light engine.
pub type BlockLightEngine = LightEngine<BlockLightRules>;
/// Sky light engine.
pub type SkyLightEngine = LightEngine<SkyLightRules>;

/// Number of voxel levels.
pub const LEVEL_COUNT: u8 = 16;
const MAX_LEVEL: u8 = LEVEL_COUNT - 1;

/// The physics of one light layer.
pub trait LightRules: Send + Sized + 'static {
    /// The layer these rules light.
    const LAYER: LightLayer;

    /// The level `target` gets from `source` at `level`.
    fn compute_level_from_neighbor(
        graph: &mut LightGraph<'_, Self>,
        source: i64,
        target: i64,
        level: u8,
    ) -> u8;

    /// The best level `id` can get from any neighbour except `excluded`.
    fn get_computed_level(
        graph: &mut LightGraph<'_, Self>,
        id: i64,
        excluded: i64,
        max_level: u8,
    ) -> u8;

    /// Offers `id`'s level to its neighbours.
    fn check_neighbors_after_update(
        graph: &mut LightGraph<'_, Self>,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    );

    /// Re-settles a single voxel.
    fn check_node(graph: &mut LightGraph<'_, Self>, propagator: &mut LevelPropagator, id: i64) {
        graph.storage.run_all_updates();
        if graph
            .storage
            .storing_light_for_section(section_pos::block_to_section(id))
        {
            propagator.check_node(graph, id);
        }
    }
}

/// The voxel graph of one light layer, as seen by the propagator.
pub struct LightGraph<'a, R> {
    storage: &'a mut LayerLightSectionStorage,
    chunks: &'a mut ChunkCache,
    rules: PhantomData<R>,
}

impl<'a, R: LightRules> LightGraph<'a, R> {
    fn new(storage: &'a mut LayerLightSectionStorage, chunks: &'a mut ChunkCache) -> Self {
        Self {
            storage,
            chunks,
            rules: PhantomData,
        }
    }

    /// The section storage of this layer.
    #[must_use]
    pub fn storage(&self) -> &LayerLightSectionStorage {
        &*self.storage
    }

    /// The block at a packed position and its opacity. Unavailable chunks read as
    /// opaque.
    pub fn state_and_opacity(&mut self, pos: i64) -> (LightBlockState, u8) {
        let block = BlockPos::from_long(pos);
        match self.chunks.get(block.chunk()) {
            Some(chunk) => {
                let state = chunk.light_state(block);
                (state, state.opacity.min(MAX_LEVEL))
            }
            None => (LightBlockState::UNLOADED, MAX_LEVEL),
        }
    }

    /// Block light emitted at a packed position.
    pub fn light_emission(&mut self, pos: i64) -> u8 {
        let block = BlockPos::from_long(pos);
        self.chunks
            .get(block.chunk())
            .map_or(0, |chunk| chunk.light_state(block).emission.min(MAX_LEVEL))
    }

    /// The level of a voxel whose section stores light.
    #[must_use]
    pub fn stored_level(&self, pos: i64) -> Option<u8> {
        self.storage.stored_level(pos).map(|light| MAX_LEVEL - light)
    }
}

impl<R: LightRules> LevelGraph for LightGraph<'_, R> {
    fn get_level(&mut self, id: i64) -> u8 {
        if id == SELF_SOURCE {
            return 0;
        }
        MAX_LEVEL - self.storage.stored_level(id).unwrap_or(0)
    }

    fn set_level(&mut self, id: i64, level: u8) {
        self.storage
            .set_stored_level(id, MAX_LEVEL - level.min(MAX_LEVEL));
    }

    fn compute_level_from_neighbor(&mut self, source: i64, target: i64, level: u8) -> u8 {
        R::compute_level_from_neighbor(self, source, target, level)
    }

    fn get_computed_level(&mut self, id: i64, excluded: i64, max_level: u8) -> u8 {
        R::get_computed_level(self, id, excluded, max_level)
    }

    fn check_neighbors_after_update(
        &mut self,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    ) {
        R::check_neighbors_after_update(self, propagator, id, level, decrease);
    }
}

/// Direction from `source` to `target`, for face neighbours only.
///
/// # Panics
/// If the two positions are not face neighbours, which means the coordinate arithmetic
/// is corrupt.
fn direction_between(source: i64, target: i64) -> Direction {
    let (dx, dy, dz) = signum_delta(source, target);
    match Direction::from_normal(dx, dy, dz) {
        Some(dir) => dir,
        None => illegal_direction(dx, dy, dz),
    }
}

fn signum_delta(source: i64, target: i64) -> (i32, i32, i32) {
    (
        (block_pos::x(target) - block_pos::x(source)).signum(),
        (block_pos::y(target) - block_pos::y(source)).signum(),
        (block_pos::z(target) - block_pos::z(source)).signum(),
    )
}

#[cold]
fn illegal_direction(dx: i32, dy: i32, dz: i32) -> ! {
    let err = LightError::IllegalDirection { dx, dy, dz };
    log::error!("{err}");
    panic!("{err}")
}

/// Every voxel pair across one face of a section, as (inside, outside).
fn face_pairs(section: i64, dir: Direction) -> impl Iterator<Item = (i64, i64)> {
    let base_x = section_pos::section_to_block_coord(section_pos::x(section));
    let base_y = section_pos::section_to_block_coord(section_pos::y(section));
    let base_z = section_pos::section_to_block_coord(section_pos::z(section));
    let (dx, dy, dz) = dir.offset();
    let edge = |d: i32| if d > 0 { 15 } else { 0 };
    (0..16).flat_map(move |a| {
        (0..16).map(move |b| {
            let (x, y, z) = match dir {
                Direction::Down | Direction::Up => (a, edge(dy), b),
                Direction::North | Direction::South => (a, b, edge(dz)),
                Direction::West | Direction::East => (edge(dx), a, b),
            };
            let inside = block_pos::pack(base_x + x, base_y + y, base_z + z);
            (inside, block_pos::offset_dir(inside, dir))
        })
    })
}

/// Incremental light engine for one layer.
pub struct LightEngine<R: LightRules> {
    propagator: LevelPropagator,
    storage: LayerLightSectionStorage,
    chunks: ChunkCache,
    running_light_updates: bool,
    rules: PhantomData<R>,
}

impl<R: LightRules> fmt::Debug for LightEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightEngine")
            .field("layer", &R::LAYER)
            .field("queued", &self.propagator.queue_size())
            .field("running_light_updates", &self.running_light_updates)
            .finish_non_exhaustive()
    }
}

impl<R: LightRules> LightEngine<R> {
    /// Creates an engine reading blocks from `chunk_source`.
    #[must_use]
    pub fn new(chunk_source: Arc<dyn LightChunkGetter>, config: &LightConfig) -> Self {
        Self {
            propagator: LevelPropagator::new(LEVEL_COUNT, 16, 256),
            storage: LayerLightSectionStorage::new(R::LAYER, config),
            chunks: ChunkCache::new(chunk_source),
            running_light_updates: false,
            rules: PhantomData,
        }
    }

    /// The layer this engine lights.
    #[must_use]
    pub const fn layer(&self) -> LightLayer {
        R::LAYER
    }

    /// The section storage of this engine.
    #[must_use]
    pub const fn storage(&self) -> &LayerLightSectionStorage {
        &self.storage
    }

    /// Number of voxels waiting to be processed.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.propagator.queue_size()
    }

    /// Schedules a block and its six neighbours for recomputation.
    pub fn check_block(&mut self, pos: BlockPos) {
        let id = pos.as_long();
        let mut graph = LightGraph::<R>::new(&mut self.storage, &mut self.chunks);
        R::check_node(&mut graph, &mut self.propagator, id);
        for dir in Direction::ALL {
            R::check_node(&mut graph, &mut self.propagator, block_pos::offset_dir(id, dir));
        }
    }

    /// Whether any work is pending, including publishing a drain that ran out of budget
    /// exactly as it finished.
    #[must_use]
    pub fn has_light_work(&self) -> bool {
        self.running_light_updates
            || self.propagator.has_work()
            || self.storage.has_work()
            || self.storage.has_inconsistencies()
    }

    /// Runs up to `steps` units of work and returns the unused steps.
    ///
    /// Section statuses settle first, then removals and queued arrays are applied, then
    /// voxels drain. When the voxel queue is empty the updated light is published.
    pub fn run_updates(&mut self, steps: usize, do_skylight: bool, skip_edge: bool) -> usize {
        let mut steps = steps;
        if !self.running_light_updates {
            if self.storage.has_work() {
                steps = self.storage.run_updates(steps);
                if steps == 0 {
                    return 0;
                }
            }
            let tasks =
                self.storage
                    .mark_new_inconsistencies(&mut self.propagator, do_skylight, skip_edge);
            self.apply_edge_tasks(tasks);
        }
        self.running_light_updates = true;
        if self.propagator.has_work() {
            let mut graph = LightGraph::<R>::new(&mut self.storage, &mut self.chunks);
            steps = self.propagator.run_updates(&mut graph, steps);
            self.chunks.clear();
            if steps == 0 {
                return 0;
            }
        }
        self.running_light_updates = false;
        let source = Arc::clone(self.chunks.source());
        self.storage.swap_section_map(source.as_ref());
        steps
    }

    fn apply_edge_tasks(&mut self, tasks: Vec<EdgeTask>) {
        if tasks.is_empty() {
            return;
        }
        log::trace!("{:?} light: applying {} section edge tasks", R::LAYER, tasks.len());
        let propagator = &mut self.propagator;
        let mut graph = LightGraph::<R>::new(&mut self.storage, &mut self.chunks);
        for task in tasks {
            match task {
                EdgeTask::SectionFaces { section, faces } => {
                    for dir in faces {
                        for (inside, outside) in face_pairs(section, dir) {
                            let level = graph.get_level(inside);
                            let level =
                                R::compute_level_from_neighbor(&mut graph, inside, outside, level);
                            propagator.check_edge(&mut graph, inside, outside, level, false);

                            let level = graph.get_level(outside);
                            let level =
                                R::compute_level_from_neighbor(&mut graph, outside, inside, level);
                            propagator.check_edge(&mut graph, outside, inside, level, false);
                        }
                    }
                }
                EdgeTask::SkyFilled {
                    section,
                    faces,
                    below,
                } => {
                    let down = below.then_some(Direction::Down);
                    for dir in faces.into_iter().chain(down) {
                        for (inside, outside) in face_pairs(section, dir) {
                            let level =
                                R::compute_level_from_neighbor(&mut graph, inside, outside, 0);
                            propagator.check_edge(&mut graph, inside, outside, level, true);
                        }
                    }
                }
                EdgeTask::SkySeedTop(section) => {
                    for (inside, _) in face_pairs(section, Direction::Up) {
                        propagator.check_edge(&mut graph, SELF_SOURCE, inside, 0, true);
                    }
                }
                EdgeTask::SkyClearTop(section) => {
                    for (inside, _) in face_pairs(section, Direction::Up) {
                        propagator.check_edge(&mut graph, SELF_SOURCE, inside, MAX_LEVEL, false);
                    }
                }
            }
        }
    }

    /// Marks a section as holding block data (`is_empty == false`) or not.
    pub fn update_section_status(&mut self, section: i64, is_empty: bool) {
        self.storage.update_section_status(section, is_empty);
    }

    /// Switches sky sources for a column. Ignored by block light.
    pub fn enable_light_sources(&mut self, chunk: ChunkPos, enabled: bool) {
        self.storage.enable_light_sources(chunk.column_key(), enabled);
    }

    /// Keeps light arrays of a column's removed sections queued for reuse.
    pub fn retain_data(&mut self, chunk: ChunkPos, retain: bool) {
        self.storage.retain_data(chunk.column_key(), retain);
    }

    /// Queues a light array to be merged on the next update, or drops a queued one.
    pub fn queue_section_data(&mut self, section: i64, data: Option<DataLayer>, non_edge: bool) {
        self.storage.queue_section_data(section, data, non_edge);
    }

    /// The light array a section would be saved with.
    #[must_use]
    pub fn data_layer_data(&self, section: i64) -> Option<Arc<DataLayer>> {
        self.storage.data_layer_data(section)
    }

    /// Published light at a block.
    #[must_use]
    pub fn light_value(&self, pos: BlockPos) -> u8 {
        self.storage.light_value(pos.as_long())
    }

    /// The status level of a section, for debugging.
    #[must_use]
    pub fn debug_data(&mut self, section: i64) -> String {
        self.storage.section_level(section).to_string()
    }
}

impl LightEngine<BlockLightRules> {
    /// Registers a new or brighter light source.
    pub fn on_block_emission_increase(
        &mut self,
        pos: BlockPos,
        emission: u8,
    ) -> Result<(), LightError> {
        if emission > MAX_LEVEL {
            return Err(LightError::InvalidLightLevel(emission));
        }
        self.storage.run_all_updates();
        let mut graph = LightGraph::<BlockLightRules>::new(&mut self.storage, &mut self.chunks);
        self.propagator
            .check_edge(&mut graph, SELF_SOURCE, pos.as_long(), MAX_LEVEL - emission, true);
        Ok(())
    }
}
