//! In-memory world shared by the integration tests.

#![allow(dead_code, missing_docs)]

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use steel_light::{
    BlockGetter, FaceShape, LevelLightEngine, LightBlockState, LightChunkGetter, LightConfig,
    LightLayer,
};
use steel_utils::{BlockPos, ChunkPos, Direction, SectionPos};

/// A bottom slab: full floor, open top, half-height sides.
pub const BOTTOM_SLAB: LightBlockState = LightBlockState::shaped([
    FaceShape::FULL,
    FaceShape::EMPTY,
    FaceShape::LOWER_HALF,
    FaceShape::LOWER_HALF,
    FaceShape::LOWER_HALF,
    FaceShape::LOWER_HALF,
]);

/// A top slab: open floor, full top, half-height sides.
pub const TOP_SLAB: LightBlockState = LightBlockState::shaped([
    FaceShape::EMPTY,
    FaceShape::FULL,
    FaceShape::UPPER_HALF,
    FaceShape::UPPER_HALF,
    FaceShape::UPPER_HALF,
    FaceShape::UPPER_HALF,
]);

#[derive(Default)]
pub struct Blocks {
    states: RwLock<FxHashMap<BlockPos, LightBlockState>>,
    /// Every block below this Y is opaque.
    ground: Option<i32>,
}

impl BlockGetter for Blocks {
    fn light_state(&self, pos: BlockPos) -> LightBlockState {
        if let Some(state) = self.states.read().get(&pos) {
            return *state;
        }
        match self.ground {
            Some(ground) if pos.y < ground => LightBlockState::OPAQUE,
            _ => LightBlockState::AIR,
        }
    }
}

/// Blocks plus the chunk loading state the engine sees.
#[derive(Default)]
pub struct TestWorld {
    blocks: Arc<Blocks>,
    unloaded: RwLock<FxHashSet<ChunkPos>>,
    updates: Mutex<Vec<(LightLayer, SectionPos)>>,
}

impl TestWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_ground(ground: i32) -> Arc<Self> {
        Arc::new(Self {
            blocks: Arc::new(Blocks {
                states: RwLock::default(),
                ground: Some(ground),
            }),
            ..Self::default()
        })
    }

    pub fn set(&self, pos: BlockPos, state: LightBlockState) {
        self.blocks.states.write().insert(pos, state);
    }

    pub fn remove(&self, pos: BlockPos) {
        self.blocks.states.write().remove(&pos);
    }

    pub fn state(&self, pos: BlockPos) -> LightBlockState {
        self.blocks.light_state(pos)
    }

    pub fn unload(&self, chunk: ChunkPos) {
        self.unloaded.write().insert(chunk);
    }

    pub fn take_updates(&self) -> Vec<(LightLayer, SectionPos)> {
        std::mem::take(&mut *self.updates.lock())
    }

    /// Block light as a plain Dijkstra over the emitters placed in this world.
    pub fn reference_block_light(&self) -> FxHashMap<BlockPos, u8> {
        let mut levels: FxHashMap<BlockPos, u8> = FxHashMap::default();
        let mut queue = BinaryHeap::new();
        for (&pos, state) in self.blocks.states.read().iter() {
            if state.emission > 0 {
                let level = 15 - state.emission.min(15);
                levels.insert(pos, level);
                queue.push(Reverse((level, pos.x, pos.y, pos.z)));
            }
        }
        while let Some(Reverse((level, x, y, z))) = queue.pop() {
            let pos = BlockPos::new(x, y, z);
            if levels.get(&pos).is_some_and(|&best| best < level) {
                continue;
            }
            let source = self.state(pos);
            for dir in Direction::ALL {
                let next = pos.relative(dir);
                let target = self.state(next);
                if target.opacity >= 15 || source.occludes_face(dir, &target) {
                    continue;
                }
                let next_level = level + target.opacity.max(1);
                if next_level < 15 && levels.get(&next).is_none_or(|&best| next_level < best) {
                    levels.insert(next, next_level);
                    queue.push(Reverse((next_level, next.x, next.y, next.z)));
                }
            }
        }
        levels
            .into_iter()
            .map(|(pos, level)| (pos, 15 - level))
            .collect()
    }

    /// Sky light as a Dijkstra over a box open to the sky above `max.y`.
    ///
    /// Nothing is stored for Y in `gap`: light falls straight across it. Everything
    /// outside the box is dark.
    pub fn reference_sky_light(
        &self,
        min: BlockPos,
        max: BlockPos,
        gap: Range<i32>,
    ) -> FxHashMap<BlockPos, u8> {
        let inside = |pos: BlockPos| {
            (min.x..max.x).contains(&pos.x)
                && (min.y..max.y).contains(&pos.y)
                && (min.z..max.z).contains(&pos.z)
                && !gap.contains(&pos.y)
        };
        let mut levels: FxHashMap<BlockPos, u8> = FxHashMap::default();
        let mut queue = BinaryHeap::new();
        for x in min.x..max.x {
            for z in min.z..max.z {
                let top = BlockPos::new(x, max.y - 1, z);
                let sky = BlockPos::new(x, max.y, z);
                if let Some(level) = self.sky_step(sky, 0, top, Direction::Down) {
                    levels.insert(top, level);
                    queue.push(Reverse((level, top.x, top.y, top.z)));
                }
            }
        }
        while let Some(Reverse((level, x, y, z))) = queue.pop() {
            let pos = BlockPos::new(x, y, z);
            if levels.get(&pos).is_some_and(|&best| best < level) {
                continue;
            }
            for dir in Direction::ALL {
                let mut next = pos.relative(dir);
                if dir == Direction::Down && gap.contains(&next.y) {
                    next = BlockPos::new(x, gap.start - 1, z);
                }
                if !inside(next) {
                    continue;
                }
                let Some(next_level) = self.sky_step(pos, level, next, dir) else {
                    continue;
                };
                if next_level < 15 && levels.get(&next).is_none_or(|&best| next_level < best) {
                    levels.insert(next, next_level);
                    queue.push(Reverse((next_level, next.x, next.y, next.z)));
                }
            }
        }
        levels
            .into_iter()
            .map(|(pos, level)| (pos, 15 - level))
            .collect()
    }

    /// The level sky light reaches `target` with, stepping from `source` at `level`.
    fn sky_step(
        &self,
        source: BlockPos,
        level: u8,
        target: BlockPos,
        dir: Direction,
    ) -> Option<u8> {
        let target_state = self.state(target);
        if target_state.opacity >= 15 || self.state(source).occludes_face(dir, &target_state) {
            return None;
        }
        if dir == Direction::Down && level == 0 && target_state.opacity == 0 {
            Some(0)
        } else {
            Some(level + target_state.opacity.max(1))
        }
    }
}

impl LightChunkGetter for TestWorld {
    fn chunk_for_lighting(&self, chunk: ChunkPos) -> Option<Arc<dyn BlockGetter>> {
        if self.unloaded.read().contains(&chunk) {
            return None;
        }
        let blocks: Arc<dyn BlockGetter> = self.blocks.clone();
        Some(blocks)
    }

    fn on_light_update(&self, layer: LightLayer, section: SectionPos) {
        self.updates.lock().push((layer, section));
    }
}

pub fn block_only_config() -> LightConfig {
    LightConfig {
        has_sky_light: false,
        ..LightConfig::default()
    }
}

/// An engine whose sections in the 3x3 columns around the origin, Y sections 0 and 1,
/// hold blocks.
pub fn engine_around_origin(world: &Arc<TestWorld>, config: LightConfig) -> LevelLightEngine {
    let source: Arc<dyn LightChunkGetter> = world.clone();
    let mut engine = LevelLightEngine::new(source, config).expect("valid config");
    for x in -1..=1 {
        for z in -1..=1 {
            for y in 0..=1 {
                engine.update_section_status(SectionPos::new(x, y, z), false);
            }
        }
    }
    engine.run_all_updates();
    engine
}

/// Places an emitter in the world and tells the engine about it.
pub fn place_light(world: &TestWorld, engine: &mut LevelLightEngine, pos: BlockPos, emission: u8) {
    world.set(pos, LightBlockState::emitting(emission));
    engine
        .on_block_emission_increase(pos, emission)
        .expect("valid emission");
}

/// Asserts the engine's published block light matches the reference in a box around
/// the origin sections.
pub fn assert_matches_reference(world: &TestWorld, engine: &LevelLightEngine) {
    let expected = world.reference_block_light();
    for x in -15..31 {
        for y in -15..47 {
            for z in -15..31 {
                let pos = BlockPos::new(x, y, z);
                let want = expected.get(&pos).copied().unwrap_or(0);
                let got = engine.light_value(LightLayer::Block, pos);
                assert_eq!(got, want, "block light at {pos:?}");
            }
        }
    }
}
