//! Publishing, persistence and chunk lifecycle.

mod common;

use std::sync::Arc;
use std::thread;

use common::{
    TestWorld, assert_matches_reference, block_only_config, engine_around_origin, place_light,
};
use steel_light::section_storage::LayerLightSectionStorage;
use steel_light::{
    DataLayer, LevelLightEngine, LightBlockState, LightChunkGetter, LightLayer,
    ThreadedLevelLightEngine,
};
use steel_utils::{BlockPos, ChunkPos, SectionPos};

const LAMP: BlockPos = BlockPos::new(8, 8, 8);

fn block_sections(engine: &LevelLightEngine) -> &LayerLightSectionStorage {
    engine.block_engine().expect("block light").storage()
}

fn set_origin_sections(engine: &mut LevelLightEngine, is_empty: bool) {
    for x in -1..=1 {
        for z in -1..=1 {
            for y in 0..=1 {
                engine.update_section_status(SectionPos::new(x, y, z), is_empty);
            }
        }
    }
}

#[test]
fn test_snapshot_never_changes() {
    let world = TestWorld::new();
    let mut engine = engine_around_origin(&world, block_only_config());
    let reader = engine.reader();
    let before = reader
        .layer(LightLayer::Block)
        .expect("block light")
        .snapshot();

    place_light(&world, &mut engine, LAMP, 15);
    engine.run_all_updates();

    assert_eq!(before.block_light(LAMP.as_long()), 0);
    assert_eq!(reader.light_value(LightLayer::Block, LAMP), 15);
    assert_eq!(reader.light_value(LightLayer::Sky, LAMP), 0);

    let remote = reader.clone();
    let seen = thread::spawn(move || remote.light_value(LightLayer::Block, BlockPos::new(9, 8, 8)))
        .join()
        .expect("reader thread");
    assert_eq!(seen, 14);
}

#[test]
fn test_untouched_sections_share_one_dark_array() {
    let world = TestWorld::new();
    let mut engine = engine_around_origin(&world, block_only_config());
    let lit = SectionPos::new(0, 0, 0).as_long();
    let untouched = SectionPos::new(1, 1, 1).as_long();
    let before = block_sections(&engine).visible();
    let dark = Arc::clone(before.layer(lit).expect("stored"));
    assert!(Arc::ptr_eq(&dark, before.layer(untouched).expect("stored")));

    // An emission of 1 lights a single voxel.
    place_light(&world, &mut engine, LAMP, 1);
    engine.run_all_updates();
    let after = block_sections(&engine).visible();
    assert!(!Arc::ptr_eq(&dark, after.layer(lit).expect("stored")));
    assert!(Arc::ptr_eq(&dark, after.layer(untouched).expect("stored")));
    assert_eq!(after.block_light(LAMP.as_long()), 1);
    assert_eq!(dark.get(8, 8, 8), 0);
}

/// Lights the lamp, saves the array of its section, then unloads every section.
fn lit_then_unloaded(world: &Arc<TestWorld>) -> (LevelLightEngine, Vec<u8>) {
    let mut engine = engine_around_origin(world, block_only_config());
    place_light(world, &mut engine, LAMP, 15);
    engine.run_all_updates();
    let saved = engine
        .data_layer_data(LightLayer::Block, SectionPos::new(0, 0, 0))
        .expect("stored")
        .to_bytes();

    set_origin_sections(&mut engine, true);
    engine.run_all_updates();
    (engine, saved)
}

#[test]
fn test_saved_array_reloads_without_relighting() {
    let world = TestWorld::new();
    let (mut engine, saved) = lit_then_unloaded(&world);
    let section = SectionPos::new(0, 0, 0);
    assert_eq!(saved.len(), 2048);
    assert!(!block_sections(&engine).storing_light_for_section(section.as_long()));
    assert_eq!(engine.light_value(LightLayer::Block, LAMP), 0);
    assert!(!engine.has_light_work());

    let loaded = DataLayer::from_bytes(&saved).expect("2048 bytes");
    engine.queue_section_data(LightLayer::Block, section, Some(loaded), true);
    set_origin_sections(&mut engine, false);
    engine.run_all_updates();
    assert_eq!(engine.light_value(LightLayer::Block, LAMP), 15);
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(0, 8, 8)), 7);
    // Trusted data is not pushed into neighbours.
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(-1, 8, 8)), 0);
}

#[test]
fn test_untrusted_array_spreads_across_edges() {
    let world = TestWorld::new();
    let (mut engine, saved) = lit_then_unloaded(&world);
    set_origin_sections(&mut engine, false);
    engine.run_all_updates();

    let loaded = DataLayer::from_bytes(&saved).expect("2048 bytes");
    engine.queue_section_data(LightLayer::Block, SectionPos::new(0, 0, 0), Some(loaded), false);
    engine.run_all_updates();
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(0, 8, 8)), 7);
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(-1, 8, 8)), 6);
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(-3, 8, 8)), 4);
    assert_matches_reference(&world, &engine);
}

#[test]
fn test_retained_column_keeps_arrays() {
    let world = TestWorld::new();
    let mut engine = engine_around_origin(&world, block_only_config());
    place_light(&world, &mut engine, LAMP, 15);
    engine.run_all_updates();
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(16, 8, 8)), 7);

    engine.retain_data(ChunkPos::new(0, 0), true);
    set_origin_sections(&mut engine, true);
    engine.run_all_updates();
    let kept = engine
        .data_layer_data(LightLayer::Block, SectionPos::new(0, 0, 0))
        .expect("retained");
    assert_eq!(kept.get(8, 8, 8), 15);
    assert!(
        engine
            .data_layer_data(LightLayer::Block, SectionPos::new(1, 0, 0))
            .is_none()
    );

    set_origin_sections(&mut engine, false);
    engine.retain_data(ChunkPos::new(0, 0), false);
    engine.run_all_updates();
    assert_eq!(engine.light_value(LightLayer::Block, LAMP), 15);
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(16, 8, 8)), 0);
}

#[test]
fn test_unloaded_neighbour_blocks_light() {
    let world = TestWorld::new();
    world.unload(ChunkPos::new(1, 0));
    let mut engine = engine_around_origin(&world, block_only_config());
    place_light(&world, &mut engine, BlockPos::new(14, 8, 8), 15);
    engine.run_all_updates();
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(15, 8, 8)), 14);
    assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(16, 8, 8)), 0);
}

#[test]
fn test_threaded_light_chunk_and_unload() {
    let world = TestWorld::new();
    world.set(LAMP, LightBlockState::emitting(15));
    let source: Arc<dyn LightChunkGetter> = world.clone();
    let engine = Arc::new(
        ThreadedLevelLightEngine::new(source, block_only_config()).expect("valid config"),
    );
    let chunk = ChunkPos::new(0, 0);
    let mut done = engine
        .light_chunk(chunk, vec![0, 1], vec![(LAMP, 15)], false)
        .expect("valid emission");
    assert!(engine.has_work());
    engine.run_until_idle();
    assert_eq!(done.try_recv().expect("lit"), chunk);

    let reader = engine.reader();
    let worker = Arc::clone(&engine);
    thread::spawn(move || worker.check_block(LAMP))
        .join()
        .expect("worker thread");
    engine.run_until_idle();
    assert_eq!(reader.light_value(LightLayer::Block, LAMP), 15);
    assert_eq!(reader.light_value(LightLayer::Block, BlockPos::new(8, 20, 8)), 3);

    engine.update_chunk_status(chunk);
    engine.run_until_idle();
    assert!(!engine.has_work());
    assert_eq!(reader.light_value(LightLayer::Block, LAMP), 0);
    engine.with_engine(|engine| {
        assert!(
            engine
                .data_layer_data(LightLayer::Block, SectionPos::new(0, 0, 0))
                .is_none()
        );
    });
}
