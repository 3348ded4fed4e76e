//! Both light layers behind one interface, plus lock-free readers of published light.

use std::sync::Arc;

use arc_swap::ArcSwap;
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use crate::block_state::{LightChunkGetter, LightLayer};
use crate::config::LightConfig;
use crate::data_layer::DataLayer;
use crate::engine::{BlockLightEngine, SkyLightEngine};
use crate::error::LightError;
use crate::section_storage::LayerLightSectionStorage;
use crate::storage_map::DataLayerStorageMap;

/// Read-only view of one layer's published light.
///
/// Cheap to clone and safe to use from any thread. Each read sees a complete
/// generation; a held [`Self::snapshot`] never changes.
#[derive(Debug, Clone)]
pub struct LayerLightReader {
    layer: LightLayer,
    visible: Arc<ArcSwap<DataLayerStorageMap>>,
    section_end: i32,
}

impl LayerLightReader {
    /// The layer this reader reads.
    #[must_use]
    pub const fn layer(&self) -> LightLayer {
        self.layer
    }

    /// Published light at a block.
    #[must_use]
    pub fn light_value(&self, pos: BlockPos) -> u8 {
        let map = self.visible.load();
        match self.layer {
            LightLayer::Block => map.block_light(pos.as_long()),
            LightLayer::Sky => map.sky_light(pos.as_long(), self.section_end),
        }
    }

    /// Published light array of a section.
    #[must_use]
    pub fn data_layer(&self, section: SectionPos) -> Option<Arc<DataLayer>> {
        self.visible.load().layer(section.as_long()).cloned()
    }

    /// The whole published generation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DataLayerStorageMap> {
        self.visible.load_full()
    }
}

impl BlockLightEngine {
    /// A reader of this engine's published light.
    #[must_use]
    pub fn reader(&self) -> LayerLightReader {
        layer_reader(LightLayer::Block, self.storage())
    }
}

impl SkyLightEngine {
    /// A reader of this engine's published light.
    #[must_use]
    pub fn reader(&self) -> LayerLightReader {
        layer_reader(LightLayer::Sky, self.storage())
    }
}

fn layer_reader(layer: LightLayer, storage: &LayerLightSectionStorage) -> LayerLightReader {
    LayerLightReader {
        layer,
        visible: storage.visible_handle(),
        section_end: storage.light_section_end(),
    }
}

/// Read-only view of both layers' published light.
#[derive(Debug, Clone)]
pub struct LightReader {
    block: Option<LayerLightReader>,
    sky: Option<LayerLightReader>,
}

impl LightReader {
    /// The reader of one layer, if the level has it.
    #[must_use]
    pub const fn layer(&self, layer: LightLayer) -> Option<&LayerLightReader> {
        match layer {
            LightLayer::Block => self.block.as_ref(),
            LightLayer::Sky => self.sky.as_ref(),
        }
    }

    /// Published light of one layer at a block, 0 when the level lacks the layer.
    #[must_use]
    pub fn light_value(&self, layer: LightLayer, pos: BlockPos) -> u8 {
        self.layer(layer).map_or(0, |reader| reader.light_value(pos))
    }

    /// The brighter of block light and sky light dimmed by `darkness`.
    #[must_use]
    pub fn raw_brightness(&self, pos: BlockPos, darkness: u8) -> u8 {
        let sky = self.light_value(LightLayer::Sky, pos).saturating_sub(darkness);
        let block = self.light_value(LightLayer::Block, pos);
        block.max(sky)
    }
}

/// Block and sky light engines of one level.
#[derive(Debug)]
pub struct LevelLightEngine {
    config: LightConfig,
    block_engine: Option<BlockLightEngine>,
    sky_engine: Option<SkyLightEngine>,
}

impl LevelLightEngine {
    /// Creates the engines `config` asks for, reading blocks from `chunk_source`.
    pub fn new(
        chunk_source: Arc<dyn LightChunkGetter>,
        config: LightConfig,
    ) -> Result<Self, LightError> {
        config.validate()?;
        let block_engine = config
            .has_block_light
            .then(|| BlockLightEngine::new(Arc::clone(&chunk_source), &config));
        let sky_engine = config
            .has_sky_light
            .then(|| SkyLightEngine::new(Arc::clone(&chunk_source), &config));
        log::debug!(
            "light engine ready: sections {}..{}, block light {}, sky light {}",
            config.min_light_section(),
            config.max_light_section(),
            config.has_block_light,
            config.has_sky_light
        );
        Ok(Self {
            config,
            block_engine,
            sky_engine,
        })
    }

    /// The configuration the engines were built with.
    #[must_use]
    pub const fn config(&self) -> &LightConfig {
        &self.config
    }

    /// The block light engine, if the level has block light.
    #[must_use]
    pub const fn block_engine(&self) -> Option<&BlockLightEngine> {
        self.block_engine.as_ref()
    }

    /// The sky light engine, if the level has sky light.
    #[must_use]
    pub const fn sky_engine(&self) -> Option<&SkyLightEngine> {
        self.sky_engine.as_ref()
    }

    /// Lowest section that can hold light.
    #[must_use]
    pub fn min_light_section(&self) -> i32 {
        self.config.min_light_section()
    }

    /// One past the highest section that can hold light.
    #[must_use]
    pub fn max_light_section(&self) -> i32 {
        self.config.max_light_section()
    }

    /// Number of sections that can hold light.
    #[must_use]
    pub fn light_section_count(&self) -> i32 {
        self.config.light_section_count()
    }

    /// Schedules a changed block and its neighbours for recomputation in both layers.
    pub fn check_block(&mut self, pos: BlockPos) {
        if let Some(engine) = &mut self.block_engine {
            engine.check_block(pos);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.check_block(pos);
        }
    }

    /// Registers a new or brighter block light source.
    pub fn on_block_emission_increase(
        &mut self,
        pos: BlockPos,
        emission: u8,
    ) -> Result<(), LightError> {
        match &mut self.block_engine {
            Some(engine) => engine.on_block_emission_increase(pos, emission),
            None => Ok(()),
        }
    }

    /// Whether any layer has pending work.
    #[must_use]
    pub fn has_light_work(&self) -> bool {
        self.block_engine
            .as_ref()
            .is_some_and(BlockLightEngine::has_light_work)
            || self
                .sky_engine
                .as_ref()
                .is_some_and(SkyLightEngine::has_light_work)
    }

    /// Runs up to `steps` units of work split between the layers and returns the unused
    /// steps.
    ///
    /// Block light gets the first half. Sky light gets the rest plus whatever block light
    /// left over, and if block light ran out of budget it gets sky light's leftovers.
    pub fn run_updates(&mut self, steps: usize, do_skylight: bool, skip_edge: bool) -> usize {
        match (&mut self.block_engine, &mut self.sky_engine) {
            (Some(block), Some(sky)) => {
                let half = steps / 2;
                let block_left = block.run_updates(half, do_skylight, skip_edge);
                let sky_budget = (steps - half).saturating_add(block_left);
                let sky_left = sky.run_updates(sky_budget, do_skylight, skip_edge);
                if block_left == 0 && sky_left > 0 {
                    block.run_updates(sky_left, do_skylight, skip_edge)
                } else {
                    sky_left
                }
            }
            (Some(block), None) => block.run_updates(steps, do_skylight, skip_edge),
            (None, Some(sky)) => sky.run_updates(steps, do_skylight, skip_edge),
            (None, None) => steps,
        }
    }

    /// Runs until no layer has work left.
    pub fn run_all_updates(&mut self) {
        while self.has_light_work() {
            self.run_updates(usize::MAX, true, true);
        }
    }

    /// Marks a section as holding blocks (`is_empty == false`) or not, in both layers.
    pub fn update_section_status(&mut self, section: SectionPos, is_empty: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.update_section_status(section.as_long(), is_empty);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.update_section_status(section.as_long(), is_empty);
        }
    }

    /// Switches sky light sources of a column on or off.
    pub fn enable_light_sources(&mut self, chunk: ChunkPos, enabled: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.enable_light_sources(chunk, enabled);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.enable_light_sources(chunk, enabled);
        }
    }

    /// Keeps light arrays of a column's removed sections for reuse.
    pub fn retain_data(&mut self, chunk: ChunkPos, retain: bool) {
        if let Some(engine) = &mut self.block_engine {
            engine.retain_data(chunk, retain);
        }
        if let Some(engine) = &mut self.sky_engine {
            engine.retain_data(chunk, retain);
        }
    }

    /// Queues a loaded light array for one layer, or drops a queued one.
    pub fn queue_section_data(
        &mut self,
        layer: LightLayer,
        section: SectionPos,
        data: Option<DataLayer>,
        non_edge: bool,
    ) {
        match layer {
            LightLayer::Block => {
                if let Some(engine) = &mut self.block_engine {
                    engine.queue_section_data(section.as_long(), data, non_edge);
                }
            }
            LightLayer::Sky => {
                if let Some(engine) = &mut self.sky_engine {
                    engine.queue_section_data(section.as_long(), data, non_edge);
                }
            }
        }
    }

    /// The light array of a section as it would be saved.
    #[must_use]
    pub fn data_layer_data(
        &self,
        layer: LightLayer,
        section: SectionPos,
    ) -> Option<Arc<DataLayer>> {
        match layer {
            LightLayer::Block => self
                .block_engine
                .as_ref()
                .and_then(|engine| engine.data_layer_data(section.as_long())),
            LightLayer::Sky => self
                .sky_engine
                .as_ref()
                .and_then(|engine| engine.data_layer_data(section.as_long())),
        }
    }

    /// Published light of one layer at a block.
    #[must_use]
    pub fn light_value(&self, layer: LightLayer, pos: BlockPos) -> u8 {
        match layer {
            LightLayer::Block => self
                .block_engine
                .as_ref()
                .map_or(0, |engine| engine.light_value(pos)),
            LightLayer::Sky => self
                .sky_engine
                .as_ref()
                .map_or(0, |engine| engine.light_value(pos)),
        }
    }

    /// The brighter of block light and sky light dimmed by `darkness`.
    #[must_use]
    pub fn raw_brightness(&self, pos: BlockPos, darkness: u8) -> u8 {
        let sky = self.light_value(LightLayer::Sky, pos).saturating_sub(darkness);
        let block = self.light_value(LightLayer::Block, pos);
        block.max(sky)
    }

    /// The status level of a section in one layer, for debugging.
    #[must_use]
    pub fn debug_data(&mut self, layer: LightLayer, section: SectionPos) -> String {
        let level = match layer {
            LightLayer::Block => self
                .block_engine
                .as_mut()
                .map(|engine| engine.debug_data(section.as_long())),
            LightLayer::Sky => self
                .sky_engine
                .as_mut()
                .map(|engine| engine.debug_data(section.as_long())),
        };
        level.unwrap_or_else(|| "n/a".to_owned())
    }

    /// A thread-safe reader of both layers' published light.
    #[must_use]
    pub fn reader(&self) -> LightReader {
        LightReader {
            block: self.block_engine.as_ref().map(BlockLightEngine::reader),
            sky: self.sky_engine.as_ref().map(SkyLightEngine::reader),
        }
    }
}
