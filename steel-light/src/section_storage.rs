//! Section bookkeeping for one light layer.
//!
//! Every section has a status level driven by its own [`LevelPropagator`]:
//! [`LIGHT_AND_DATA`] for sections with block data, [`LIGHT_ONLY`] for their
//! neighbours (which need light arrays so light can cross into them) and [`EMPTY`].
//! Status changes create and drop light arrays, and the voxel work that follows from
//! them is handed back to the engine as [`EdgeTask`]s.

use std::mem;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use steel_utils::{Direction, SELF_SOURCE, SectionPos, block_pos, section_pos};

use crate::block_state::{LightChunkGetter, LightLayer};
use crate::config::LightConfig;
use crate::data_layer::DataLayer;
use crate::propagator::{LevelGraph, LevelPropagator};
use crate::storage_map::{DataLayerStorageMap, SectionStorage, relative_index};

/// The section holds block data and light.
pub const LIGHT_AND_DATA: u8 = 0;
/// The section holds light only, because a neighbour has data.
pub const LIGHT_ONLY: u8 = 1;
/// The section holds nothing.
pub const EMPTY: u8 = 2;

/// Voxel-level work produced by section status changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTask {
    /// Recheck every voxel pair across the listed faces of a section, both ways.
    SectionFaces {
        /// Packed section key.
        section: i64,
        /// Faces whose neighbour section is stored and settled.
        faces: SmallVec<[Direction; 6]>,
    },
    /// A light-only sky section was just filled with full light. Push it into the
    /// listed horizontal neighbours and the section below.
    SkyFilled {
        /// Packed section key.
        section: i64,
        /// Horizontal faces to push across.
        faces: SmallVec<[Direction; 4]>,
        /// Whether the section below is stored.
        below: bool,
    },
    /// Seed full sky light into the top slice of a section.
    SkySeedTop(i64),
    /// Withdraw sky light from the top slice of a section.
    SkyClearTop(i64),
}

#[derive(Debug, Default)]
struct SkySources {
    columns_with_sources: FxHashSet<i64>,
    sections_with_sources: FxHashSet<i64>,
    to_add: FxHashSet<i64>,
    to_remove: FxHashSet<i64>,
    has_inconsistencies: bool,
}

impl SkySources {
    fn queue_add(&mut self, section: i64) {
        self.to_add.insert(section);
        self.to_remove.remove(&section);
    }

    fn queue_remove(&mut self, section: i64) {
        self.to_remove.insert(section);
        self.to_add.remove(&section);
    }

    fn recheck(&mut self) {
        self.has_inconsistencies = !self.to_add.is_empty() || !self.to_remove.is_empty();
    }
}

/// Section statuses and light arrays. This is the graph the section tracker drives.
#[derive(Debug)]
struct SectionState {
    min_section_y: i32,
    section_end: i32,
    bulk_clear_threshold: usize,
    map: SectionStorage,
    data_sections: FxHashSet<i64>,
    to_mark_data: FxHashSet<i64>,
    to_mark_no_data: FxHashSet<i64>,
    to_remove: FxHashSet<i64>,
    changed_sections: FxHashSet<i64>,
    affected_sections: FxHashSet<i64>,
    queued_sections: FxHashMap<i64, Arc<DataLayer>>,
    untrusted_sections: FxHashSet<i64>,
    retained_columns: FxHashSet<i64>,
    sky: Option<SkySources>,
}

impl SectionState {
    fn storing(&self, section: i64) -> bool {
        self.map.has_layer(section)
    }

    fn level_from_source(&self, section: i64) -> u8 {
        if self.to_mark_no_data.contains(&section) {
            EMPTY
        } else if self.data_sections.contains(&section) || self.to_mark_data.contains(&section) {
            LIGHT_AND_DATA
        } else {
            EMPTY
        }
    }

    fn has_sections_below(&self, section_y: i32) -> bool {
        section_y >= self.map.updating().columns().lowest_y() && section_y >= self.min_section_y
    }

    fn is_above_data(&self, section: i64) -> bool {
        let columns = self.map.updating().columns();
        let top = columns.top(section_pos::zero_node(section));
        let y = section_pos::y(section);
        top == columns.lowest_y() || y >= top || y >= self.section_end
    }

    fn create_data_layer(&self, section: i64) -> Arc<DataLayer> {
        if let Some(queued) = self.queued_sections.get(&section) {
            return Arc::clone(queued);
        }
        if self.sky.is_some() {
            let columns = self.map.updating().columns();
            let top = columns.top(section_pos::zero_node(section));
            let mut above = section_pos::offset(section, 0, 1, 0);
            if top != columns.lowest_y() && section_pos::y(above) < top {
                while section_pos::y(above) < top {
                    if let Some(layer) = self.map.layer(above) {
                        return self.map.share(layer.repeat_first_layer());
                    }
                    above = section_pos::offset(above, 0, 1, 0);
                }
            }
        }
        self.map.share(DataLayer::new())
    }

    fn on_node_added(&mut self, section: i64) {
        let Some(sky) = self.sky.as_mut() else {
            return;
        };
        let y = section_pos::y(section);
        let columns = self.map.columns_mut();
        columns.lower_to(y);
        let column = section_pos::zero_node(section);
        let top = columns.top(column);
        if top < y + 1 {
            columns.set_top(column, y + 1);
            if sky.columns_with_sources.contains(&column) {
                sky.queue_add(section);
                if top > columns.lowest_y() {
                    let previous = section_pos::pack(
                        section_pos::x(section),
                        top - 1,
                        section_pos::z(section),
                    );
                    sky.queue_remove(previous);
                }
                sky.recheck();
            }
        }
    }

    fn on_node_removed(&mut self, section: i64) {
        let Some(mut sky) = self.sky.take() else {
            return;
        };
        let column = section_pos::zero_node(section);
        let lit = sky.columns_with_sources.contains(&column);
        if lit {
            sky.queue_remove(section);
        }
        let mut y = section_pos::y(section);
        if self.map.updating().columns().top(column) == y + 1 {
            let mut below = section;
            while !self.storing(below) && self.has_sections_below(y) {
                y -= 1;
                below = section_pos::offset(below, 0, -1, 0);
            }
            if self.storing(below) {
                self.map.columns_mut().set_top(column, y + 1);
                if lit {
                    sky.queue_add(below);
                }
            } else {
                self.map.columns_mut().clear_top(column);
            }
        }
        if lit {
            sky.recheck();
        }
        self.sky = Some(sky);
    }
}

impl LevelGraph for SectionState {
    fn get_level(&mut self, id: i64) -> u8 {
        if id == SELF_SOURCE {
            EMPTY
        } else if self.data_sections.contains(&id) {
            LIGHT_AND_DATA
        } else if !self.to_remove.contains(&id) && self.storing(id) {
            LIGHT_ONLY
        } else {
            EMPTY
        }
    }

    fn set_level(&mut self, id: i64, level: u8) {
        let old = self.get_level(id);
        if old != LIGHT_AND_DATA && level == LIGHT_AND_DATA {
            self.data_sections.insert(id);
            self.to_mark_data.remove(&id);
        }
        if old == LIGHT_AND_DATA && level != LIGHT_AND_DATA {
            self.data_sections.remove(&id);
            self.to_mark_no_data.remove(&id);
        }
        if old >= EMPTY && level != EMPTY {
            if !self.to_remove.remove(&id) {
                let layer = self.create_data_layer(id);
                self.map.set_layer(id, layer);
                self.changed_sections.insert(id);
                self.on_node_added(id);
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        for dz in -1..=1 {
                            self.affected_sections
                                .insert(section_pos::offset(id, dx, dy, dz));
                        }
                    }
                }
            }
        }
        if old != EMPTY && level >= EMPTY {
            self.to_remove.insert(id);
        }
    }

    fn compute_level_from_neighbor(&mut self, source: i64, target: i64, level: u8) -> u8 {
        if source == SELF_SOURCE {
            self.level_from_source(target)
        } else {
            level.saturating_add(1)
        }
    }

    fn get_computed_level(&mut self, id: i64, excluded: i64, max_level: u8) -> u8 {
        let mut best = max_level;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let mut neighbor = section_pos::offset(id, dx, dy, dz);
                    if neighbor == id {
                        neighbor = SELF_SOURCE;
                    }
                    if neighbor != excluded {
                        let level = self.get_level(neighbor);
                        best = best.min(self.compute_level_from_neighbor(neighbor, id, level));
                        if best == LIGHT_AND_DATA {
                            return best;
                        }
                    }
                }
            }
        }
        best
    }

    fn check_neighbors_after_update(
        &mut self,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    ) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = section_pos::offset(id, dx, dy, dz);
                    if neighbor != id {
                        propagator.check_neighbor(self, id, neighbor, level, decrease);
                    }
                }
            }
        }
    }
}

/// Section statuses, light arrays and their published snapshot for one light layer.
#[derive(Debug)]
pub struct LayerLightSectionStorage {
    layer: LightLayer,
    tracker: LevelPropagator,
    state: SectionState,
}

impl LayerLightSectionStorage {
    /// Creates the storage for `layer`. Sky storage also tracks column tops and sources.
    #[must_use]
    pub fn new(layer: LightLayer, config: &LightConfig) -> Self {
        Self {
            layer,
            tracker: LevelPropagator::new(3, 16, 256),
            state: SectionState {
                min_section_y: config.min_light_section(),
                section_end: config.max_light_section(),
                bulk_clear_threshold: config.bulk_clear_threshold,
                map: SectionStorage::new(),
                data_sections: FxHashSet::default(),
                to_mark_data: FxHashSet::default(),
                to_mark_no_data: FxHashSet::default(),
                to_remove: FxHashSet::default(),
                changed_sections: FxHashSet::default(),
                affected_sections: FxHashSet::default(),
                queued_sections: FxHashMap::default(),
                untrusted_sections: FxHashSet::default(),
                retained_columns: FxHashSet::default(),
                sky: (layer == LightLayer::Sky).then(SkySources::default),
            },
        }
    }

    /// The light layer this storage holds.
    #[must_use]
    pub const fn layer(&self) -> LightLayer {
        self.layer
    }

    /// Whether a section currently has a light array.
    #[must_use]
    pub fn storing_light_for_section(&self, section: i64) -> bool {
        self.state.storing(section)
    }

    /// The status level of a section.
    #[must_use]
    pub fn section_level(&mut self, section: i64) -> u8 {
        self.state.get_level(section)
    }

    /// Stored light at a packed block position, or `None` when its section has no array.
    #[must_use]
    pub fn stored_level(&self, pos: i64) -> Option<u8> {
        self.state
            .map
            .layer(section_pos::block_to_section(pos))
            .map(|layer| layer.get_index(relative_index(pos)))
    }

    /// Writes stored light at a packed block position and marks the surrounding
    /// sections for notification. Positions in sections without an array are ignored.
    pub fn set_stored_level(&mut self, pos: i64, light: u8) {
        let section = section_pos::block_to_section(pos);
        let Some(layer) = self.state.map.layer_mut(section) else {
            return;
        };
        layer.set_index(relative_index(pos), light);
        self.state.changed_sections.insert(section);
        let affected = &mut self.state.affected_sections;
        section_pos::around_and_at_block_pos(pos, |s| {
            affected.insert(s);
        });
    }

    /// Whether section statuses are still settling.
    #[must_use]
    pub const fn has_work(&self) -> bool {
        self.tracker.has_work()
    }

    /// Whether there are removals or sky source changes not yet reflected in voxels.
    #[must_use]
    pub fn has_inconsistencies(&self) -> bool {
        !self.state.to_remove.is_empty()
            || self.state.sky.as_ref().is_some_and(|sky| sky.has_inconsistencies)
    }

    /// Settles up to `steps` section statuses.
    pub fn run_updates(&mut self, steps: usize) -> usize {
        self.tracker.run_updates(&mut self.state, steps)
    }

    /// Settles all pending section statuses.
    pub fn run_all_updates(&mut self) {
        if self.tracker.has_work() {
            self.tracker.run_updates(&mut self.state, usize::MAX);
        }
    }

    /// Marks a section as holding block data (`not_ready == false`) or not.
    pub fn update_section_status(&mut self, section: i64, not_ready: bool) {
        let has_data = self.state.data_sections.contains(&section);
        if !has_data && !not_ready {
            self.state.to_mark_data.insert(section);
            self.tracker
                .check_edge(&mut self.state, SELF_SOURCE, section, LIGHT_AND_DATA, true);
        }
        if has_data && not_ready {
            self.state.to_mark_no_data.insert(section);
            self.tracker
                .check_edge(&mut self.state, SELF_SOURCE, section, EMPTY, false);
        }
    }

    /// Switches sky sources for a column on or off. Block light ignores this.
    pub fn enable_light_sources(&mut self, column: i64, enabled: bool) {
        if self.state.sky.is_none() {
            return;
        }
        self.run_all_updates();
        let state = &mut self.state;
        let top = state.map.updating().columns().top(column);
        let lowest = state.map.updating().columns().lowest_y();
        let Some(sky) = state.sky.as_mut() else {
            return;
        };
        if enabled && sky.columns_with_sources.insert(column) {
            if top != lowest {
                let section =
                    section_pos::pack(section_pos::x(column), top - 1, section_pos::z(column));
                sky.queue_add(section);
                sky.recheck();
            }
        } else if !enabled {
            sky.columns_with_sources.remove(&column);
        }
    }

    /// Keeps (or stops keeping) the arrays of a column's removed sections queued for reuse.
    pub fn retain_data(&mut self, column: i64, retain: bool) {
        if retain {
            self.state.retained_columns.insert(column);
        } else {
            self.state.retained_columns.remove(&column);
        }
    }

    /// Queues an externally supplied array for a section, or drops the queued one.
    ///
    /// Unless `non_edge` is set, the section's borders are rechecked against its
    /// neighbours once the array is merged.
    pub fn queue_section_data(&mut self, section: i64, data: Option<DataLayer>, non_edge: bool) {
        if let Some(data) = data {
            let layer = self.state.map.share(data);
            self.state.queued_sections.insert(section, layer);
            if !non_edge {
                self.state.untrusted_sections.insert(section);
            }
        } else {
            self.state.queued_sections.remove(&section);
        }
    }

    /// The array a section would be saved with: the queued one if any, else the
    /// published one.
    #[must_use]
    pub fn data_layer_data(&self, section: i64) -> Option<Arc<DataLayer>> {
        if let Some(queued) = self.state.queued_sections.get(&section) {
            return Some(Arc::clone(queued));
        }
        self.state.map.visible().layer(section).cloned()
    }

    /// Published light at a packed block position.
    #[must_use]
    pub fn light_value(&self, pos: i64) -> u8 {
        let visible = self.state.map.visible();
        match self.layer {
            LightLayer::Block => visible.block_light(pos),
            LightLayer::Sky => visible.sky_light(pos, self.state.section_end),
        }
    }

    /// Sky light at a packed block position as the engine currently sees it.
    ///
    /// Unlike [`Self::light_value`] this reads the updating map, and columns without
    /// sky sources read as dark above their data.
    #[must_use]
    pub fn updating_sky_light(&self, pos: i64) -> u8 {
        let map = self.state.map.updating();
        let section = section_pos::block_to_section(pos);
        let columns = map.columns();
        let top = columns.top(section_pos::zero_node(section));
        if top == columns.lowest_y() || section_pos::y(section) >= top {
            return if self.light_on_in_section(section) { 15 } else { 0 };
        }
        map.sky_light(pos, self.state.section_end)
    }

    /// Shared handle to the published generation.
    #[must_use]
    pub fn visible_handle(&self) -> Arc<ArcSwap<DataLayerStorageMap>> {
        self.state.map.visible_handle()
    }

    /// The published generation.
    #[must_use]
    pub fn visible(&self) -> Arc<DataLayerStorageMap> {
        self.state.map.visible()
    }

    /// One past the highest section Y that can hold light.
    #[must_use]
    pub const fn light_section_end(&self) -> i32 {
        self.state.section_end
    }

    /// Whether a stored section may exist at or below `section_y` in some column.
    #[must_use]
    pub fn has_sections_below(&self, section_y: i32) -> bool {
        self.state.has_sections_below(section_y)
    }

    /// Whether a section is at or above the top data section of its column.
    #[must_use]
    pub fn is_above_data(&self, section: i64) -> bool {
        self.state.is_above_data(section)
    }

    /// Whether the section's column receives sky light.
    #[must_use]
    pub fn light_on_in_section(&self, section: i64) -> bool {
        self.state
            .sky
            .as_ref()
            .is_some_and(|sky| sky.columns_with_sources.contains(&section_pos::zero_node(section)))
    }

    fn clear_queued_section_blocks(
        voxels: &mut LevelPropagator,
        section: i64,
        bulk_clear_threshold: usize,
    ) {
        let size = voxels.queue_size();
        if size == 0 {
            return;
        }
        if size < bulk_clear_threshold {
            voxels.remove_if(|pos| section_pos::block_to_section(pos) == section);
        } else {
            let base_x = section_pos::section_to_block_coord(section_pos::x(section));
            let base_y = section_pos::section_to_block_coord(section_pos::y(section));
            let base_z = section_pos::section_to_block_coord(section_pos::z(section));
            for x in 0..16 {
                for y in 0..16 {
                    for z in 0..16 {
                        let pos = block_pos::pack(base_x + x, base_y + y, base_z + z);
                        voxels.remove_from_queue(pos);
                    }
                }
            }
        }
    }

    fn edge_faces(&self, section: i64) -> SmallVec<[Direction; 6]> {
        Direction::ALL
            .into_iter()
            .filter(|&dir| {
                let neighbor = section_pos::offset_dir(section, dir);
                !self.state.queued_sections.contains_key(&neighbor) && self.state.storing(neighbor)
            })
            .collect()
    }

    /// Applies pending removals and queued arrays, and returns the voxel checks needed
    /// to make light consistent across the affected section borders.
    pub fn mark_new_inconsistencies(
        &mut self,
        voxels: &mut LevelPropagator,
        do_skylight: bool,
        skip_edge: bool,
    ) -> Vec<EdgeTask> {
        let mut tasks = Vec::new();
        let threshold = self.state.bulk_clear_threshold;

        if self.has_inconsistencies() || !self.state.queued_sections.is_empty() {
            let removed: Vec<i64> = self.state.to_remove.drain().collect();
            for &section in &removed {
                Self::clear_queued_section_blocks(voxels, section, threshold);
                let queued = self.state.queued_sections.remove(&section);
                let dropped = self.state.map.remove_layer(section);
                if dropped.is_some() {
                    self.state.changed_sections.insert(section);
                }
                if self
                    .state
                    .retained_columns
                    .contains(&section_pos::zero_node(section))
                {
                    if let Some(layer) = queued.or(dropped) {
                        self.state.queued_sections.insert(section, layer);
                    }
                } else if queued.is_some() {
                    log::warn!(
                        "Discarding queued {:?} light for unloaded section {:?}",
                        self.layer,
                        SectionPos::from_long(section)
                    );
                }
            }
            for &section in &removed {
                self.state.on_node_removed(section);
            }

            let merges: Vec<(i64, Arc<DataLayer>)> = self
                .state
                .queued_sections
                .iter()
                .filter(|&(&section, layer)| {
                    self.state
                        .map
                        .layer(section)
                        .is_some_and(|current| !Arc::ptr_eq(current, layer))
                })
                .map(|(&section, layer)| (section, Arc::clone(layer)))
                .collect();
            let merged = merges.len();
            for (section, layer) in merges {
                Self::clear_queued_section_blocks(voxels, section, threshold);
                self.state.map.set_layer(section, layer);
                self.state.changed_sections.insert(section);
            }
            if !removed.is_empty() || merged > 0 {
                log::debug!(
                    "{:?} light: removed {} sections, merged {merged} queued arrays",
                    self.layer,
                    removed.len()
                );
            }

            let edge_sections: Vec<i64> = if skip_edge {
                self.state.untrusted_sections.iter().copied().collect()
            } else {
                self.state.queued_sections.keys().copied().collect()
            };
            for section in edge_sections {
                if !self.state.storing(section) {
                    continue;
                }
                let faces = self.edge_faces(section);
                if !faces.is_empty() {
                    tasks.push(EdgeTask::SectionFaces { section, faces });
                }
            }
            self.state.untrusted_sections.clear();
            let map = &self.state.map;
            self.state
                .queued_sections
                .retain(|&section, _| !map.has_layer(section));
        }

        if do_skylight {
            self.mark_sky_sources(voxels, &mut tasks);
        }
        tasks
    }

    fn mark_sky_sources(&mut self, voxels: &mut LevelPropagator, tasks: &mut Vec<EdgeTask>) {
        let Some(mut sky) = self.state.sky.take() else {
            return;
        };
        let threshold = self.state.bulk_clear_threshold;

        let adding: Vec<i64> = sky.to_add.iter().copied().collect();
        for section in adding {
            let level = self.state.get_level(section);
            if level == EMPTY
                || sky.to_remove.contains(&section)
                || !sky.sections_with_sources.insert(section)
            {
                continue;
            }
            if level == LIGHT_ONLY {
                Self::clear_queued_section_blocks(voxels, section, threshold);
                if let Some(bright) = self.state.map.shared_uniform(15) {
                    self.state.map.set_layer(section, bright);
                }
                self.state.changed_sections.insert(section);
                let faces = Direction::HORIZONTALS
                    .into_iter()
                    .filter(|&dir| {
                        let neighbor = section_pos::offset_dir(section, dir);
                        (sky.to_remove.contains(&neighbor)
                            || (!sky.sections_with_sources.contains(&neighbor)
                                && !sky.to_add.contains(&neighbor)))
                            && self.state.storing(neighbor)
                    })
                    .collect();
                let below = self.state.storing(section_pos::offset(section, 0, -1, 0));
                tasks.push(EdgeTask::SkyFilled {
                    section,
                    faces,
                    below,
                });
            } else {
                tasks.push(EdgeTask::SkySeedTop(section));
            }
        }
        sky.to_add.clear();

        for section in mem::take(&mut sky.to_remove) {
            if sky.sections_with_sources.remove(&section) && self.state.storing(section) {
                tasks.push(EdgeTask::SkyClearTop(section));
            }
        }
        sky.has_inconsistencies = false;
        self.state.sky = Some(sky);
    }

    /// Publishes the updating map if anything changed and notifies `listener` once per
    /// affected section.
    pub fn swap_section_map(&mut self, listener: &dyn LightChunkGetter) {
        if !self.state.changed_sections.is_empty() {
            self.state.map.publish();
            self.state.changed_sections.clear();
        }
        if !self.state.affected_sections.is_empty() {
            for section in self.state.affected_sections.drain() {
                listener.on_light_update(self.layer, SectionPos::from_long(section));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(layer: LightLayer) -> LayerLightSectionStorage {
        LayerLightSectionStorage::new(layer, &LightConfig::default())
    }

    #[test]
    fn test_data_section_gives_neighbours_arrays() {
        let mut storage = storage(LightLayer::Block);
        let section = section_pos::pack(0, 2, 0);
        storage.update_section_status(section, false);
        storage.run_all_updates();

        assert_eq!(storage.section_level(section), LIGHT_AND_DATA);
        assert!(storage.storing_light_for_section(section));
        let corner = section_pos::offset(section, 1, -1, 1);
        assert_eq!(storage.section_level(corner), LIGHT_ONLY);
        assert!(storage.storing_light_for_section(corner));
        let far = section_pos::offset(section, 2, 0, 0);
        assert_eq!(storage.section_level(far), EMPTY);
        assert!(!storage.storing_light_for_section(far));
    }

    #[test]
    fn test_not_ready_section_is_removed_on_inconsistency_pass() {
        let mut storage = storage(LightLayer::Block);
        let mut voxels = LevelPropagator::new(16, 16, 16);
        let section = section_pos::pack(3, 0, -2);
        storage.update_section_status(section, false);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);

        storage.update_section_status(section, true);
        storage.run_all_updates();
        // Still stored until the pass runs.
        assert!(storage.storing_light_for_section(section));
        assert!(storage.has_inconsistencies());
        storage.mark_new_inconsistencies(&mut voxels, true, true);
        assert!(!storage.storing_light_for_section(section));
        assert!(!storage.has_inconsistencies());
    }

    /// Every voxel sits at the maximum level, so any offered source queues it.
    struct Dark;

    impl LevelGraph for Dark {
        fn get_level(&mut self, _id: i64) -> u8 {
            15
        }

        fn set_level(&mut self, _id: i64, _level: u8) {}

        fn compute_level_from_neighbor(&mut self, _source: i64, _target: i64, level: u8) -> u8 {
            level.saturating_add(1)
        }

        fn get_computed_level(&mut self, _id: i64, _excluded: i64, max_level: u8) -> u8 {
            max_level
        }

        fn check_neighbors_after_update(
            &mut self,
            _propagator: &mut LevelPropagator,
            _id: i64,
            _level: u8,
            _decrease: bool,
        ) {
        }
    }

    /// Queues ten voxels in each of two sections, removes one section and checks that
    /// only its voxels leave the queue.
    fn assert_removal_clears_only_its_voxels(bulk_clear_threshold: usize) {
        let config = LightConfig {
            bulk_clear_threshold,
            ..LightConfig::default()
        };
        let mut storage = LayerLightSectionStorage::new(LightLayer::Block, &config);
        let mut voxels = LevelPropagator::new(16, 16, 16);
        let removed = section_pos::pack(0, 0, 0);
        let kept = section_pos::pack(4, 0, 0);
        storage.update_section_status(removed, false);
        storage.update_section_status(kept, false);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);

        for i in 0..10 {
            voxels.check_edge(&mut Dark, SELF_SOURCE, block_pos::pack(i, i, 15 - i), 0, true);
            voxels.check_edge(&mut Dark, SELF_SOURCE, block_pos::pack(64 + i, 3, i), 0, true);
        }
        assert_eq!(voxels.queue_size(), 20);

        storage.update_section_status(removed, true);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);
        assert!(!storage.storing_light_for_section(removed));
        assert!(storage.storing_light_for_section(kept));
        assert_eq!(voxels.queue_size(), 10);
        for i in 0..10 {
            assert_eq!(voxels.pending_level(block_pos::pack(i, i, 15 - i)), None);
            assert_eq!(voxels.pending_level(block_pos::pack(64 + i, 3, i)), Some(0));
        }
    }

    #[test]
    fn test_removal_filters_small_queue() {
        assert_removal_clears_only_its_voxels(LightConfig::default().bulk_clear_threshold);
    }

    #[test]
    fn test_removal_scans_section_at_bulk_threshold() {
        assert_removal_clears_only_its_voxels(1);
    }

    #[test]
    fn test_retained_column_keeps_removed_array_queued() {
        let mut storage = storage(LightLayer::Block);
        let mut voxels = LevelPropagator::new(16, 16, 16);
        let section = section_pos::pack(0, 0, 0);
        storage.update_section_status(section, false);
        storage.run_all_updates();
        storage.set_stored_level(block_pos::pack(1, 1, 1), 7);
        storage.mark_new_inconsistencies(&mut voxels, true, true);

        storage.retain_data(section_pos::zero_node(section), true);
        storage.update_section_status(section, true);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);
        let kept = storage.data_layer_data(section).expect("queued array");
        assert_eq!(kept.get(1, 1, 1), 7);

        // Bringing the section back merges the queued array.
        storage.update_section_status(section, false);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);
        assert_eq!(storage.stored_level(block_pos::pack(1, 1, 1)), Some(7));
    }

    #[test]
    fn test_queued_array_produces_edge_checks() {
        let mut storage = storage(LightLayer::Block);
        let mut voxels = LevelPropagator::new(16, 16, 16);
        let section = section_pos::pack(0, 0, 0);
        storage.update_section_status(section, false);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, false);

        storage.queue_section_data(section, Some(DataLayer::filled(9)), false);
        let tasks = storage.mark_new_inconsistencies(&mut voxels, true, false);
        assert_eq!(storage.stored_level(block_pos::pack(0, 0, 0)), Some(9));
        assert!(matches!(
            tasks.as_slice(),
            [EdgeTask::SectionFaces { section: s, faces }] if *s == section && faces.len() == 6
        ));
    }

    #[test]
    fn test_sky_column_tops_follow_stored_sections() {
        let mut storage = storage(LightLayer::Sky);
        let mut voxels = LevelPropagator::new(16, 16, 16);
        let low = section_pos::pack(0, 1, 0);
        let high = section_pos::pack(0, 4, 0);
        storage.update_section_status(low, false);
        storage.update_section_status(high, false);
        storage.run_all_updates();
        storage.mark_new_inconsistencies(&mut voxels, true, true);

        // The light-only section above the highest data section tops the column.
        let top = section_pos::pack(0, 5, 0);
        assert!(storage.is_above_data(section_pos::pack(0, 6, 0)));
        assert!(!storage.is_above_data(top));
        assert!(storage.has_sections_below(0));
        assert!(!storage.has_sections_below(-1));

        let column = section_pos::zero_node(low);
        storage.enable_light_sources(column, true);
        assert!(storage.light_on_in_section(high));
        assert!(storage.has_inconsistencies());
        let tasks = storage.mark_new_inconsistencies(&mut voxels, true, true);
        assert!(matches!(
            tasks.as_slice(),
            [EdgeTask::SkyFilled { section, faces, below: true }]
                if *section == top && faces.len() == 4
        ));
        assert_eq!(storage.stored_level(block_pos::pack(3, 80, 3)), Some(15));
        assert!(!storage.has_inconsistencies());
    }
}
