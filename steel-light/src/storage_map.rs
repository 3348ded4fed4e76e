//! Two-generation section maps: the one being written and the one readers see.
//!
//! Layers are shared through `Arc`, so publishing a generation is a shallow clone and
//! the first write to a shared layer copies it (`Arc::make_mut`). Readers holding a
//! published generation never observe later writes.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use steel_utils::{block_pos, section_pos};

use crate::data_layer::DataLayer;

/// Highest data-bearing section per column, used by sky light.
#[derive(Debug, Clone)]
pub struct ColumnTops {
    tops: FxHashMap<i64, i32>,
    lowest_y: i32,
}

impl ColumnTops {
    /// Lowest section Y that ever held data, or `i32::MAX` before any did.
    #[must_use]
    pub const fn lowest_y(&self) -> i32 {
        self.lowest_y
    }

    /// One above the top data section of a column, or [`Self::lowest_y`] for
    /// columns without data.
    #[must_use]
    pub fn top(&self, column: i64) -> i32 {
        self.tops.get(&column).copied().unwrap_or(self.lowest_y)
    }

    pub(crate) fn set_top(&mut self, column: i64, top: i32) {
        self.tops.insert(column, top);
    }

    pub(crate) fn clear_top(&mut self, column: i64) {
        self.tops.remove(&column);
    }

    pub(crate) fn lower_to(&mut self, y: i32) {
        if self.lowest_y > y {
            self.lowest_y = y;
        }
    }
}

impl Default for ColumnTops {
    fn default() -> Self {
        Self {
            tops: FxHashMap::default(),
            lowest_y: i32::MAX,
        }
    }
}

/// One generation of light data: a sparse map from section key to layer.
#[derive(Debug, Clone, Default)]
pub struct DataLayerStorageMap {
    layers: FxHashMap<i64, Arc<DataLayer>>,
    columns: ColumnTops,
}

impl DataLayerStorageMap {
    /// The layer of a section, if it stores one.
    #[must_use]
    pub fn layer(&self, section: i64) -> Option<&Arc<DataLayer>> {
        self.layers.get(&section)
    }

    /// Whether the section stores a layer.
    #[must_use]
    pub fn has_layer(&self, section: i64) -> bool {
        self.layers.contains_key(&section)
    }

    /// Number of stored sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no section stores a layer.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Sky column bookkeeping.
    #[must_use]
    pub const fn columns(&self) -> &ColumnTops {
        &self.columns
    }

    /// Block light at a packed block position, 0 when the section has no data.
    #[must_use]
    pub fn block_light(&self, pos: i64) -> u8 {
        self.layer(section_pos::block_to_section(pos))
            .map_or(0, |layer| layer.get_index(relative_index(pos)))
    }

    /// Sky light at a packed block position.
    ///
    /// Sections without data take the bottom slice of the first stored section above
    /// them. Anything at or above the column top, or at `section_end`, sees the open sky.
    #[must_use]
    pub fn sky_light(&self, pos: i64, section_end: i32) -> u8 {
        let mut section = section_pos::block_to_section(pos);
        let mut y = section_pos::y(section);
        let top = self.columns.top(section_pos::zero_node(section));
        if top == self.columns.lowest_y || y >= top {
            return 15;
        }
        let top = top.min(section_end);
        let mut pos = pos;
        let mut layer = self.layer(section);
        if layer.is_none() {
            pos = block_pos::flat_index(pos);
            while layer.is_none() {
                y += 1;
                if y >= top {
                    return 15;
                }
                pos = block_pos::offset(pos, 0, 16, 0);
                section = section_pos::offset(section, 0, 1, 0);
                layer = self.layer(section);
            }
        }
        layer.map_or(15, |layer| layer.get_index(relative_index(pos)))
    }
}

/// Nibble index of a packed block position within its section.
#[must_use]
pub fn relative_index(pos: i64) -> usize {
    let x = section_pos::section_relative(block_pos::x(pos));
    let y = section_pos::section_relative(block_pos::y(pos));
    let z = section_pos::section_relative(block_pos::z(pos));
    (y << 8) | (z << 4) | x
}

/// The updating map of one light layer plus its published snapshot.
#[derive(Debug)]
pub struct SectionStorage {
    updating: DataLayerStorageMap,
    visible: Arc<ArcSwap<DataLayerStorageMap>>,
    dark: Arc<DataLayer>,
    bright: Arc<DataLayer>,
    generation: u64,
}

impl SectionStorage {
    /// Creates an empty storage with nothing published.
    #[must_use]
    pub fn new() -> Self {
        Self {
            updating: DataLayerStorageMap::default(),
            visible: Arc::new(ArcSwap::from_pointee(DataLayerStorageMap::default())),
            dark: Arc::new(DataLayer::new()),
            bright: Arc::new(DataLayer::filled(15)),
            generation: 0,
        }
    }

    /// The map being written.
    #[must_use]
    pub const fn updating(&self) -> &DataLayerStorageMap {
        &self.updating
    }

    /// Shared handle to the published generation.
    #[must_use]
    pub fn visible_handle(&self) -> Arc<ArcSwap<DataLayerStorageMap>> {
        Arc::clone(&self.visible)
    }

    /// The currently published generation.
    #[must_use]
    pub fn visible(&self) -> Arc<DataLayerStorageMap> {
        self.visible.load_full()
    }

    /// How many generations have been published.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// A shared layer with every value at `level`, if one exists for it.
    ///
    /// Sections created from these share one allocation until their first write.
    #[must_use]
    pub fn shared_uniform(&self, level: u8) -> Option<Arc<DataLayer>> {
        match level {
            0 => Some(Arc::clone(&self.dark)),
            15 => Some(Arc::clone(&self.bright)),
            _ => None,
        }
    }

    /// Wraps a layer, reusing a shared uniform layer where possible.
    #[must_use]
    pub fn share(&self, layer: DataLayer) -> Arc<DataLayer> {
        match layer {
            DataLayer::Homogeneous(level) => self
                .shared_uniform(level)
                .unwrap_or_else(|| Arc::new(layer)),
            DataLayer::Heterogeneous(_) => Arc::new(layer),
        }
    }

    /// Whether `layer` is one of the shared uniform layers.
    #[must_use]
    pub fn is_shared_default(&self, layer: &Arc<DataLayer>) -> bool {
        Arc::ptr_eq(layer, &self.dark) || Arc::ptr_eq(layer, &self.bright)
    }

    /// The layer of a section in the updating map.
    #[must_use]
    pub fn layer(&self, section: i64) -> Option<&Arc<DataLayer>> {
        self.updating.layer(section)
    }

    /// Whether the updating map stores the section.
    #[must_use]
    pub fn has_layer(&self, section: i64) -> bool {
        self.updating.has_layer(section)
    }

    /// Stores a layer for a section.
    pub fn set_layer(&mut self, section: i64, layer: Arc<DataLayer>) {
        self.updating.layers.insert(section, layer);
    }

    /// Removes and returns a section's layer.
    pub fn remove_layer(&mut self, section: i64) -> Option<Arc<DataLayer>> {
        self.updating.layers.remove(&section)
    }

    /// Mutable access to a section's layer, copying it first if it is shared with a
    /// published generation or other sections.
    pub fn layer_mut(&mut self, section: i64) -> Option<&mut DataLayer> {
        self.updating.layers.get_mut(&section).map(Arc::make_mut)
    }

    /// Sky column bookkeeping of the updating map.
    pub fn columns_mut(&mut self) -> &mut ColumnTops {
        &mut self.updating.columns
    }

    /// Publishes the updating map as the new visible generation.
    pub fn publish(&mut self) {
        self.visible.store(Arc::new(self.updating.clone()));
        self.generation += 1;
        log::trace!(
            "published light generation {} with {} sections",
            self.generation,
            self.updating.len()
        );
    }
}

impl Default for SectionStorage {
    fn default() -> Self {
        Self::new()
    }
}
