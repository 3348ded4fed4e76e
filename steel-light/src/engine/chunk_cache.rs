//! 2-element LRU cache for chunk access during light propagation.

use std::sync::Arc;

use steel_utils::ChunkPos;

use crate::block_state::{BlockGetter, LightChunkGetter};

/// 2-element LRU cache in front of a [`LightChunkGetter`].
///
/// Propagation touches the same one or two columns for long stretches, so the two
/// most recent lookups (including misses) are remembered. The cache must be cleared
/// whenever chunks may have been loaded or unloaded, which the engine does after each
/// drain.
pub struct ChunkCache {
    source: Arc<dyn LightChunkGetter>,
    last_chunk_pos: [Option<ChunkPos>; 2],
    last_chunk: [Option<Arc<dyn BlockGetter>>; 2],
    access_counter: [u64; 2],
    global_counter: u64,
}

impl ChunkCache {
    /// Creates an empty cache over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn LightChunkGetter>) -> Self {
        Self {
            source,
            last_chunk_pos: [None, None],
            last_chunk: [None, None],
            access_counter: [0, 0],
            global_counter: 0,
        }
    }

    /// The chunk source this cache reads through.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn LightChunkGetter> {
        &self.source
    }

    /// Block access for a column, asking the source on a miss.
    pub fn get(&mut self, pos: ChunkPos) -> Option<Arc<dyn BlockGetter>> {
        self.global_counter += 1;
        for i in 0..2 {
            if self.last_chunk_pos[i] == Some(pos) {
                self.access_counter[i] = self.global_counter;
                return self.last_chunk[i].clone();
            }
        }

        let chunk = self.source.chunk_for_lighting(pos);
        let lru = usize::from(self.access_counter[1] < self.access_counter[0]);
        self.last_chunk_pos[lru] = Some(pos);
        self.last_chunk[lru].clone_from(&chunk);
        self.access_counter[lru] = self.global_counter;
        chunk
    }

    /// Forgets every cached column.
    pub fn clear(&mut self) {
        self.last_chunk_pos = [None, None];
        self.last_chunk = [None, None];
        self.access_counter = [0, 0];
        self.global_counter = 0;
    }
}
