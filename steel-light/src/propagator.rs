//! Incremental min-distance fixed point over a sparse graph of packed keys.
//!
//! A node's level is its distance to the nearest source, clamped to `level_count - 1`.
//! Lowering happens in place; raising is done by first pushing the node to the maximum
//! level and letting the neighbours re-propose, so both directions drain through the
//! same bucket queue in ascending priority.
//!
//! Buckets are FIFO ring buffers with lazy deletion: a node that moves between buckets
//! leaves a stale key behind, which is skipped when popped. `computed_levels` is the
//! single source of truth for which bucket currently owns a node.

use rustc_hash::FxHashMap;
use steel_utils::SELF_SOURCE;

use crate::node_queue::NodeQueue;

/// The graph a [`LevelPropagator`] drives.
///
/// Methods that visit neighbours receive the propagator explicitly so that the graph
/// and the queue can be borrowed independently.
pub trait LevelGraph {
    /// Whether `id` is the virtual source node.
    fn is_source(&self, id: i64) -> bool {
        id == SELF_SOURCE
    }

    /// The level currently committed for `id`.
    fn get_level(&mut self, id: i64) -> u8;

    /// Commits `level` for `id`.
    fn set_level(&mut self, id: i64, level: u8);

    /// The level `target` would get from `source` sitting at `level`.
    fn compute_level_from_neighbor(&mut self, source: i64, target: i64, level: u8) -> u8;

    /// The best level `id` can get from any neighbour except `excluded`, never above
    /// `max_level`.
    fn get_computed_level(&mut self, id: i64, excluded: i64, max_level: u8) -> u8;

    /// Offers `id`'s new `level` to its neighbours.
    fn check_neighbors_after_update(
        &mut self,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    );
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    level: u8,
    bucket: u8,
}

/// Bucketed work queue solving the level fixed point incrementally.
#[derive(Debug)]
pub struct LevelPropagator {
    level_count: u8,
    queues: Box<[NodeQueue]>,
    live: Box<[usize]>,
    computed_levels: FxHashMap<i64, Pending>,
    first_queued_level: u8,
}

impl LevelPropagator {
    /// Creates an empty propagator with levels `0..level_count`.
    ///
    /// # Panics
    /// If `level_count` is outside `2..=254`.
    #[must_use]
    pub fn new(level_count: u8, min_queue_size: usize, min_map_size: usize) -> Self {
        assert!(
            (2..=254).contains(&level_count),
            "level count must be within 2..=254, got {level_count}"
        );
        let queues = (0..level_count)
            .map(|_| NodeQueue::with_capacity(min_queue_size))
            .collect();
        let mut computed_levels = FxHashMap::default();
        computed_levels.reserve(min_map_size);
        Self {
            level_count,
            queues,
            live: vec![0; usize::from(level_count)].into_boxed_slice(),
            computed_levels,
            first_queued_level: level_count,
        }
    }

    /// Number of distinct levels.
    #[must_use]
    pub const fn level_count(&self) -> u8 {
        self.level_count
    }

    #[inline]
    const fn max_level(&self) -> u8 {
        self.level_count - 1
    }

    #[inline]
    fn key(&self, a: u8, b: u8) -> u8 {
        a.min(b).min(self.max_level())
    }

    /// Whether any node is waiting to be processed.
    #[must_use]
    pub const fn has_work(&self) -> bool {
        self.first_queued_level < self.level_count
    }

    /// Number of queued nodes.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.computed_levels.len()
    }

    /// The pending level of a queued node.
    #[must_use]
    pub fn pending_level(&self, id: i64) -> Option<u8> {
        self.computed_levels.get(&id).map(|p| p.level)
    }

    fn check_first_queued_level(&mut self, max_level: u8) {
        let from = self.first_queued_level.saturating_add(1);
        self.first_queued_level = max_level;
        for level in from..max_level {
            if self.live[usize::from(level)] > 0 {
                self.first_queued_level = level;
                break;
            }
        }
    }

    /// Drops `id` from the queue, if present.
    pub fn remove_from_queue(&mut self, id: i64) {
        if let Some(pending) = self.computed_levels.remove(&id) {
            self.release(pending.bucket, self.level_count);
        }
    }

    /// Drops every queued node matching `predicate`.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(i64) -> bool) {
        let doomed: Vec<i64> = self
            .computed_levels
            .keys()
            .copied()
            .filter(|&id| predicate(id))
            .collect();
        for id in doomed {
            self.remove_from_queue(id);
        }
    }

    /// Accounts for one entry leaving `bucket`.
    fn release(&mut self, bucket: u8, max_level: u8) {
        let index = usize::from(bucket);
        self.live[index] -= 1;
        if self.live[index] == 0 {
            self.queues[index].clear();
            if self.first_queued_level == bucket {
                self.check_first_queued_level(max_level);
            }
        }
    }

    fn enqueue(&mut self, id: i64, level: u8, bucket: u8) {
        let previous = self.computed_levels.insert(id, Pending { level, bucket });
        if previous.is_some_and(|p| p.bucket == bucket) {
            return;
        }
        let index = usize::from(bucket);
        self.queues[index].enqueue(id);
        self.live[index] += 1;
        if self.first_queued_level > bucket {
            self.first_queued_level = bucket;
        }
    }

    /// Settles `id` again as if all its neighbours had just changed.
    pub fn check_node<G: LevelGraph + ?Sized>(&mut self, graph: &mut G, id: i64) {
        self.check_edge(graph, id, id, self.max_level(), false);
    }

    /// Re-evaluates the edge `source -> id` carrying `level`.
    ///
    /// With `decrease` set the edge can only improve `id`. Otherwise `id` is recomputed
    /// from all of its neighbours.
    pub fn check_edge<G: LevelGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        source: i64,
        id: i64,
        level: u8,
        decrease: bool,
    ) {
        let current = graph.get_level(id);
        let pending = self.computed_levels.get(&id).copied();
        self.check_edge_with(graph, source, id, level, current, pending, decrease);
    }

    #[allow(clippy::too_many_arguments)]
    fn check_edge_with<G: LevelGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        source: i64,
        id: i64,
        level: u8,
        current: u8,
        pending: Option<Pending>,
        decrease: bool,
    ) {
        if graph.is_source(id) {
            return;
        }
        let max = self.max_level();
        let level = level.min(max);
        let current = current.min(max);
        let pending_level = pending.map_or(current, |p| p.level);

        let target = if decrease {
            pending_level.min(level)
        } else {
            graph.get_computed_level(id, source, level).min(max)
        };

        if current != target {
            let bucket = self.key(current, target);
            if let Some(p) = pending
                && p.bucket != bucket
            {
                self.release(p.bucket, bucket);
            }
            self.enqueue(id, target, bucket);
        } else if let Some(p) = pending {
            self.computed_levels.remove(&id);
            self.release(p.bucket, self.level_count);
        }
    }

    /// Offers `source`'s `level` to `target`.
    pub fn check_neighbor<G: LevelGraph + ?Sized>(
        &mut self,
        graph: &mut G,
        source: i64,
        target: i64,
        level: u8,
        decrease: bool,
    ) {
        let max = self.max_level();
        let pending = self.computed_levels.get(&target).copied();
        let proposed = graph
            .compute_level_from_neighbor(source, target, level)
            .min(max);
        if decrease {
            let current = graph.get_level(target);
            self.check_edge_with(graph, source, target, proposed, current, pending, true);
            return;
        }

        let (best, current) = match pending {
            Some(p) => (p.level, None),
            None => {
                let current = graph.get_level(target).min(max);
                (current, Some(current))
            }
        };
        // Only nodes that relied on this neighbour can get worse.
        if proposed == best {
            let current = match current {
                Some(current) => current,
                None => graph.get_level(target),
            };
            self.check_edge_with(graph, source, target, max, current, pending, false);
        }
    }

    /// Drains up to `steps` nodes in ascending level order and returns the unused steps.
    pub fn run_updates<G: LevelGraph + ?Sized>(&mut self, graph: &mut G, steps: usize) -> usize {
        let mut steps = steps;
        let max = self.max_level();
        while self.first_queued_level < self.level_count && steps > 0 {
            let bucket = self.first_queued_level;
            let index = usize::from(bucket);
            let Some(id) = self.queues[index].dequeue() else {
                self.live[index] = 0;
                self.check_first_queued_level(self.level_count);
                continue;
            };
            let pending = match self.computed_levels.get(&id) {
                Some(p) if p.bucket == bucket => p.level,
                _ => continue,
            };
            steps -= 1;

            let current = graph.get_level(id).min(max);
            self.computed_levels.remove(&id);
            self.release(bucket, self.level_count);

            if pending < current {
                graph.set_level(id, pending);
                graph.check_neighbors_after_update(self, id, pending, true);
            } else if pending > current {
                self.enqueue(id, pending, self.key(max, pending));
                graph.set_level(id, max);
                graph.check_neighbors_after_update(self, id, current, false);
            }
        }
        steps
    }
}
