//! FIFO ring buffer of packed node keys.
//!
//! One of these backs every priority bucket of a
//! [`LevelPropagator`](crate::propagator::LevelPropagator).

/// A FIFO queue of `i64` node keys using a power-of-two ring buffer.
#[derive(Debug)]
pub struct NodeQueue {
    buffer: Vec<i64>,
    head: usize,
    tail: usize,
    size: usize,
}

impl NodeQueue {
    /// Creates an empty queue with room for `capacity` keys before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            buffer: vec![0; capacity],
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.buffer.len() - 1
    }

    /// Appends a key at the back.
    #[inline]
    pub fn enqueue(&mut self, key: i64) {
        if self.size == self.buffer.len() {
            self.grow();
        }
        self.buffer[self.tail] = key;
        self.tail = (self.tail + 1) & self.mask();
        self.size += 1;
    }

    /// Removes and returns the key at the front.
    #[inline]
    pub fn dequeue(&mut self) -> Option<i64> {
        if self.size == 0 {
            return None;
        }
        let key = self.buffer[self.head];
        self.head = (self.head + 1) & self.mask();
        self.size -= 1;
        Some(key)
    }

    /// Checks if the queue is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the number of keys in the queue.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Drops every key, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.size = 0;
    }

    fn grow(&mut self) {
        let old_capacity = self.buffer.len();
        let mut buffer = vec![0; old_capacity * 2];
        for (i, slot) in buffer.iter_mut().take(self.size).enumerate() {
            *slot = self.buffer[(self.head + i) & (old_capacity - 1)];
        }
        self.buffer = buffer;
        self.head = 0;
        self.tail = self.size;
    }
}

impl Default for NodeQueue {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}
