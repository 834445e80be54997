use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A fixed-capacity ring buffer keeping the most recent N elements.
///
/// When the buffer is full, pushing drops the oldest element. The audio
/// mixer uses this as its host-facing sample ring: a stalled sink loses the
/// oldest samples instead of blocking the core.
#[derive(Default, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// Creates a new ring buffer with the specified capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Pushes an element; at capacity, the oldest element is dropped.
    pub fn push(&mut self, element: T) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }

    /// Removes and returns the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop_front()
    }

    /// Returns an iterator over the elements, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
