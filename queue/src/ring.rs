//! A growable circular buffer with an explicit overflow policy.
//!
//! [Ring] stores values in FIFO order. When it is full, the configured [Mode] decides what
//! happens to the next [Ring::push]:
//!
//! - [Mode::Extend]: capacity grows by a fixed increment and nothing is lost.
//! - [Mode::Cover]: capacity is fixed and the oldest unread value is overwritten (and handed to
//!   the eviction callback, if one is set).
//!
//! [Ring] performs no synchronization. It is expected to be owned (and mutated) by a single task.

use crate::Error;

/// Increment used by [Mode::default].
pub const DEFAULT_INCREMENT: usize = 5;

/// Callback invoked with every value overwritten by a [Mode::Cover] ring.
pub type Evict<T> = Box<dyn FnMut(T) + Send>;

/// Policy applied when pushing into a full [Ring].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Grow capacity by the given increment (an increment of `0` is treated as `1`).
    Extend(usize),
    /// Overwrite the oldest unread value.
    Cover,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Extend(DEFAULT_INCREMENT)
    }
}

/// A growable circular buffer.
pub struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,

    mode: Mode,
    evict: Option<Evict<T>>,
}

impl<T> Ring<T> {
    /// Create an empty [Ring] with room for `capacity` values.
    pub fn new(capacity: usize, mode: Mode) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
            mode,
            evict: None,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of values that can be stored before the overflow policy applies.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Change the overflow policy. Stored values are unaffected.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Set the callback invoked with values overwritten in [Mode::Cover].
    pub fn set_evict(&mut self, evict: Evict<T>) {
        self.evict = Some(evict);
    }

    /// Store `value` after all other stored values.
    pub fn push(&mut self, value: T) {
        if self.is_full() {
            match self.mode {
                Mode::Extend(increment) => {
                    let capacity = self.capacity() + increment.max(1);
                    self.relayout(capacity);
                }
                Mode::Cover => {
                    self.cover(value);
                    return;
                }
            }
        }
        let tail = (self.head + self.len) % self.capacity();
        self.slots[tail] = Some(value);
        self.len += 1;
    }

    /// Remove and return the oldest stored value.
    ///
    /// Returns `None` (and leaves the ring untouched) if the ring is empty.
    pub fn pull(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        value
    }

    /// Return the oldest stored value without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Set capacity to `capacity`, preserving all stored values and their order.
    ///
    /// Fails if `capacity` is smaller than the number of stored values.
    pub fn resize(&mut self, capacity: usize) -> Result<(), Error> {
        if capacity < self.len {
            return Err(Error::Shrink {
                len: self.len,
                requested: capacity,
            });
        }
        self.relayout(capacity);
        Ok(())
    }

    /// Iterate over all stored values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    /// Overwrite the value at `head` (the ring is full).
    fn cover(&mut self, value: T) {
        let capacity = self.capacity();
        let evicted = if capacity == 0 {
            Some(value)
        } else {
            let old = self.slots[self.head].replace(value);
            self.head = (self.head + 1) % capacity;
            old
        };
        if let (Some(evicted), Some(evict)) = (evicted, self.evict.as_mut()) {
            evict(evicted);
        }
    }

    /// Move all stored values into a new backing array of `capacity` slots, starting at index 0.
    fn relayout(&mut self, capacity: usize) {
        let mut slots = Vec::with_capacity(capacity);
        let old_capacity = self.capacity();
        for i in 0..self.len {
            slots.push(self.slots[(self.head + i) % old_capacity].take());
        }
        slots.resize_with(capacity, || None);
        self.slots = slots;
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_push_pull_fifo() {
        let mut ring = Ring::new(4, Mode::default());
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 4);
        assert!(ring.is_full());
        assert_eq!(ring.peek(), Some(&0));
        for i in 0..4 {
            assert_eq!(ring.pull(), Some(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_pull_empty() {
        let mut ring = Ring::<u8>::new(2, Mode::default());
        assert_eq!(ring.peek(), None);
        assert_eq!(ring.pull(), None);

        // Pulling from an empty ring must not disturb later pushes
        ring.push(7);
        assert_eq!(ring.pull(), Some(7));
        assert_eq!(ring.pull(), None);
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.capacity(), 2);
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut ring = Ring::new(3, Mode::Extend(5));
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_extend_after_wrap() {
        let mut ring = Ring::new(3, Mode::Extend(1));

        // Move head off of index 0 so the stored values wrap
        ring.push(0);
        ring.push(1);
        assert_eq!(ring.pull(), Some(0));
        ring.push(2);
        ring.push(3);
        assert!(ring.is_full());

        // Growing must unwrap values in order
        ring.push(4);
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let drained: Vec<_> = std::iter::from_fn(|| ring.pull()).collect();
        assert_eq!(drained, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_extend_zero_capacity() {
        let mut ring = Ring::new(0, Mode::Extend(0));
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.capacity(), 2);
        assert_eq!(ring.pull(), Some("a"));
        assert_eq!(ring.pull(), Some("b"));
    }

    #[test]
    fn test_cover_evicts_oldest() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let mut ring = Ring::new(3, Mode::Cover);
        ring.set_evict(Box::new({
            let evicted = evicted.clone();
            move |value| evicted.lock().unwrap().push(value)
        }));
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.capacity(), 3);
        assert_eq!(*evicted.lock().unwrap(), vec![0]);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        // Keep covering across a full lap
        for i in 4..7 {
            ring.push(i);
        }
        assert_eq!(*evicted.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(ring.pull(), Some(4));
        assert_eq!(ring.pull(), Some(5));
        assert_eq!(ring.pull(), Some(6));
        assert_eq!(ring.pull(), None);
    }

    #[test]
    fn test_cover_zero_capacity() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let mut ring = Ring::new(0, Mode::Cover);
        ring.set_evict(Box::new({
            let evicted = evicted.clone();
            move |value| evicted.lock().unwrap().push(value)
        }));
        ring.push(1);
        assert!(ring.is_empty());
        assert_eq!(*evicted.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_cover_without_callback() {
        let mut ring = Ring::new(2, Mode::Cover);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_set_mode() {
        let mut ring = Ring::new(2, Mode::Cover);
        ring.push(1);
        ring.push(2);
        ring.set_mode(Mode::Extend(2));
        ring.push(3);
        assert_eq!(ring.mode(), Mode::Extend(2));
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        ring.set_mode(Mode::Cover);
        ring.push(4);
        ring.push(5);
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_resize() {
        let mut ring = Ring::new(4, Mode::default());
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.pull(), Some(1));
        ring.push(4);
        ring.push(5);

        // Grow
        ring.resize(10).unwrap();
        assert_eq!(ring.capacity(), 10);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);

        // Shrink to exactly the length
        ring.resize(4).unwrap();
        assert_eq!(ring.capacity(), 4);
        assert!(ring.is_full());

        // Shrink below the length
        assert_eq!(
            ring.resize(3),
            Err(Error::Shrink {
                len: 4,
                requested: 3
            })
        );
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }
}
