//! Fixed-capacity history ring
//!
//! Slots are written at `head`; `tail` is the oldest live slot and only moves
//! once the ring is full, evicting exactly one record per overflowing insert.

use bugtrail_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(Error::invalid_capacity(capacity));
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots,
            head: 0,
            tail: 0,
            len: 0,
        })
    }

    pub fn add(&mut self, item: T) {
        let cap = self.slots.len();
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % cap;
        if self.len == cap {
            self.tail = (self.tail + 1) % cap;
        } else {
            self.len += 1;
        }
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let cap = self.slots.len();
        (0..self.len).filter_map(move |i| self.slots[(self.tail + i) % cap].as_ref())
    }

    pub fn get_all(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn get_last(&self, n: usize) -> Vec<T> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
