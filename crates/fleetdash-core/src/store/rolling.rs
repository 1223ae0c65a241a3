// ── Bounded rolling buffers ──
//
// Fixed-capacity FIFO windows for streaming data. Eviction follows arrival
// order only: a late sample with an older timestamp is still the newest
// entry.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;

/// Fixed-capacity sequence; the oldest entry is evicted once a push would
/// exceed the capacity. `len() <= capacity()` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item` as the newest entry. Returns the evicted entry, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Newest first.
    pub fn iter_newest(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Extend<T> for RollingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

// ── Shared cache ─────────────────────────────────────────────────────

/// A [`RollingBuffer`] behind a `watch` channel, for views that stream
/// samples to a renderer.
pub struct RollingCache<T: Clone + Send + Sync + 'static> {
    buffer: watch::Sender<Arc<RollingBuffer<T>>>,
}

impl<T: Clone + Send + Sync + 'static> RollingCache<T> {
    pub fn new(capacity: usize) -> Self {
        let (buffer, _) = watch::channel(Arc::new(RollingBuffer::new(capacity)));
        Self { buffer }
    }

    /// Append one sample, evicting the oldest past capacity.
    pub fn push(&self, item: T) {
        self.buffer.send_modify(|buf| {
            Arc::make_mut(buf).push(item);
        });
    }

    /// Replace the contents with `items` (oldest first). Anything beyond
    /// the capacity keeps only the newest entries.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) {
        self.buffer.send_modify(|buf| {
            let buf = Arc::make_mut(buf);
            buf.clear();
            buf.extend(items);
        });
    }

    /// Like [`reset`](Self::reset), but also changes the capacity.
    pub fn reset_with_capacity(&self, capacity: usize, items: impl IntoIterator<Item = T>) {
        let mut buf = RollingBuffer::new(capacity);
        buf.extend(items);
        self.buffer.send_replace(Arc::new(buf));
    }

    pub fn capacity(&self) -> usize {
        self.buffer.borrow().capacity()
    }

    pub fn snapshot(&self) -> Arc<RollingBuffer<T>> {
        self.buffer.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RollingBuffer<T>>> {
        self.buffer.subscribe()
    }

    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_three_keeps_last_three_in_arrival_order() {
        let mut buf = RollingBuffer::new(3);
        for v in [1, 2, 3, 4] {
            buf.push(v);
        }
        assert_eq!(buf.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut buf = RollingBuffer::new(5);
        for v in 0..37 {
            buf.push(v);
            assert!(buf.len() <= 5);
        }
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_vec(), vec![32, 33, 34, 35, 36]);
        assert_eq!(buf.iter_newest().copied().collect::<Vec<_>>(), vec![36, 35, 34, 33, 32]);
    }

    #[test]
    fn eviction_ignores_payload_order() {
        let mut buf = RollingBuffer::new(2);
        buf.push(("10:02", 2));
        buf.push(("10:00", 0));
        let evicted = buf.push(("10:01", 1));
        assert_eq!(evicted, Some(("10:02", 2)));
        assert_eq!(buf.newest(), Some(&("10:01", 1)));
    }

    #[test]
    fn duplicates_are_kept() {
        let mut buf = RollingBuffer::new(4);
        buf.push(7);
        buf.push(7);
        assert_eq!(buf.to_vec(), vec![7, 7]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buf = RollingBuffer::new(0);
        buf.push('a');
        buf.push('b');
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.to_vec(), vec!['b']);
    }

    #[test]
    fn cache_reset_truncates_to_newest() {
        let cache = RollingCache::new(3);
        cache.push(0);
        cache.reset(1..=5);
        assert_eq!(cache.snapshot().to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn cache_capacity_can_change_on_reset() {
        let cache = RollingCache::new(2);
        cache.reset_with_capacity(4, 1..=6);
        assert_eq!(cache.capacity(), 4);
        cache.push(7);
        assert_eq!(cache.snapshot().to_vec(), vec![4, 5, 6, 7]);
    }
}
