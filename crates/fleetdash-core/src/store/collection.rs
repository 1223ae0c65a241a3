// ── Keyed reactive collection ──
//
// Insertion-ordered entity cache with push-based change notification via
// `watch` channels. The whole map lives in the channel as an `Arc`; writes
// go through `Arc::make_mut`, so readers holding an old snapshot keep it
// unchanged while the writer works on a copy.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;
use tracing::warn;

use crate::model::{Device, Gateway};

/// An entity with a stable identity key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Device {
    fn key(&self) -> &str {
        &self.device_id
    }
}

impl Keyed for Gateway {
    fn key(&self) -> &str {
        &self.gateway_id
    }
}

/// Immutable view of a [`KeyedCollection`] at one point in time.
pub type KeyedSnapshot<T> = Arc<IndexMap<String, Arc<T>>>;

/// A keyed collection for a single entity type.
///
/// Keys are unique: replacing the contents collapses duplicate keys (last
/// one wins, first position kept) and patching never inserts.
pub struct KeyedCollection<T: Keyed + Clone + Send + Sync + 'static> {
    /// Full snapshot, replaced on every mutation.
    entries: watch::Sender<KeyedSnapshot<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,
}

impl<T: Keyed + Clone + Send + Sync + 'static> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + Clone + Send + Sync + 'static> KeyedCollection<T> {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Arc::new(IndexMap::new()));
        let (version, _) = watch::channel(0u64);
        Self { entries, version }
    }

    /// Replace the whole collection, keeping the order of `items`.
    /// Returns the number of entities now cached.
    pub fn replace_all(&self, items: impl IntoIterator<Item = T>) -> usize {
        let mut map = IndexMap::new();
        for item in items {
            let key = item.key().to_owned();
            if key.trim().is_empty() {
                warn!("dropping entity with an empty identity key");
                continue;
            }
            map.insert(key, Arc::new(item));
        }
        let len = map.len();

        // `send_modify` updates unconditionally, even with zero receivers.
        self.entries.send_modify(|snap| *snap = Arc::new(map));
        self.bump_version();
        len
    }

    /// Apply `update` to the entity under `key`.
    ///
    /// An unknown key leaves the collection untouched and returns `false`.
    /// The closure must not change the entity's key.
    pub fn patch(&self, key: &str, update: impl FnOnce(&mut T)) -> bool {
        let patched = self.entries.send_if_modified(|snap| {
            let Some(index) = snap.get_index_of(key) else {
                return false;
            };
            let map = Arc::make_mut(snap);
            let Some((_, entity)) = map.get_index_mut(index) else {
                return false;
            };
            update(Arc::make_mut(entity));
            debug_assert_eq!(entity.key(), key, "patch changed the identity key");
            true
        });
        if patched {
            self.bump_version();
        }
        patched
    }

    /// Look up an entity by key.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.borrow().get(key).cloned()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> KeyedSnapshot<T> {
        self.entries.borrow().clone()
    }

    /// Current entities in collection order.
    pub fn values(&self) -> Vec<Arc<T>> {
        self.entries.borrow().values().cloned().collect()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<KeyedSnapshot<T>> {
        self.entries.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// All current keys, in collection order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
