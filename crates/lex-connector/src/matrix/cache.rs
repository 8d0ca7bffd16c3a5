use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Snapshot of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of decode closures that ran.
    pub decodes: u64,
    /// Lookups answered from an already-installed entry.
    pub hits: u64,
}

/// Fixed-capacity, insert-only cache with one slot per unit key.
///
/// Each slot is a `OnceLock`, so a key is decoded at most once even when
/// several threads miss on it at the same time: one closure runs and every
/// caller observes its result. Installed entries are never replaced or
/// evicted. The cache belongs to a single engine; nothing is shared between
/// instances.
pub struct UnitCache<T> {
    slots: Box<[OnceLock<T>]>,
    decodes: AtomicU64,
    hits: AtomicU64,
}

impl<T> UnitCache<T> {
    pub fn new(num_units: usize) -> Self {
        Self {
            slots: (0..num_units).map(|_| OnceLock::new()).collect(),
            decodes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Return the entry for `key`, running `decode` only if no entry is
    /// installed yet. `None` when `key` is beyond the cache capacity.
    #[inline]
    pub fn get_or_decode<F>(&self, key: usize, decode: F) -> Option<&T>
    where
        F: FnOnce() -> T,
    {
        let slot = self.slots.get(key)?;
        if let Some(value) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }
        Some(slot.get_or_init(|| {
            self.decodes.fetch_add(1, Ordering::Relaxed);
            decode()
        }))
    }

    /// Installed entry for `key`, if any. Never decodes.
    pub fn get(&self, key: usize) -> Option<&T> {
        self.slots.get(key)?.get()
    }

    /// Number of keys the cache can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of keys with an installed entry.
    pub fn resident(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            decodes: self.decodes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}
