use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Striped exclusive latches guarding index key buckets.
///
/// A key hashes to one stripe; writers that must check-then-insert a key
/// hold that stripe across both steps. Several keys are latched in ascending
/// stripe order so that two writers can never wait on each other.
///
/// # Examples
///
/// ```
/// use docindex::common::KeyLatches;
/// let latches = KeyLatches::new(16);
/// {
///     let _guards = latches.lock_all(["a", "b"].iter());
/// } // both buckets are released here
/// ```
pub struct KeyLatches {
    stripes: Vec<Mutex<()>>,
}

impl KeyLatches {
    /// Creates a latch table with `stripes` buckets (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        KeyLatches {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Stripe a key falls into.
    pub fn stripe_of<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Latches the bucket of a single key.
    pub fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock()
    }

    /// Latches the buckets of every key, in ascending stripe order.
    pub fn lock_all<'a, K: Hash + 'a + ?Sized>(
        &self,
        keys: impl Iterator<Item = &'a K>,
    ) -> Vec<MutexGuard<'_, ()>> {
        let mut stripes: Vec<usize> = keys.map(|k| self.stripe_of(k)).collect();
        stripes.sort_unstable();
        stripes.dedup();
        stripes.into_iter().map(|s| self.stripes[s].lock()).collect()
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }
}
