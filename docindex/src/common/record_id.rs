use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque reference to a stored record.
///
/// Record ids are totally ordered so that the sorted engine can keep
/// `(key, record)` entries in one ordered structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordId(u64);

impl RecordId {
    /// Smallest possible id, used as a lower sentinel in range scans.
    pub const MIN: RecordId = RecordId(u64::MIN);
    /// Largest possible id, used as an upper sentinel in range scans.
    pub const MAX: RecordId = RecordId(u64::MAX);

    pub fn new(position: u64) -> Self {
        RecordId(position)
    }

    pub fn position(&self) -> u64 {
        self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic record id generator.
pub struct RecordIdGenerator {
    next: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        RecordIdGenerator {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RecordId {
        RecordId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
