//! Monotonic operation ids for log correlation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonically increasing counter.
///
/// The id only exists so that a human reading sequential log lines can match
/// the `"N. SQL"` label of the Nth statement issued, including across
/// interleaved connections. It carries no uniqueness guarantee beyond
/// readability within one process.
///
/// The allocator is an explicit component rather than a `static` so tests
/// can create isolated instances and [`reset`](Self::reset) them.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    counter: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter and return its new value as a string.
    ///
    /// Atomic read-modify-write, so concurrent callers never observe a
    /// duplicate id. The first id handed out is `"1"`.
    pub fn next_id(&self) -> String {
        (self.counter.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Last value handed out (0 before any allocation).
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Reset the counter to 0. Intended for test isolation.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}
