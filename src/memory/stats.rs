//! All counters use `Relaxed` ordering. Individual counter values are
//! eventually consistent and intended for diagnostic display only.
//! Do NOT use these values for allocation decisions.

use std::sync::atomic::{AtomicIsize, Ordering};

/// Diagnostic-only gauge counter.
///
/// The raw value may transiently dip below zero when counters race
/// across allocator instances. Readers should always use `load()`/`get()`,
/// which clamp negative values to zero.
pub struct Counter(AtomicIsize);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicIsize::new(0))
    }

    #[inline]
    fn delta(val: usize) -> isize {
        // Diagnostic counters only: clamp absurd deltas instead of panicking.
        std::cmp::min(val, isize::MAX as usize).cast_signed()
    }

    #[inline]
    pub fn add(&self, val: usize) {
        self.0.fetch_add(Self::delta(val), Ordering::Relaxed);
    }

    #[inline]
    pub fn sub(&self, val: usize) {
        self.0.fetch_sub(Self::delta(val), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> usize {
        self.0.load(ordering).max(0).cast_unsigned()
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes currently held in live arena blocks, across all instances.
pub static ARENA_BLOCK_BYTES: Counter = Counter::new();

/// Pooled chunks currently issued to callers.
pub static POOLED_LIVE: Counter = Counter::new();

/// Live allocations on the heap-fallback path.
pub static HEAP_FALLBACK_LIVE: Counter = Counter::new();

/// Best-effort subtract from a diagnostic gauge.
///
/// Single atomic subtraction (no load-then-subtract race); readers clamp
/// negative transients via `Counter::load`.
pub fn sub_saturating(counter: &Counter, val: usize) {
    counter.sub(val);
}
