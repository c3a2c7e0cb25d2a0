//! Fixed-size-chunk slab allocator in three layers: [`Arena`] (one
//! 16 KiB block of equal chunks with O(1) reuse), [`ArenaPool`] (a
//! growable collection of same-size arenas), and [`SizeClassAllocator`]
//! (per-size-class routing with a `libc` heap fallback for requests
//! outside the pooled range).
//!
//! Single-threaded by contract: every mutating operation takes
//! `&mut self`, there is no internal locking, and instances must not be
//! shared across threads without external serialization.

// public module: contains implementation details (hidden via pub(crate))
// and TEST_MUTEX (public for tests)
pub mod memory;

// allocator layers
pub use memory::arena::{Arena, ARENA_SIZE};
pub use memory::pool::ArenaPool;
pub use memory::size_class::{ClassStats, SizeClassAllocator, POOL_CEILING, SIZE_CLASSES};

// diagnostics
pub use memory::stats::{Counter, ARENA_BLOCK_BYTES, HEAP_FALLBACK_LIVE, POOLED_LIVE};

// errors
pub use memory::error::AllocError;
