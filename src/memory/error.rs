use thiserror::Error;

/// Failures surfaced by the allocator layers.
///
/// Arena exhaustion is deliberately absent: an empty free stack is a
/// normal outcome, reported as `None` from [`Arena::allocate`] and
/// absorbed by the owning pool, never an error.
///
/// [`Arena::allocate`]: super::arena::Arena::allocate
#[derive(Debug, Error)]
pub enum AllocError {
    /// The global allocator refused the backing block for a new arena.
    #[error("arena block allocation failed ({size} bytes, chunk size {chunk_size})")]
    ArenaCreation { size: usize, chunk_size: usize },

    /// The system allocator returned null on the heap-fallback path.
    #[error("system allocator exhausted ({size} bytes requested)")]
    HeapExhausted { size: usize },

    /// A release was attempted with an address this node never issued.
    #[error("pointer {addr:#x} is not owned by this pool (chunk size {chunk_size})")]
    ForeignPointer { addr: usize, chunk_size: usize },
}
