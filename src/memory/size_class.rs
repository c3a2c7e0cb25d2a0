use super::error::AllocError;
use super::pool::ArenaPool;
use super::stats;
use std::ptr::NonNull;

/// Pooled chunk sizes, ascending. Requests are classified into the
/// smallest class that fits.
pub const SIZE_CLASSES: [usize; 8] = [8, 16, 32, 64, 128, 256, 512, 1024];

/// Early-exit bound: requests above this go straight to the heap
/// fallback without consulting the class table.
///
/// Note the gap: the largest pooled class is 1024 bytes, so requests in
/// (1024, 4096] also take the heap fallback despite sitting under this
/// ceiling. The mismatch is inherited behavior, kept as observed rather
/// than extending the class table or lowering the ceiling.
pub const POOL_CEILING: usize = 4096;

/// Per-class snapshot returned by [`SizeClassAllocator::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassStats {
    pub chunk_size: usize,
    pub arenas: usize,
    pub free_chunks: usize,
}

/// Routes variable-size requests to fixed-size arena pools, one per
/// entry of [`SIZE_CLASSES`], with a `libc::malloc`/`libc::free` heap
/// fallback for everything outside the pooled range.
///
/// The allocator keeps no record of which path produced a pointer.
/// Release probes the pools for ownership and assumes the heap fallback
/// when none claims the address — sound because pooled blocks and heap
/// allocations come from disjoint memory, never cross-checked.
pub struct SizeClassAllocator {
    /// One pool per size class, ascending, index-aligned with
    /// [`SIZE_CLASSES`].
    pools: Vec<ArenaPool>,
}

impl SizeClassAllocator {
    /// Eagerly create one pool (holding one arena) per size class.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] if any class's first arena
    /// block cannot be allocated.
    pub fn new() -> Result<Self, AllocError> {
        let pools = SIZE_CLASSES
            .iter()
            .map(|&size| ArenaPool::new(size))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { pools })
    }

    /// Index of the smallest class that fits `size`, if any.
    #[inline]
    fn class_index(size: usize) -> Option<usize> {
        SIZE_CLASSES.iter().position(|&class| size <= class)
    }

    /// Allocate at least `size` bytes.
    ///
    /// Sizes above [`POOL_CEILING`] — and sizes in the (1024, 4096]
    /// gap, see [`POOL_CEILING`] — go to the heap fallback. A zero
    /// `size` lands in the smallest class.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::HeapExhausted`] if the fallback `malloc`
    /// returns null, or [`AllocError::ArenaCreation`] if pool growth
    /// fails. The pooled path never reports exhaustion — pools grow on
    /// demand.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size > POOL_CEILING {
            return Self::heap_allocate(size);
        }
        match Self::class_index(size) {
            Some(idx) => self.pools[idx].allocate(),
            None => Self::heap_allocate(size),
        }
    }

    fn heap_allocate(size: usize) -> Result<NonNull<u8>, AllocError> {
        // Safety: libc::malloc with any size; null is handled below.
        let raw = unsafe { libc::malloc(size) };
        let ptr =
            NonNull::new(raw.cast::<u8>()).ok_or(AllocError::HeapExhausted { size })?;
        stats::HEAP_FALLBACK_LIVE.add(1);
        tracing::trace!(size, "request routed to heap fallback");
        Ok(ptr)
    }

    /// Release an address previously returned by
    /// [`allocate`](SizeClassAllocator::allocate) on this instance.
    ///
    /// Pools are probed in ascending class order; the first owner
    /// performs the release. An address no pool claims is returned to
    /// the system allocator.
    ///
    /// # Safety
    ///
    /// - `ptr` must have been returned by `allocate` on this exact
    ///   instance.
    /// - `ptr` must not have been released already.
    /// - `ptr` must not be used after this call.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        for pool in &mut self.pools {
            if pool.deallocate(ptr).is_ok() {
                return;
            }
        }

        stats::sub_saturating(&stats::HEAP_FALLBACK_LIVE, 1);
        // Safety: no pool owns ptr, so per the call contract it came
        // from the heap-fallback malloc.
        unsafe {
            libc::free(ptr.as_ptr().cast());
        }
    }

    /// True if any size-class pool owns `ptr`.
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.pools.iter().any(|pool| pool.contains(ptr))
    }

    /// Chunk size of the class whose pool owns `ptr`, if any. Heap
    /// fallback pointers report `None`.
    #[must_use]
    pub fn owning_class(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.pools
            .iter()
            .find(|pool| pool.contains(ptr))
            .map(ArenaPool::chunk_size)
    }

    /// True iff every pool reports empty. Says nothing about live
    /// heap-fallback pointers, which the allocator does not track.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(ArenaPool::is_empty)
    }

    /// True if every size class can serve at least one allocation
    /// without growing.
    #[must_use]
    pub fn has_free_chunks(&self) -> bool {
        self.pools.iter().all(ArenaPool::has_free_chunks)
    }

    /// Per-class arena and free-chunk counts, ascending class order.
    #[must_use]
    pub fn stats(&self) -> Vec<ClassStats> {
        self.pools
            .iter()
            .map(|pool| ClassStats {
                chunk_size: pool.chunk_size(),
                arenas: pool.arena_count(),
                free_chunks: pool.free_chunks(),
            })
            .collect()
    }

    /// Drop every arena in every pool and recreate one fresh arena per
    /// class.
    ///
    /// Every pooled address previously issued becomes invalid. Heap
    /// fallback pointers are untouched: release them before calling
    /// `reset`, or they leak.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] if any replacement arena
    /// block cannot be allocated.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        for pool in &mut self.pools {
            pool.reset()?;
        }
        tracing::debug!("size-class allocator reset");
        Ok(())
    }
}
