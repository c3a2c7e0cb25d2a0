use super::error::AllocError;
use super::stats;
#[cfg(debug_assertions)]
use fixedbitset::FixedBitSet;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Capacity of every arena block, in bytes.
pub const ARENA_SIZE: usize = 16 * 1024;

/// One fixed-capacity memory block partitioned into equal-size chunks.
///
/// Chunk reuse is O(1) through a free stack of chunk indices kept beside
/// the block — user bytes are never reinterpreted as bookkeeping. The
/// stack is seeded in index order `0..n`, so the first allocation pops
/// the highest-addressed chunk and reuse runs LIFO from the top of the
/// block downward.
///
/// Releasing the same chunk twice corrupts the free stack (the address
/// is later issued to two callers at once). Debug builds detect this and
/// panic; release builds do not pay for the check.
pub struct Arena {
    chunk_size: usize,
    base: NonNull<u8>,
    layout: Layout,
    /// Stack of free chunk indices. Length + issued count == capacity.
    free: Vec<u32>,
    /// Bit set per chunk: set while the chunk is free.
    #[cfg(debug_assertions)]
    free_map: FixedBitSet,
}

// Safety: Arena owns its block exclusively; moving it between threads is
// fine, only shared access is not.
unsafe impl Send for Arena {}

impl Arena {
    /// Create an arena of [`ARENA_SIZE`] bytes carved into
    /// `ARENA_SIZE / chunk_size` chunks, all initially free.
    ///
    /// `chunk_size` must be a power of two no larger than [`ARENA_SIZE`];
    /// the block is aligned to `chunk_size`, so every chunk carries its
    /// natural alignment.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] if the global allocator
    /// cannot provide the backing block.
    pub fn new(chunk_size: usize) -> Result<Self, AllocError> {
        debug_assert!(
            chunk_size.is_power_of_two() && chunk_size <= ARENA_SIZE,
            "chunk size {chunk_size} must be a power of two <= {ARENA_SIZE}",
        );

        let creation_failed = || AllocError::ArenaCreation {
            size: ARENA_SIZE,
            chunk_size,
        };
        let layout =
            Layout::from_size_align(ARENA_SIZE, chunk_size).map_err(|_| creation_failed())?;

        // Safety: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let base = NonNull::new(raw).ok_or_else(creation_failed)?;

        stats::ARENA_BLOCK_BYTES.add(ARENA_SIZE);

        let chunk_count = ARENA_SIZE / chunk_size;
        let free: Vec<u32> = (0..chunk_count as u32).collect();

        #[cfg(debug_assertions)]
        let free_map = {
            let mut map = FixedBitSet::with_capacity(chunk_count);
            map.set_range(.., true);
            map
        };

        tracing::trace!(chunk_size, chunk_count, "arena block created");

        Ok(Self {
            chunk_size,
            base,
            layout,
            free,
            #[cfg(debug_assertions)]
            free_map,
        })
    }

    /// Pop a free chunk. Returns `None` when the arena is exhausted —
    /// a normal outcome, not a fault.
    pub fn allocate(&mut self) -> Option<NonNull<u8>> {
        let idx = self.free.pop()?;

        #[cfg(debug_assertions)]
        self.free_map.set(idx as usize, false);

        stats::POOLED_LIVE.add(1);

        let offset = idx as usize * self.chunk_size;
        // Safety: idx came from the free stack, so offset < ARENA_SIZE.
        Some(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) })
    }

    /// Push a previously issued chunk back onto the free stack.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ForeignPointer`] if `ptr` lies outside this
    /// arena's block. Out-of-range pointers are rejected explicitly, the
    /// same policy the pool layer applies.
    ///
    /// # Safety contract (not enforced in release builds)
    ///
    /// An in-range `ptr` must be chunk-aligned and must not already be
    /// free. Debug builds panic on both violations; release builds
    /// silently corrupt the free stack on a double release.
    pub fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        let addr = ptr.as_ptr() as usize;
        let base_addr = self.base.as_ptr() as usize;

        if addr < base_addr || addr >= base_addr + ARENA_SIZE {
            return Err(AllocError::ForeignPointer {
                addr,
                chunk_size: self.chunk_size,
            });
        }

        let offset = addr - base_addr;
        debug_assert!(
            offset.is_multiple_of(self.chunk_size),
            "Pointer {ptr:p} is not aligned to chunk size {}",
            self.chunk_size
        );
        let idx = offset / self.chunk_size;

        #[cfg(debug_assertions)]
        {
            assert!(
                !self.free_map.contains(idx),
                "Double release detected in Arena: chunk {idx} (ptr {ptr:p})",
            );
            self.free_map.insert(idx);
        }

        self.free.push(idx as u32);
        stats::sub_saturating(&stats::POOLED_LIVE, 1);
        Ok(())
    }

    /// Half-open range test `[base, base + ARENA_SIZE)`.
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let base_addr = self.base.as_ptr() as usize;
        addr >= base_addr && addr < base_addr + ARENA_SIZE
    }

    /// True if at least one chunk is free.
    #[must_use]
    pub fn has_free_chunks(&self) -> bool {
        !self.free.is_empty()
    }

    /// True only if every chunk is currently free.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.len() == self.total_chunks()
    }

    /// Total chunk capacity of the block.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        ARENA_SIZE / self.chunk_size
    }

    /// Chunks currently on the free stack.
    #[must_use]
    pub fn free_chunks(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // Any chunk addresses still held by callers dangle from here on.
        let issued = self.total_chunks() - self.free.len();
        if issued > 0 {
            stats::sub_saturating(&stats::POOLED_LIVE, issued);
        }
        stats::sub_saturating(&stats::ARENA_BLOCK_BYTES, ARENA_SIZE);

        // Safety: base was allocated with exactly this layout and is
        // released once, here.
        unsafe {
            alloc::dealloc(self.base.as_ptr(), self.layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_concrete_64_byte_scenario() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        // 16384-byte block, 64-byte chunks: exactly 256 chunks.
        let mut arena = Arena::new(64).expect("Failed to create arena");
        assert_eq!(arena.total_chunks(), 256);

        let mut ptrs = Vec::new();
        for _ in 0..256 {
            let p = arena.allocate().expect("allocation within capacity failed");
            ptrs.push(p);
        }

        // 256 mutually distinct addresses.
        let mut addrs: Vec<usize> = ptrs.iter().map(|p| p.as_ptr() as usize).collect();
        addrs.sort_unstable();
        addrs.dedup();
        assert_eq!(addrs.len(), 256);

        // The 257th call reports exhaustion.
        assert!(arena.allocate().is_none());

        // Releasing any one address makes exactly one further call succeed.
        arena.deallocate(ptrs[100]).unwrap();
        assert!(arena.allocate().is_some());
        assert!(arena.allocate().is_none());
    }

    #[test]
    fn test_arena_free_plus_issued_invariant() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(128).unwrap();
        let total = arena.total_chunks();

        let mut issued = Vec::new();
        for step in 0..total {
            assert_eq!(arena.free_chunks() + issued.len(), total, "step {step}");
            issued.push(arena.allocate().unwrap());
        }
        assert_eq!(arena.free_chunks(), 0);

        while let Some(p) = issued.pop() {
            arena.deallocate(p).unwrap();
            assert_eq!(arena.free_chunks() + issued.len(), total);
        }
    }

    #[test]
    fn test_arena_round_trip_any_order() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(32).unwrap();
        let n = arena.total_chunks();

        let mut ptrs: Vec<_> = (0..n).map(|_| arena.allocate().unwrap()).collect();
        assert!(!arena.is_empty());

        // Release in a scrambled order: middle-out, alternating ends.
        while !ptrs.is_empty() {
            let idx = ptrs.len() / 2;
            let p = ptrs.swap_remove(idx);
            arena.deallocate(p).unwrap();
        }
        assert!(arena.is_empty());
        assert!(arena.has_free_chunks());
    }

    #[test]
    fn test_arena_lifo_reuse() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(64).unwrap();
        let p = arena.allocate().unwrap();
        arena.deallocate(p).unwrap();
        // Last released chunk is the next one issued.
        assert_eq!(arena.allocate().unwrap(), p);
    }

    #[test]
    fn test_arena_initial_order_is_reverse_address() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        // Construction seeds the free stack 0..n, so the first pop is the
        // highest-addressed chunk and successive pops walk downward.
        let mut arena = Arena::new(512).unwrap();
        let first = arena.allocate().unwrap().as_ptr() as usize;
        let second = arena.allocate().unwrap().as_ptr() as usize;
        assert_eq!(first - second, 512);
    }

    #[test]
    fn test_arena_foreign_pointer_rejected() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena_a = Arena::new(64).unwrap();
        let mut arena_b = Arena::new(64).unwrap();
        let p = arena_b.allocate().unwrap();

        let err = arena_a.deallocate(p).unwrap_err();
        assert!(matches!(err, AllocError::ForeignPointer { .. }));
        assert!(!arena_a.contains(p));
        assert!(arena_b.contains(p));

        arena_b.deallocate(p).unwrap();
    }

    #[test]
    fn test_arena_contains_bounds() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(64).unwrap();
        // First pop is the highest-addressed chunk; its last byte is the
        // last byte of the block.
        let p = arena.allocate().unwrap();
        assert!(arena.contains(p));

        let last_byte = unsafe { NonNull::new_unchecked(p.as_ptr().add(63)) };
        assert!(arena.contains(last_byte));

        // One past the end is outside the half-open range.
        let past_end = unsafe { NonNull::new_unchecked(p.as_ptr().add(64)) };
        assert!(!arena.contains(past_end));

        arena.deallocate(p).unwrap();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "Double release detected")]
    fn test_arena_double_release_detected() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(64).unwrap();
        let p = arena.allocate().unwrap();
        arena.deallocate(p).unwrap();
        let _ = arena.deallocate(p);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "is not aligned to chunk size")]
    fn test_arena_misaligned_release_detected() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut arena = Arena::new(64).unwrap();
        let p = arena.allocate().unwrap();
        let skewed = unsafe { NonNull::new_unchecked(p.as_ptr().add(1)) };
        let _ = arena.deallocate(skewed);
    }

    #[test]
    fn test_arena_stats_block_bytes() {
        let _guard = crate::memory::TEST_MUTEX.write().unwrap();
        let before = stats::ARENA_BLOCK_BYTES.get();
        {
            let _arena = Arena::new(64).unwrap();
            assert_eq!(stats::ARENA_BLOCK_BYTES.get(), before + ARENA_SIZE);
        }
        assert_eq!(stats::ARENA_BLOCK_BYTES.get(), before);
    }
}
