use super::arena::Arena;
use super::error::AllocError;
use std::ptr::NonNull;

/// A growable, ordered collection of same-chunk-size [`Arena`]s.
///
/// Allocation tries the last-used arena first, then scans the collection
/// for one with free chunks, then creates a new arena. Growth is
/// monotonic: arenas are appended and never reclaimed except by
/// [`reset`](ArenaPool::reset) or dropping the pool, so the scan and
/// owner-lookup costs are O(arenas) and grow with the peak working set.
pub struct ArenaPool {
    chunk_size: usize,
    arenas: Vec<Arena>,
    /// Index of the arena that served the last allocation. Fast-path
    /// hint only; `arenas` is never empty outside of `reset`.
    last_used: usize,
}

impl ArenaPool {
    /// Create a pool holding exactly one fresh arena.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] if the first arena's block
    /// cannot be allocated.
    pub fn new(chunk_size: usize) -> Result<Self, AllocError> {
        Ok(Self {
            chunk_size,
            arenas: vec![Arena::new(chunk_size)?],
            last_used: 0,
        })
    }

    /// Allocate one chunk, growing the pool if every arena is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] only if a new arena's block
    /// cannot be allocated; existing-arena exhaustion is absorbed here.
    pub fn allocate(&mut self) -> Result<NonNull<u8>, AllocError> {
        // Hint first. `arenas` is only empty after a failed reset, in
        // which case the scan below is a no-op and growth retries.
        if let Some(arena) = self.arenas.get_mut(self.last_used) {
            if let Some(ptr) = arena.allocate() {
                return Ok(ptr);
            }
        }

        for (i, arena) in self.arenas.iter_mut().enumerate() {
            if let Some(ptr) = arena.allocate() {
                self.last_used = i;
                return Ok(ptr);
            }
        }

        let idx = self.arenas.len();
        self.arenas.push(Arena::new(self.chunk_size)?);
        self.last_used = idx;
        tracing::trace!(
            chunk_size = self.chunk_size,
            arenas = self.arenas.len(),
            "arena pool grew"
        );

        // A freshly created arena always has a full free stack.
        self.arenas[idx].allocate().ok_or(AllocError::ArenaCreation {
            size: super::arena::ARENA_SIZE,
            chunk_size: self.chunk_size,
        })
    }

    /// Release a chunk to the arena that owns it.
    ///
    /// Checks the last-used arena first, then scans all arenas for the
    /// owner.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ForeignPointer`] if no owned arena contains
    /// `ptr` — releasing an address this pool never issued is a caller
    /// error surfaced explicitly.
    pub fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        let hint = self.last_used;
        if self.arenas.get(hint).is_some_and(|a| a.contains(ptr)) {
            return self.arenas[hint].deallocate(ptr);
        }

        for arena in &mut self.arenas {
            if arena.contains(ptr) {
                return arena.deallocate(ptr);
            }
        }

        Err(AllocError::ForeignPointer {
            addr: ptr.as_ptr() as usize,
            chunk_size: self.chunk_size,
        })
    }

    /// True iff every owned arena reports empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arenas.iter().all(Arena::is_empty)
    }

    /// True if any owned arena has free chunks.
    #[must_use]
    pub fn has_free_chunks(&self) -> bool {
        self.arenas.iter().any(Arena::has_free_chunks)
    }

    /// True if any owned arena's block contains `ptr`.
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.arenas.iter().any(|a| a.contains(ptr))
    }

    #[must_use]
    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Chunks currently free across all owned arenas.
    #[must_use]
    pub fn free_chunks(&self) -> usize {
        self.arenas.iter().map(Arena::free_chunks).sum()
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Drop every arena and recreate exactly one fresh one.
    ///
    /// Every chunk address previously issued by this pool becomes
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ArenaCreation`] if the replacement arena's
    /// block cannot be allocated; the pool is left empty in that case
    /// and the next `allocate` will retry the creation.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        self.arenas.clear();
        self.arenas.push(Arena::new(self.chunk_size)?);
        self.last_used = 0;
        Ok(())
    }
}
