//! First-fit block heap.
//!
//! The heap never looks inside the arena to do its bookkeeping: all state lives in
//! the block table, and addresses are only computed from a block index when a
//! pointer is handed to the caller.
use crate::table::{self, BlockEntry};
use crate::utils::{align_up, is_aligned};
use crate::{DEFAULT_BLOCK_SIZE, HeapError, HeapResult};
use core::ptr::NonNull;

/// Fixed-block heap over a caller-provided arena.
///
/// `BLOCK` is the allocation granularity in bytes and must be a power of two.
/// Every pointer returned by the heap is `BLOCK`-aligned.
pub struct BlockHeap<'a, const BLOCK: usize = DEFAULT_BLOCK_SIZE> {
    /// First byte of the arena
    start: NonNull<u8>,
    /// One entry per arena block
    table: &'a mut [BlockEntry],
}

// SAFETY: The heap has exclusive ownership of its arena and of its table,
// so moving it to another thread cannot create shared access to either.
unsafe impl<const BLOCK: usize> Send for BlockHeap<'_, BLOCK> {}

impl<'a, const BLOCK: usize> BlockHeap<'a, BLOCK> {
    const BLOCK_IS_POWER_OF_TWO: () = assert!(BLOCK.is_power_of_two());

    /// Create a block heap over the arena `[start, end)`.
    ///
    /// Every entry of `table` is reset to [`BlockEntry::FREE`].
    ///
    /// # Safety
    ///
    /// - `[start, end)` must be valid for reads and writes
    /// - The arena must not be used by other code while the heap is alive
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidArgument` if `start` is null or `end` lies before `start`
    /// - `HeapError::Misaligned` if either bound is not a multiple of `BLOCK`
    /// - `HeapError::TableMismatch` if `table.len()` differs from the number of blocks
    pub unsafe fn new(
        table: &'a mut [BlockEntry],
        start: *mut u8,
        end: *mut u8,
    ) -> HeapResult<Self> {
        let () = Self::BLOCK_IS_POWER_OF_TWO;

        let start = NonNull::new(start).ok_or(HeapError::InvalidArgument)?;
        let size = end
            .addr()
            .checked_sub(start.addr().get())
            .ok_or(HeapError::InvalidArgument)?;

        if !is_aligned(start.addr().get(), BLOCK) || !is_aligned(end.addr(), BLOCK) {
            return Err(HeapError::Misaligned);
        }
        if table.len() != size / BLOCK {
            return Err(HeapError::TableMismatch);
        }

        table.fill(BlockEntry::FREE);

        Ok(Self { start, table })
    }

    #[must_use]
    #[inline]
    /// Returns the allocation granularity in bytes.
    pub const fn block_size(&self) -> usize {
        BLOCK
    }

    #[must_use]
    #[inline]
    /// Returns the number of blocks in the arena.
    pub const fn block_count(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    /// Returns the number of blocks not owned by any allocation.
    pub fn free_blocks(&self) -> usize {
        self.table.iter().filter(|entry| entry.is_free()).count()
    }

    #[must_use]
    #[inline]
    pub fn table(&self) -> &[BlockEntry] {
        self.table
    }

    /// Allocate `size` bytes, rounded up to a whole number of blocks.
    ///
    /// The table is scanned once from the left and the first run of free blocks
    /// that is long enough is used.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidArgument` if `size` is zero
    /// - `HeapError::OutOfMemory` if no free run is long enough, even when the
    ///   total number of free blocks would suffice
    pub fn allocate(&mut self, size: usize) -> HeapResult<NonNull<u8>> {
        if size == 0 {
            return Err(HeapError::InvalidArgument);
        }
        let blocks = align_up(size, BLOCK).ok_or(HeapError::OutOfMemory)? / BLOCK;

        let first = table::find_free_run(self.table, blocks).ok_or(HeapError::OutOfMemory)?;
        table::mark_run(self.table, first, blocks);
        Ok(self.block_ptr(first))
    }

    /// Allocate `size` bytes and fill them with zeroes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::allocate`].
    pub fn allocate_zeroed(&mut self, size: usize) -> HeapResult<NonNull<u8>> {
        let ptr = self.allocate(size)?;
        // SAFETY: The run backing `ptr` spans at least `size` bytes of the arena.
        unsafe { ptr.write_bytes(0, size) };
        Ok(ptr)
    }

    /// Move an allocation into a fresh region of `new_size` bytes.
    ///
    /// A new region is always allocated: the allocation is never grown or shrunk
    /// in place. `min(old, new)` bytes are copied before the old region is freed.
    ///
    /// - `ptr == None` behaves like [`Self::allocate`]
    /// - `new_size == 0` frees `ptr` and returns `None`
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after this call succeeds.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidPointer` if `ptr` does not start a live allocation
    /// - `HeapError::OutOfMemory` if the new region cannot be allocated, in which
    ///   case the old allocation is left untouched
    pub unsafe fn resize(
        &mut self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
    ) -> HeapResult<Option<NonNull<u8>>> {
        let Some(ptr) = ptr else {
            return self.allocate(new_size).map(Some);
        };

        let first = self.head_index(ptr)?;
        if new_size == 0 {
            table::release_run(self.table, first);
            return Ok(None);
        }

        let old_size = table::run_len(self.table, first) * BLOCK;
        let new_ptr = self.allocate(new_size)?;

        // SAFETY: Both runs are live and distinct, and each spans at least
        // `min(old_size, new_size)` bytes.
        unsafe { new_ptr.copy_from_nonoverlapping(ptr, old_size.min(new_size)) };
        table::release_run(self.table, first);

        Ok(Some(new_ptr))
    }

    /// Release the allocation starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must not be used after this call succeeds.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidPointer` if `ptr` lies outside the arena, is not block
    ///   aligned, or is not the first block of a live allocation; the table is left
    ///   untouched
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) -> HeapResult<()> {
        let first = self.head_index(ptr)?;
        table::release_run(self.table, first);
        Ok(())
    }

    #[must_use]
    /// Returns true if `ptr` lies inside the arena.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        ptr.addr()
            .get()
            .checked_sub(self.start.addr().get())
            .is_some_and(|offset| offset / BLOCK < self.table.len())
    }

    /// Translate `ptr` to the index of the block starting a live allocation.
    fn head_index(&self, ptr: NonNull<u8>) -> HeapResult<usize> {
        let offset = ptr
            .addr()
            .get()
            .checked_sub(self.start.addr().get())
            .ok_or(HeapError::InvalidPointer)?;
        if !is_aligned(offset, BLOCK) {
            return Err(HeapError::InvalidPointer);
        }

        let index = offset / BLOCK;
        match self.table.get(index) {
            Some(entry) if entry.is_head() => Ok(index),
            _ => Err(HeapError::InvalidPointer),
        }
    }

    fn block_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.table.len());
        // SAFETY: `index` is a table index, so the block lies inside the arena.
        unsafe { self.start.add(index * BLOCK) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 64;
    const BLOCKS: usize = 8;

    #[repr(C, align(64))]
    struct Arena([u8; BLOCK * BLOCKS]);

    fn with_heap(f: impl FnOnce(&mut BlockHeap<'_, BLOCK>)) {
        let mut arena = Arena([0xAA; BLOCK * BLOCKS]);
        let mut table = [BlockEntry::USED; BLOCKS];
        let range = arena.0.as_mut_ptr_range();
        let mut heap = unsafe { BlockHeap::new(&mut table, range.start, range.end) }.unwrap();
        f(&mut heap);
    }

    #[test]
    fn test_new_resets_table() {
        with_heap(|heap| {
            assert_eq!(heap.block_count(), BLOCKS);
            assert_eq!(heap.free_blocks(), BLOCKS);
            assert_eq!(heap.block_size(), BLOCK);
        });
    }

    #[test]
    fn test_new_rejects_bad_arena() {
        let mut arena = Arena([0; BLOCK * BLOCKS]);
        let range = arena.0.as_mut_ptr_range();

        let mut short = [BlockEntry::FREE; BLOCKS - 1];
        let res = unsafe { BlockHeap::<'_, BLOCK>::new(&mut short, range.start, range.end) };
        assert_eq!(res.err(), Some(HeapError::TableMismatch));

        let mut table = [BlockEntry::FREE; BLOCKS];
        let res = unsafe {
            BlockHeap::<'_, BLOCK>::new(&mut table, range.start.wrapping_add(1), range.end)
        };
        assert_eq!(res.err(), Some(HeapError::Misaligned));

        let res = unsafe {
            BlockHeap::<'_, BLOCK>::new(&mut table, range.start, range.end.wrapping_sub(8))
        };
        assert_eq!(res.err(), Some(HeapError::Misaligned));

        let res = unsafe { BlockHeap::<'_, BLOCK>::new(&mut table, range.end, range.start) };
        assert_eq!(res.err(), Some(HeapError::InvalidArgument));

        let res =
            unsafe { BlockHeap::<'_, BLOCK>::new(&mut table, core::ptr::null_mut(), range.end) };
        assert_eq!(res.err(), Some(HeapError::InvalidArgument));
    }

    #[test]
    fn test_allocate_rounds_to_blocks() {
        with_heap(|heap| {
            let a = heap.allocate(1).unwrap();
            let b = heap.allocate(BLOCK + 1).unwrap();
            assert_eq!(b.addr().get() - a.addr().get(), BLOCK);
            assert_eq!(heap.free_blocks(), BLOCKS - 3);

            let bits: [u8; 3] = [0, 1, 2].map(|i| heap.table()[i].bits());
            assert_eq!(bits, [0x05, 0x0D, 0x01]);
        });
    }

    #[test]
    fn test_allocate_zero_is_invalid() {
        with_heap(|heap| {
            assert_eq!(heap.allocate(0), Err(HeapError::InvalidArgument));
        });
    }

    #[test]
    fn test_allocate_zeroed() {
        with_heap(|heap| {
            let ptr = heap.allocate_zeroed(100).unwrap();
            let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 100) };
            assert!(bytes.iter().all(|&b| b == 0));
        });
    }

    #[test]
    fn test_free_rejects_foreign_pointers() {
        with_heap(|heap| {
            let ptr = heap.allocate(2 * BLOCK).unwrap();

            // Interior block of a live run
            let interior = unsafe { ptr.add(BLOCK) };
            assert_eq!(unsafe { heap.free(interior) }, Err(HeapError::InvalidPointer));
            // Unaligned
            let unaligned = unsafe { ptr.add(3) };
            assert_eq!(unsafe { heap.free(unaligned) }, Err(HeapError::InvalidPointer));
            // Free block
            let free = unsafe { ptr.add(4 * BLOCK) };
            assert_eq!(unsafe { heap.free(free) }, Err(HeapError::InvalidPointer));

            assert_eq!(heap.free_blocks(), BLOCKS - 2);
            assert_eq!(unsafe { heap.free(ptr) }, Ok(()));
            assert_eq!(heap.free_blocks(), BLOCKS);
            // Double free
            assert_eq!(unsafe { heap.free(ptr) }, Err(HeapError::InvalidPointer));
        });
    }

    #[test]
    fn test_resize_copies_and_moves() {
        with_heap(|heap| {
            let ptr = heap.allocate(BLOCK).unwrap();
            unsafe { ptr.write_bytes(0x42, BLOCK) };

            let grown = unsafe { heap.resize(Some(ptr), 3 * BLOCK) }.unwrap().unwrap();
            assert_ne!(grown, ptr);
            let bytes = unsafe { core::slice::from_raw_parts(grown.as_ptr(), BLOCK) };
            assert!(bytes.iter().all(|&b| b == 0x42));
            assert!(heap.table()[0].is_free());
            assert_eq!(heap.free_blocks(), BLOCKS - 3);

            let shrunk = unsafe { heap.resize(Some(grown), 10) }.unwrap().unwrap();
            assert_eq!(shrunk, ptr);
            assert_eq!(unsafe { shrunk.read() }, 0x42);
            assert_eq!(heap.free_blocks(), BLOCKS - 1);
        });
    }

    #[test]
    fn test_resize_edge_cases() {
        with_heap(|heap| {
            let ptr = unsafe { heap.resize(None, 10) }.unwrap();
            assert!(ptr.is_some());
            assert_eq!(heap.free_blocks(), BLOCKS - 1);

            assert_eq!(unsafe { heap.resize(ptr, 0) }, Ok(None));
            assert_eq!(heap.free_blocks(), BLOCKS);
        });
    }

    #[test]
    fn test_resize_out_of_memory_keeps_old() {
        with_heap(|heap| {
            let ptr = heap.allocate(4 * BLOCK).unwrap();
            let res = unsafe { heap.resize(Some(ptr), 5 * BLOCK) };
            assert_eq!(res, Err(HeapError::OutOfMemory));
            assert_eq!(heap.free_blocks(), BLOCKS - 4);
            assert!(heap.table()[0].is_head());
        });
    }

    #[test]
    fn test_contains() {
        with_heap(|heap| {
            let ptr = heap.allocate(1).unwrap();
            assert!(heap.contains(ptr));
            assert!(heap.contains(unsafe { ptr.add(BLOCK * BLOCKS - 1) }));
            assert!(!heap.contains(unsafe { ptr.add(BLOCK * BLOCKS) }));
        });
    }
}
