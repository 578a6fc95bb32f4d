//! Global allocator adapter.
//!
//! The block heap has no internal synchronization, so the adapter serializes every
//! access behind a spin lock. The heap is installed with [`LockedBlockHeap::init`]
//! and can be taken back with [`LockedBlockHeap::take`]; while no heap is installed,
//! every allocation fails.
//!
//! Nothing is logged while the lock is held: a logger that allocates would
//! otherwise spin on it forever.
use crate::{BlockHeap, DEFAULT_BLOCK_SIZE, HeapError, HeapResult};
use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::NonNull,
};
use spin::Mutex;

/// A spin-locked, lazily installed block heap.
///
/// ```rust,ignore
/// #[global_allocator]
/// static KERNEL_HEAP: LockedBlockHeap = LockedBlockHeap::empty();
///
/// KERNEL_HEAP.init(unsafe { BlockHeap::new(table, start, end) }?);
/// ```
pub struct LockedBlockHeap<const BLOCK: usize = DEFAULT_BLOCK_SIZE> {
    heap: Mutex<Option<BlockHeap<'static, BLOCK>>>,
}

impl<const BLOCK: usize> Default for LockedBlockHeap<BLOCK> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const BLOCK: usize> LockedBlockHeap<BLOCK> {
    #[must_use]
    #[inline]
    /// Creates an adapter with no heap installed.
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(None),
        }
    }

    /// Install `heap`, returning the previously installed heap if any.
    pub fn init(&self, heap: BlockHeap<'static, BLOCK>) -> Option<BlockHeap<'static, BLOCK>> {
        log::debug!(
            "Installing block heap: {} blocks of {} bytes",
            heap.block_count(),
            BLOCK
        );
        self.heap.lock().replace(heap)
    }

    /// Uninstall the current heap.
    ///
    /// Outstanding allocations stay valid for as long as the returned heap's
    /// arena does, but can no longer be freed through the adapter.
    pub fn take(&self) -> Option<BlockHeap<'static, BLOCK>> {
        self.heap.lock().take()
    }

    #[must_use]
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.heap.lock().is_some()
    }

    #[must_use]
    #[inline]
    /// Returns true if the heap is currently locked.
    pub fn is_locked(&self) -> bool {
        self.heap.is_locked()
    }

    /// Run `f` on the installed heap, if any.
    pub fn with_heap<R>(&self, f: impl FnOnce(&mut BlockHeap<'static, BLOCK>) -> R) -> Option<R> {
        self.heap.lock().as_mut().map(f)
    }
}

/// Turns the outcome of an allocation into a raw pointer, once the lock is released.
fn allocation_ptr(result: Option<HeapResult<NonNull<u8>>>, size: usize) -> *mut u8 {
    match result {
        Some(Ok(ptr)) => ptr.as_ptr(),
        Some(Err(HeapError::OutOfMemory)) => {
            log::warn!("Block heap exhausted: no free run for {size} bytes");
            core::ptr::null_mut()
        }
        _ => core::ptr::null_mut(),
    }
}

unsafe impl<const BLOCK: usize> GlobalAlloc for LockedBlockHeap<BLOCK> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Runs start on block boundaries, so smaller alignments come for free.
        if layout.align() > BLOCK {
            return core::ptr::null_mut();
        }
        let result = self.with_heap(|heap| heap.allocate(layout.size()));
        allocation_ptr(result, layout.size())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > BLOCK {
            return core::ptr::null_mut();
        }
        let result = self.with_heap(|heap| heap.allocate_zeroed(layout.size()));
        allocation_ptr(result, layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: The caller guarantees `ptr` is not used after `dealloc`.
        let result = self.with_heap(|heap| unsafe { heap.free(ptr) });
        if matches!(result, Some(Err(_))) {
            log::warn!("Ignoring free of foreign pointer {ptr:p}");
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > BLOCK {
            return core::ptr::null_mut();
        }
        self.with_heap(|heap| {
            // SAFETY: On success the caller stops using `ptr`; on failure the old
            // allocation is left untouched, as `GlobalAlloc::realloc` requires.
            unsafe { heap.resize(NonNull::new(ptr), new_size) }.ok()
        })
        .flatten()
        .flatten()
        .map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }
}
