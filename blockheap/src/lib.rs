//! # Blockheap: fixed-block `no_std` heap
//!
//! Blockheap manages a flat memory arena as a sequence of equally sized blocks.
//! Every block is described by a one-byte tag in a caller-provided block table,
//! so the allocator itself never needs dynamic memory.
//!
//! ## Architecture
//!
//! - **Block table**: one [`BlockEntry`] per block, recording whether the block is
//!   used, whether it starts an allocation and whether the allocation continues
//!   into the following block.
//! - **Block heap**: first-fit search for a contiguous run of free blocks.
//!   Allocation is rounded up to whole blocks and is never resized in place.
//! - **Locked heap**: a spin-locked wrapper implementing [`core::alloc::GlobalAlloc`],
//!   so the block heap can back `alloc::boxed::Box` and `alloc::vec::Vec`.
//!
//! ## Usage
//!
//! ```rust
//! use blockheap::{BlockEntry, BlockHeap};
//!
//! #[repr(C, align(64))]
//! struct Arena([u8; 64 * 16]);
//!
//! let mut arena = Arena([0; 64 * 16]);
//! let mut table = [BlockEntry::FREE; 16];
//! let range = arena.0.as_mut_ptr_range();
//!
//! let mut heap =
//!     unsafe { BlockHeap::<'_, 64>::new(&mut table, range.start, range.end) }.unwrap();
//!
//! let ptr = heap.allocate(100).unwrap();
//! assert_eq!(heap.free_blocks(), 14);
//!
//! unsafe { heap.free(ptr) }.unwrap();
//! assert_eq!(heap.free_blocks(), 16);
//! ```
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

mod error;
mod heap;
mod locked;
mod table;
mod utils;

pub use error::{HeapError, HeapResult};
pub use heap::BlockHeap;
pub use locked::LockedBlockHeap;
pub use table::BlockEntry;

/// Default size of a heap block, in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;
