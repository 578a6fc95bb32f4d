//! Block table bookkeeping.
//!
//! An allocation of `n` blocks is stored as a run of `n` consecutive entries.
//! The first entry carries `IS_FIRST` and every entry but the last carries
//! `HAS_NEXT`, so the run can be released from its first block alone.

bitflags::bitflags! {
    /// Tag describing the state of a single heap block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct BlockEntry: u8 {
        /// Block belongs to a live allocation
        const USED = 0x01;
        /// Block is the first of its allocation
        const IS_FIRST = 0x04;
        /// Allocation continues into the following block
        const HAS_NEXT = 0x08;
    }
}

impl BlockEntry {
    /// A block that is not part of any allocation.
    pub const FREE: Self = Self::empty();

    #[must_use]
    #[inline]
    pub const fn is_free(self) -> bool {
        self.is_empty()
    }

    #[must_use]
    #[inline]
    /// Returns true if the block starts a live allocation.
    pub const fn is_head(self) -> bool {
        self.contains(Self::USED.union(Self::IS_FIRST))
    }
}

/// Index of the first run of `blocks` free entries, scanning left to right.
pub fn find_free_run(table: &[BlockEntry], blocks: usize) -> Option<usize> {
    if blocks == 0 {
        return None;
    }

    let mut run_start = 0;
    let mut run_len = 0;
    for (index, entry) in table.iter().enumerate() {
        if entry.is_free() {
            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;
            if run_len == blocks {
                return Some(run_start);
            }
        } else {
            run_len = 0;
        }
    }

    None
}

/// Tags `table[first..first + blocks]` as a single allocation.
pub fn mark_run(table: &mut [BlockEntry], first: usize, blocks: usize) {
    let run = &mut table[first..first + blocks];
    let last = run.len() - 1;
    for (offset, entry) in run.iter_mut().enumerate() {
        let mut tag = BlockEntry::USED;
        if offset == 0 {
            tag |= BlockEntry::IS_FIRST;
        }
        if offset != last {
            tag |= BlockEntry::HAS_NEXT;
        }
        *entry = tag;
    }
}

/// Number of blocks in the run starting at `first`.
pub fn run_len(table: &[BlockEntry], first: usize) -> usize {
    let mut len = 0;
    for entry in &table[first..] {
        len += 1;
        if !entry.contains(BlockEntry::HAS_NEXT) {
            break;
        }
    }
    len
}

/// Clears the run starting at `first`, returning the number of freed blocks.
pub fn release_run(table: &mut [BlockEntry], first: usize) -> usize {
    let mut released = 0;
    for entry in &mut table[first..] {
        let more = entry.contains(BlockEntry::HAS_NEXT);
        *entry = BlockEntry::FREE;
        released += 1;
        if !more {
            break;
        }
    }
    released
}
