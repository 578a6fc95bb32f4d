use thiserror::Error;

/// Errors that can occur during block heap operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Null arena, inverted bounds or zero-sized request
    #[error("Invalid argument")]
    InvalidArgument,
    /// Arena bounds are not aligned to the block size
    #[error("Arena is not block aligned")]
    Misaligned,
    /// The block table does not describe the arena exactly
    #[error("Block table length does not match arena size")]
    TableMismatch,
    /// No run of free blocks is long enough
    #[error("Out of memory")]
    OutOfMemory,
    /// Pointer is not the start of a live allocation
    #[error("Invalid pointer")]
    InvalidPointer,
}

pub type HeapResult<T> = core::result::Result<T, HeapError>;
