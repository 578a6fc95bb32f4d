//! Byte-stream view of the storage medium.
//!
//! The filesystem never talks to a disk controller directly. It asks a
//! [`StreamSource`] for independent [`BlockStream`]s, each with its own cursor,
//! so that unrelated operations never disturb each other's position.
use alloc::{rc::Rc, vec::Vec};
use core::cell::RefCell;
use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
/// An error that can occur when accessing a stream.
pub enum StreamError {
    #[error("I/O error")]
    Io,
    #[error("Out of bounds")]
    OutOfBounds,
}

pub type StreamResult<T> = Result<T, StreamError>;

/// A seekable byte stream over a storage medium.
///
/// Dropping the stream releases it.
pub trait BlockStream {
    /// Moves the cursor to the absolute byte `offset`.
    fn seek(&mut self, offset: u64) -> StreamResult<()>;
    /// Fills `dst` from the cursor, advancing it by `dst.len()`.
    ///
    /// ## Errors
    ///
    /// Fails if fewer than `dst.len()` bytes could be read.
    fn read(&mut self, dst: &mut [u8]) -> StreamResult<()>;
    /// Writes all of `src` at the cursor, advancing it by `src.len()`.
    ///
    /// ## Errors
    ///
    /// Fails if fewer than `src.len()` bytes could be written.
    fn write(&mut self, src: &[u8]) -> StreamResult<()>;
    /// Returns the current cursor.
    fn cursor(&self) -> u64;

    #[inline]
    fn read_at(&mut self, offset: u64, dst: &mut [u8]) -> StreamResult<()> {
        self.seek(offset)?;
        self.read(dst)
    }

    #[inline]
    fn write_at(&mut self, offset: u64, src: &[u8]) -> StreamResult<()> {
        self.seek(offset)?;
        self.write(src)
    }
}

/// A medium that can hand out any number of independent streams.
pub trait StreamSource {
    type Stream: BlockStream;

    /// Opens a new stream with its cursor at offset 0.
    fn open_stream(&self) -> StreamResult<Self::Stream>;
}

#[derive(Debug, Clone, Default)]
/// A medium held entirely in memory.
///
/// Clones share the same bytes.
pub struct RamDisk {
    data: Rc<RefCell<Vec<u8>>>,
}

impl RamDisk {
    #[must_use]
    #[inline]
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            data: Rc::new(RefCell::new(image)),
        }
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    /// Copies the current content of the disk.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

impl StreamSource for RamDisk {
    type Stream = RamDiskStream;

    fn open_stream(&self) -> StreamResult<Self::Stream> {
        Ok(RamDiskStream {
            data: Rc::clone(&self.data),
            cursor: 0,
        })
    }
}

#[derive(Debug)]
pub struct RamDiskStream {
    data: Rc<RefCell<Vec<u8>>>,
    cursor: u64,
}

impl RamDiskStream {
    fn range(&self, len: usize) -> StreamResult<core::ops::Range<usize>> {
        let start = usize::try_from(self.cursor).map_err(|_| StreamError::OutOfBounds)?;
        let end = start.checked_add(len).ok_or(StreamError::OutOfBounds)?;
        if end > self.data.borrow().len() {
            return Err(StreamError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl BlockStream for RamDiskStream {
    #[inline]
    fn seek(&mut self, offset: u64) -> StreamResult<()> {
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, dst: &mut [u8]) -> StreamResult<()> {
        let range = self.range(dst.len())?;
        dst.copy_from_slice(&self.data.borrow()[range]);
        self.cursor += dst.len() as u64;
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> StreamResult<()> {
        let range = self.range(src.len())?;
        self.data.borrow_mut()[range].copy_from_slice(src);
        self.cursor += src.len() as u64;
        Ok(())
    }

    #[inline]
    fn cursor(&self) -> u64 {
        self.cursor
    }
}
