use crate::stream::StreamError;
use thiserror::Error;

pub mod fat;

/// Maximum length of a path, in bytes.
pub const PATH_MAX: usize = 256;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum FsError {
    #[error("I/O error")]
    Io,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("File not found")]
    FileNotFound,
    #[error("Unsupported operation")]
    Unsupported,
    #[error("Read past end of file")]
    ReadPastEnd,
    #[error("End of file")]
    EndOfFile,
    #[error("No free cluster left")]
    OutOfBounds,
    #[error("Bad file descriptor")]
    BadDescriptor,
}

impl FsError {
    /// Status code returned by the descriptor API for a successful operation.
    pub const SUCCESS: i32 = 0;

    #[must_use]
    #[inline]
    /// Returns the negative status code of the error.
    pub const fn code(self) -> i32 {
        match self {
            Self::Io => -1,
            Self::InvalidArgument => -2,
            Self::OutOfMemory => -3,
            Self::FileNotFound => -4,
            Self::Unsupported => -5,
            Self::ReadPastEnd => -6,
            Self::EndOfFile => -7,
            Self::OutOfBounds => -8,
            Self::BadDescriptor => -9,
        }
    }
}

impl From<StreamError> for FsError {
    fn from(_error: StreamError) -> Self {
        // A medium that cannot be read is indistinguishable from a failing one.
        Self::Io
    }
}

impl From<alloc::collections::TryReserveError> for FsError {
    fn from(_error: alloc::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// An absolute, `/`-separated path of at most [`PATH_MAX`] bytes.
pub struct Path<'a>(&'a str);

impl<'a> Path<'a> {
    /// Validates `path`.
    ///
    /// ## Errors
    ///
    /// `FsError::InvalidArgument` if the path is relative, longer than [`PATH_MAX`]
    /// or has no component at all.
    pub fn new(path: &'a str) -> FsResult<Self> {
        if !path.starts_with('/') || path.len() > PATH_MAX {
            return Err(FsError::InvalidArgument);
        }
        let path = Self(path);
        if path.components().next().is_none() {
            return Err(FsError::InvalidArgument);
        }
        Ok(path)
    }

    /// Iterates over the non-empty components of the path.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &'a str> + use<'a> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    #[must_use]
    /// Splits the path into its parent components and its final component.
    pub fn split_last(&self) -> (impl Iterator<Item = &'a str> + use<'a>, &'a str) {
        let last = self.components().next_back().unwrap_or_default();
        let count = self.components().count();
        (self.components().take(count.saturating_sub(1)), last)
    }

    #[must_use]
    #[inline]
    pub const fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> TryFrom<&'a str> for Path<'a> {
    type Error = FsError;

    #[inline]
    fn try_from(value: &'a str) -> FsResult<Self> {
        Self::new(value)
    }
}

bitflags::bitflags! {
    /// Flags selecting the semantics of an open descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        /// Create the file in its parent directory if it does not exist
        const CREATE = 1 << 2;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// Origin of a seek.
pub enum Whence {
    /// From the start of the file.
    Set,
    /// From the current cursor.
    Current,
    /// Backwards from the end of the file.
    ///
    /// The target is `size - offset`, so offsets count towards the start of the file.
    End,
}

impl TryFrom<u8> for Whence {
    type Error = FsError;

    fn try_from(value: u8) -> FsResult<Self> {
        match value {
            0 => Ok(Self::Set),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            _ => Err(FsError::InvalidArgument),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// Metadata of a filesystem item.
pub struct Stat {
    size: u32,
    attributes: u8,
    created: fat::date::DateTime,
    modified: fat::date::DateTime,
}

impl Default for Stat {
    fn default() -> Self {
        Self::new(
            0,
            0,
            fat::date::DateTime::DOS_EPOCH,
            fat::date::DateTime::DOS_EPOCH,
        )
    }
}

impl Stat {
    #[must_use]
    #[inline]
    pub const fn new(
        size: u32,
        attributes: u8,
        created: fat::date::DateTime,
        modified: fat::date::DateTime,
    ) -> Self {
        Self {
            size,
            attributes,
            created,
            modified,
        }
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    #[inline]
    /// Returns the raw attribute byte of the entry.
    pub const fn attributes(&self) -> u8 {
        self.attributes
    }

    #[must_use]
    #[inline]
    pub const fn file_type(&self) -> FileType {
        if self.attributes & fat::dirent::Attributes::DIRECTORY == 0 {
            FileType::File
        } else {
            FileType::Directory
        }
    }

    #[must_use]
    #[inline]
    pub const fn created(&self) -> fat::date::DateTime {
        self.created
    }

    #[must_use]
    #[inline]
    pub const fn modified(&self) -> fat::date::DateTime {
        self.modified
    }
}
