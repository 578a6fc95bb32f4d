//! Descriptor table over a mounted FAT32 volume.
//!
//! Every operation reports a status code: `0` or a non-negative count on
//! success, the negative code of an [`FsError`] on failure.
use crate::{
    fs::{
        FsError, FsResult, OpenFlags, Stat, Whence,
        fat::{FatFs, FileDescriptor},
    },
    stream::StreamSource,
};
use hashbrown::HashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle {
    id: i32,
}

impl Handle {
    pub const INVALID: Self = Self { id: -1 };

    #[must_use]
    #[inline]
    pub const fn from_raw(id: i32) -> Self {
        Self { id }
    }

    #[must_use]
    #[inline]
    pub const fn id(&self) -> i32 {
        self.id
    }
}

type OpenFiles = HashMap<Handle, FileDescriptor>;

pub struct Vfs<S: StreamSource> {
    fs: FatFs<S>,
    open_files: OpenFiles,
    next_handle: i32,
}

/// Turns a result into a status code.
fn status(result: FsResult<()>) -> i32 {
    result.map_or_else(FsError::code, |()| FsError::SUCCESS)
}

/// Turns a byte count into a status code.
#[allow(clippy::cast_possible_truncation)]
fn count_status(result: FsResult<usize>) -> isize {
    match result {
        Ok(count) => isize::try_from(count).unwrap_or(isize::MAX),
        Err(error) => error.code() as isize,
    }
}

impl<S: StreamSource> Vfs<S> {
    #[must_use]
    #[inline]
    pub fn new(fs: FatFs<S>) -> Self {
        Self {
            fs,
            open_files: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Mounts the volume found on `source`.
    pub fn mount(source: S) -> FsResult<Self> {
        FatFs::mount(source).map(Self::new)
    }

    #[must_use]
    #[inline]
    pub const fn fs(&self) -> &FatFs<S> {
        &self.fs
    }

    #[must_use]
    #[inline]
    pub fn open_count(&self) -> usize {
        self.open_files.len()
    }

    fn try_open(&mut self, path: &str, flags: u8) -> FsResult<Handle> {
        let flags = OpenFlags::from_bits(flags).ok_or(FsError::InvalidArgument)?;
        if !flags.intersects(OpenFlags::READ_WRITE) {
            return Err(FsError::InvalidArgument);
        }
        let next_handle = self.next_handle.checked_add(1).ok_or(FsError::OutOfMemory)?;
        self.open_files.try_reserve(1).map_err(|_| FsError::OutOfMemory)?;

        let fd = self.fs.open(path, flags)?;
        let handle = Handle::from_raw(self.next_handle);
        self.next_handle = next_handle;
        self.open_files.insert(handle, fd);
        Ok(handle)
    }

    /// Opens `path` with the raw `flags` bits of [`OpenFlags`].
    ///
    /// Returns the new handle, or a negative status code.
    pub fn open(&mut self, path: &str, flags: u8) -> i32 {
        match self.try_open(path, flags) {
            Ok(handle) => handle.id(),
            Err(error) => error.code(),
        }
    }

    fn descriptor(&mut self, handle: i32) -> FsResult<&mut FileDescriptor> {
        self.open_files
            .get_mut(&Handle::from_raw(handle))
            .ok_or(FsError::BadDescriptor)
    }

    /// Returns the number of bytes read, or a negative status code.
    pub fn read(&mut self, handle: i32, buf: &mut [u8]) -> isize {
        let result = match self.open_files.get_mut(&Handle::from_raw(handle)) {
            Some(fd) => self.fs.read(fd, buf),
            None => Err(FsError::BadDescriptor),
        };
        count_status(result)
    }

    /// Returns the number of bytes written, or a negative status code.
    pub fn write(&mut self, handle: i32, buf: &[u8]) -> isize {
        let result = match self.open_files.get_mut(&Handle::from_raw(handle)) {
            Some(fd) => self.fs.write(fd, buf),
            None => Err(FsError::BadDescriptor),
        };
        count_status(result)
    }

    /// Moves the cursor of `handle`; `whence` is 0 (set), 1 (current) or 2 (end).
    pub fn seek(&mut self, handle: i32, offset: u32, whence: u8) -> i32 {
        status(Whence::try_from(whence).and_then(|whence| {
            let fd = self
                .open_files
                .get_mut(&Handle::from_raw(handle))
                .ok_or(FsError::BadDescriptor)?;
            self.fs.seek(fd, offset, whence)
        }))
    }

    /// Returns the cursor of `handle`.
    pub fn tell(&mut self, handle: i32) -> FsResult<u32> {
        self.descriptor(handle).map(|fd| fd.cursor())
    }

    /// Fills `stat` with the metadata of `path`.
    pub fn stat(&mut self, path: &str, stat: &mut Stat) -> i32 {
        status(self.fs.stat(path).map(|found| *stat = found))
    }

    pub fn close(&mut self, handle: i32) -> i32 {
        status(
            self.open_files
                .remove(&Handle::from_raw(handle))
                .ok_or(FsError::BadDescriptor)
                .and_then(|fd| self.fs.close(fd)),
        )
    }

    /// Flushes the allocation metadata of the volume.
    pub fn update(&mut self) -> i32 {
        status(self.fs.update())
    }
}
