use super::{Cluster, FatFs, Item, Volume, dirent::DirEntry};
use crate::{
    fs::{FsError, FsResult, OpenFlags, Path, Whence},
    stream::{BlockStream, StreamSource},
};

#[derive(Debug)]
/// An open file or directory.
///
/// The descriptor owns a copy of the directory entry of its item. Writes update
/// that copy and store it back at its original offset. [`FatFs::close`] consumes
/// the descriptor, so it cannot be used once closed.
pub struct FileDescriptor {
    item: Item,
    flags: OpenFlags,
    first_cluster: Cluster,
    current_cluster: Cluster,
    /// Position of `current_cluster` in the chain.
    cluster_index: u32,
    cursor: u32,
}

impl FileDescriptor {
    fn new(item: Item, flags: OpenFlags) -> Self {
        let first_cluster = item
            .entry()
            .map_or(Cluster::new(0), DirEntry::first_cluster);
        Self {
            item,
            flags,
            first_cluster,
            current_cluster: first_cluster,
            cluster_index: 0,
            cursor: 0,
        }
    }

    #[must_use]
    #[inline]
    pub const fn item(&self) -> &Item {
        &self.item
    }

    #[must_use]
    #[inline]
    pub const fn flags(&self) -> OpenFlags {
        self.flags
    }

    #[must_use]
    #[inline]
    pub const fn cursor(&self) -> u32 {
        self.cursor
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }

    #[must_use]
    #[inline]
    pub const fn current_cluster(&self) -> Cluster {
        self.current_cluster
    }

    #[must_use]
    #[inline]
    /// Returns the recorded size of the file, 0 for directories.
    pub fn size(&self) -> u32 {
        self.item.as_file().map_or(0, |entry| entry.file_size())
    }
}

impl Volume {
    /// Moves `fd` to the cluster of index `index` in its chain.
    ///
    /// When `allocate` is set, missing clusters are reserved and linked, and a
    /// file without any cluster receives its first one. Otherwise, returns
    /// `false` if the chain is too short.
    fn advance(&mut self, fd: &mut FileDescriptor, index: u32, allocate: bool) -> FsResult<bool> {
        if fd.first_cluster.is_none() {
            if !allocate {
                return Ok(false);
            }
            let first = self.reserve()?;
            fd.item.as_file_mut()?.set_first_cluster(first);
            fd.first_cluster = first;
            fd.current_cluster = first;
            fd.cluster_index = 0;
        }

        if index < fd.cluster_index {
            fd.current_cluster = fd.first_cluster;
            fd.cluster_index = 0;
        }

        while fd.cluster_index < index {
            let next = match self.table.next(fd.current_cluster) {
                Some(next) => next,
                None if allocate => self.extend_chain(fd.current_cluster)?,
                None => return Ok(false),
            };
            fd.current_cluster = next;
            fd.cluster_index += 1;
        }

        Ok(true)
    }
}

impl<S: StreamSource> FatFs<S> {
    /// Opens the item at `path`.
    ///
    /// With `OpenFlags::CREATE`, a missing final component is created as an
    /// empty file in its existing parent directory.
    ///
    /// ## Errors
    ///
    /// - `FsError::InvalidArgument` if the path is malformed
    /// - `FsError::FileNotFound` if a component does not exist
    /// - `FsError::Unsupported` if a parent component is a file
    /// - `FsError::Io` if the medium fails
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<FileDescriptor> {
        let path = Path::new(path)?;
        let item = match self.resolve(path) {
            Err(FsError::FileNotFound) if flags.contains(OpenFlags::CREATE) => {
                self.create(path)?
            }
            result => result?,
        };
        Ok(FileDescriptor::new(item, flags))
    }

    /// Reads from the cursor of `fd` into `buf`.
    ///
    /// Reads are clamped to the recorded file size and stop early if the
    /// cluster chain ends. The cursor advances by the number of bytes read.
    ///
    /// ## Errors
    ///
    /// - `FsError::Unsupported` if `fd` was not opened for reading or is a directory
    /// - `FsError::ReadPastEnd` if the cursor is at or past the end of the file
    /// - `FsError::Io` if the medium fails
    #[allow(clippy::cast_possible_truncation)]
    pub fn read(&mut self, fd: &mut FileDescriptor, buf: &mut [u8]) -> FsResult<usize> {
        if !fd.flags.contains(OpenFlags::READ) {
            return Err(FsError::Unsupported);
        }
        let size = fd.item.as_file()?.file_size();
        if fd.cursor >= size {
            return Err(FsError::ReadPastEnd);
        }

        let count = usize::try_from(size - fd.cursor).map_or(buf.len(), |left| left.min(buf.len()));
        let cluster_size = self.volume.bytes_per_cluster();
        let mut done = 0;

        while done < count {
            let index = fd.cursor / cluster_size;
            if !self.volume.advance(fd, index, false)? {
                break;
            }
            let in_cluster = fd.cursor % cluster_size;
            let len = (count - done).min((cluster_size - in_cluster) as usize);
            let offset = self.volume.cluster_offset(fd.current_cluster)? + u64::from(in_cluster);

            self.read_stream.read_at(offset, &mut buf[done..done + len])?;

            done += len;
            fd.cursor += len as u32;
        }

        Ok(done)
    }

    /// Writes `buf` at the cursor of `fd`, reserving clusters as needed.
    ///
    /// The recorded size grows by `buf.len()`, and the directory entry is
    /// stored back on the medium. Running out of clusters midway stops the
    /// write: the size then only grows by the bytes actually written, the entry
    /// is still stored, and `FsError::OutOfBounds` is returned.
    ///
    /// ## Errors
    ///
    /// - `FsError::Unsupported` if `fd` was not opened for writing or is a directory
    /// - `FsError::InvalidArgument` if the file would outgrow 4 GiB
    /// - `FsError::OutOfBounds` if no free cluster is left
    /// - `FsError::Io` if the medium fails
    #[allow(clippy::cast_possible_truncation)]
    pub fn write(&mut self, fd: &mut FileDescriptor, buf: &[u8]) -> FsResult<usize> {
        if !fd.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::Unsupported);
        }
        let size = fd.item.as_file()?.file_size();
        let requested = u32::try_from(buf.len()).map_err(|_| FsError::InvalidArgument)?;
        if fd.cursor.checked_add(requested).is_none() || size.checked_add(requested).is_none() {
            return Err(FsError::InvalidArgument);
        }

        let cluster_size = self.volume.bytes_per_cluster();
        let mut done = 0;
        let mut failure = None;

        while done < buf.len() {
            let index = fd.cursor / cluster_size;
            if let Err(error) = self.volume.advance(fd, index, true) {
                failure = Some(error);
                break;
            }
            let in_cluster = fd.cursor % cluster_size;
            let len = (buf.len() - done).min((cluster_size - in_cluster) as usize);
            let offset = self.volume.cluster_offset(fd.current_cluster)? + u64::from(in_cluster);

            self.write_stream.write_at(offset, &buf[done..done + len])?;

            done += len;
            fd.cursor += len as u32;
        }

        let grown = if failure.is_some() {
            done as u32
        } else {
            requested
        };
        let entry = fd.item.as_file_mut()?;
        entry.set_file_size(size + grown);
        self.write_stream
            .write_at(fd.item.entry_offset(), fd.item.as_file()?.as_bytes())?;

        match failure {
            Some(error) => Err(error),
            None => Ok(done),
        }
    }

    /// Moves the cursor of `fd`.
    ///
    /// The target may equal the file size. When it lies exactly on the end of
    /// the last cluster of the chain, the descriptor stays on that cluster.
    ///
    /// ## Errors
    ///
    /// - `FsError::InvalidArgument` if the target is outside the file or `fd` is a directory
    /// - `FsError::EndOfFile` if the cluster chain is shorter than the file size
    pub fn seek(&mut self, fd: &mut FileDescriptor, offset: u32, whence: Whence) -> FsResult<()> {
        let size = fd
            .item
            .as_file()
            .map_err(|_| FsError::InvalidArgument)?
            .file_size();
        let target = match whence {
            Whence::Set => Some(offset),
            Whence::Current => fd.cursor.checked_add(offset),
            Whence::End => size.checked_sub(offset),
        }
        .filter(|&target| target <= size)
        .ok_or(FsError::InvalidArgument)?;

        let cluster_size = self.volume.bytes_per_cluster();
        let index = target / cluster_size;

        let mut cluster = fd.first_cluster;
        let mut reached = 0;
        if !cluster.is_none() {
            while reached < index {
                match self.volume.table.next(cluster) {
                    Some(next) => cluster = next,
                    None => break,
                }
                reached += 1;
            }
        }

        let on_chain_end = target % cluster_size == 0 && reached + 1 == index;
        if reached < index && !on_chain_end {
            return Err(FsError::EndOfFile);
        }

        fd.current_cluster = cluster;
        fd.cluster_index = reached;
        fd.cursor = target;
        Ok(())
    }

    /// Releases `fd` and the directory entry it owns.
    ///
    /// Metadata is not flushed; see [`FatFs::update`].
    ///
    /// ```compile_fail,E0382
    /// # use storage::{RamDisk, fs::{OpenFlags, fat::FatFs}};
    /// # fn reuse(mut fs: FatFs<RamDisk>) {
    /// let mut fd = fs.open("/hello.txt", OpenFlags::READ).unwrap();
    /// fs.close(fd).unwrap();
    /// let _ = fs.read(&mut fd, &mut [0; 4]);
    /// # }
    /// ```
    pub fn close(&mut self, fd: FileDescriptor) -> FsResult<()> {
        log::trace!("Closed descriptor at entry offset {}", fd.item.entry_offset());
        Ok(())
    }
}
