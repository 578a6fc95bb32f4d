use super::{
    Cluster, FatFs, Volume,
    date::DateTime,
    dirent::{DIR_ENTRY_SIZE, DirEntry, ShortName},
};
use crate::{
    fs::{FileType, FsError, FsResult, Path},
    stream::{BlockStream, StreamSource},
};
use core::ops::ControlFlow;

#[allow(clippy::cast_possible_truncation)]
const ENTRY_BYTES: u32 = DIR_ENTRY_SIZE as u32;

#[derive(Debug, Clone, Copy)]
/// A directory of a mounted volume.
pub struct Directory {
    /// Entry describing the directory in its parent, `None` for the root.
    entry: Option<DirEntry>,
    first_cluster: Cluster,
    current_cluster: Cluster,
    /// Live entries, excluding deleted slots and long name pieces.
    entry_count: u32,
}

impl Directory {
    pub(super) fn root(volume: &Volume, stream: &mut impl BlockStream) -> FsResult<Self> {
        let first_cluster = volume.root_cluster();
        Ok(Self {
            entry: None,
            first_cluster,
            current_cluster: first_cluster,
            entry_count: volume.entry_count(stream, first_cluster)?,
        })
    }

    fn from_entry(
        volume: &Volume,
        stream: &mut impl BlockStream,
        entry: DirEntry,
    ) -> FsResult<Self> {
        let first_cluster = entry.first_cluster();
        Ok(Self {
            entry: Some(entry),
            first_cluster,
            current_cluster: first_cluster,
            entry_count: volume.entry_count(stream, first_cluster)?,
        })
    }

    #[must_use]
    #[inline]
    pub const fn entry(&self) -> Option<&DirEntry> {
        self.entry.as_ref()
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
    pub const fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[must_use]
    #[inline]
    pub const fn is_root(&self) -> bool {
        self.entry.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ItemKind {
    File(DirEntry),
    Directory(Directory),
}

#[derive(Debug, Clone, Copy)]
/// A resolved filesystem item.
pub struct Item {
    kind: ItemKind,
    /// Byte offset of the directory entry of the item on the medium.
    entry_offset: u64,
}

impl Item {
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> &ItemKind {
        &self.kind
    }

    #[must_use]
    #[inline]
    pub const fn entry_offset(&self) -> u64 {
        self.entry_offset
    }

    #[must_use]
    #[inline]
    pub const fn file_type(&self) -> FileType {
        match self.kind {
            ItemKind::File(_) => FileType::File,
            ItemKind::Directory(_) => FileType::Directory,
        }
    }

    #[must_use]
    #[inline]
    pub const fn entry(&self) -> Option<&DirEntry> {
        match &self.kind {
            ItemKind::File(entry) => Some(entry),
            ItemKind::Directory(dir) => dir.entry(),
        }
    }

    /// Returns the entry of the item if it is a file.
    ///
    /// ## Errors
    ///
    /// `FsError::Unsupported` if the item is a directory.
    pub const fn as_file(&self) -> FsResult<&DirEntry> {
        match &self.kind {
            ItemKind::File(entry) => Ok(entry),
            ItemKind::Directory(_) => Err(FsError::Unsupported),
        }
    }

    pub const fn as_file_mut(&mut self) -> FsResult<&mut DirEntry> {
        match &mut self.kind {
            ItemKind::File(entry) => Ok(entry),
            ItemKind::Directory(_) => Err(FsError::Unsupported),
        }
    }

    /// Returns the item as a directory.
    ///
    /// ## Errors
    ///
    /// `FsError::Unsupported` if the item is a file.
    pub const fn as_directory(&self) -> FsResult<&Directory> {
        match &self.kind {
            ItemKind::Directory(dir) => Ok(dir),
            ItemKind::File(_) => Err(FsError::Unsupported),
        }
    }
}

impl Volume {
    /// Calls `f` on every entry slot of the directory starting at `first`,
    /// following its cluster chain, until `f` breaks.
    ///
    /// Returns `None` if the chain ends first.
    fn scan<T>(
        &self,
        stream: &mut impl BlockStream,
        first: Cluster,
        mut f: impl FnMut(&DirEntry, u64) -> ControlFlow<T>,
    ) -> FsResult<Option<T>> {
        let entries_per_cluster = self.bytes_per_cluster() / ENTRY_BYTES;
        let mut raw = [0u8; DIR_ENTRY_SIZE];

        for cluster in self.table.chain(first) {
            let base = self.cluster_offset(cluster)?;
            for slot in 0..entries_per_cluster {
                let offset = base + u64::from(slot * ENTRY_BYTES);
                stream.read_at(offset, &mut raw)?;
                if let ControlFlow::Break(value) = f(&DirEntry::from_bytes(&raw), offset) {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    /// Counts the live entries of a directory.
    ///
    /// Counting stops at the first end-of-entries marker.
    pub(super) fn entry_count(
        &self,
        stream: &mut impl BlockStream,
        first: Cluster,
    ) -> FsResult<u32> {
        let mut count = 0_u32;
        self.scan(stream, first, |entry, _| {
            if entry.is_end_of_entries() {
                return ControlFlow::Break(());
            }
            if entry.is_item() {
                count += 1;
            }
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }

    /// Looks `name` up in `dir`, returning the matching entry and its offset.
    fn find(
        &self,
        stream: &mut impl BlockStream,
        dir: &Directory,
        name: &ShortName,
    ) -> FsResult<(DirEntry, u64)> {
        let mut remaining = dir.entry_count;
        let found = self.scan(stream, dir.first_cluster, |entry, offset| {
            if entry.is_end_of_entries() {
                return ControlFlow::Break(None);
            }
            if !entry.is_item() {
                return ControlFlow::Continue(());
            }
            if remaining == 0 {
                return ControlFlow::Break(None);
            }
            remaining -= 1;
            if entry.matches(name) {
                ControlFlow::Break(Some((*entry, offset)))
            } else {
                ControlFlow::Continue(())
            }
        })?;
        found.flatten().ok_or(FsError::FileNotFound)
    }

    /// Returns the offset of the first reusable slot of a directory, growing
    /// the directory by one zeroed cluster if every slot is taken.
    fn free_slot(
        &mut self,
        stream: &mut impl BlockStream,
        dir: &Directory,
    ) -> FsResult<u64> {
        let slot = self.scan(stream, dir.first_cluster, |entry, offset| {
            if entry.is_free() {
                ControlFlow::Break(offset)
            } else {
                ControlFlow::Continue(())
            }
        })?;
        if let Some(offset) = slot {
            return Ok(offset);
        }

        let last = self.table.chain(dir.first_cluster).last().ok_or(FsError::Io)?;
        let cluster = self.extend_chain(last)?;
        let offset = self.cluster_offset(cluster)?;

        let zeroes = [0u8; DIR_ENTRY_SIZE];
        stream.seek(offset)?;
        for _ in 0..self.bytes_per_cluster() / ENTRY_BYTES {
            stream.write(&zeroes)?;
        }
        log::trace!("Directory at cluster {} grown", dir.first_cluster.value());

        Ok(offset)
    }
}

impl<S: StreamSource> FatFs<S> {
    /// Resolves a single `name` inside `dir`.
    fn lookup(
        &mut self,
        stream: &mut S::Stream,
        dir: &Directory,
        name: &str,
    ) -> FsResult<Item> {
        let name = ShortName::encode(name)?;
        let (entry, entry_offset) = self.volume.find(stream, dir, &name)?;

        let kind = if entry.attributes().is_directory() {
            ItemKind::Directory(Directory::from_entry(
                &self.volume,
                &mut self.cluster_stream,
                entry,
            )?)
        } else {
            ItemKind::File(entry)
        };

        Ok(Item { kind, entry_offset })
    }

    /// Resolves every component of `components`, starting from the root.
    ///
    /// Returns the root directory for an empty iterator.
    fn walk<'a>(
        &mut self,
        stream: &mut S::Stream,
        components: impl Iterator<Item = &'a str>,
    ) -> FsResult<Directory> {
        let mut dir = self.root;
        for name in components {
            let item = self.lookup(stream, &dir, name)?;
            dir = *item.as_directory()?;
        }
        Ok(dir)
    }

    /// Resolves `path` to an item.
    ///
    /// Name lookups use a stream of their own so that the cursors of the
    /// driver streams are left alone.
    ///
    /// ## Errors
    ///
    /// - `FsError::FileNotFound` if a component does not exist
    /// - `FsError::Unsupported` if a parent component is a file
    /// - `FsError::InvalidArgument` if a component is not a valid short name
    pub(super) fn resolve(&mut self, path: Path<'_>) -> FsResult<Item> {
        let mut stream = self.source.open_stream()?;
        let (parents, last) = path.split_last();
        let parent = self.walk(&mut stream, parents)?;
        self.lookup(&mut stream, &parent, last)
    }

    /// Creates an empty file at `path`, whose parent must exist.
    pub(super) fn create(&mut self, path: Path<'_>) -> FsResult<Item> {
        let mut stream = self.source.open_stream()?;
        let (parents, last) = path.split_last();
        let name = ShortName::encode(last)?;
        let parent = self.walk(&mut stream, parents)?;

        let entry = DirEntry::new_file(name, DateTime::DOS_EPOCH);
        let entry_offset = self.volume.free_slot(&mut self.write_stream, &parent)?;
        self.write_stream.write_at(entry_offset, entry.as_bytes())?;

        if parent.is_root() {
            self.root.entry_count += 1;
        }
        log::trace!("Created {}", path.as_str());

        Ok(Item {
            kind: ItemKind::File(entry),
            entry_offset,
        })
    }
}
