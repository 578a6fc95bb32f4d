//! FAT32 filesystem driver.
//!
//! The driver reads the boot sector and the FS Information Sector at mount time
//! and keeps a copy of the first File Allocation Table in memory. Cluster
//! reservations only touch that copy and the cached FS Information Sector until
//! [`FatFs::update`] writes them back.
use crate::{
    fs::{FsError, FsResult, Path, Stat},
    stream::{BlockStream, StreamSource},
};

pub mod bs;
pub mod date;
mod dir;
pub mod dirent;
#[expect(clippy::module_inception, reason = "FAT module for the FAT filesystem")]
pub mod fat;
mod file;

use bs::{BootSector, ExtendedBootParamBlock, FsInfo, SECTOR_SIZE};
pub use dir::{Directory, Item, ItemKind};
use fat::{FatEntry, FatTable};
pub use file::FileDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A FAT32 cluster number.
pub struct Cluster(u32);

impl Cluster {
    /// Only the low 28 bits of a table entry are significant.
    pub const ENTRY_MASK: u32 = 0x0FFF_FFFF;
    /// Value written to terminate a chain.
    pub const END_OF_CHAIN: u32 = 0x0FFF_FFFF;
    /// Smallest entry value terminating a chain.
    pub const END_OF_CHAIN_MIN: u32 = 0x0FFF_FFF8;
    /// First cluster of the data region.
    pub const FIRST_DATA: u32 = 2;

    #[must_use]
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    /// Cluster 0 is used by entries that own no cluster yet.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    #[inline]
    pub const fn is_end_of_chain(self) -> bool {
        self.0 & Self::ENTRY_MASK >= Self::END_OF_CHAIN_MIN
    }

    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Geometry and allocation state of a mounted volume.
pub(crate) struct Volume {
    ebpb: ExtendedBootParamBlock,
    fs_info: FsInfo,
    table: FatTable,
    first_data_sector: u32,
    /// Clusters past this one are not backed by the data region.
    cluster_limit: u32,
}

impl Volume {
    #[must_use]
    #[inline]
    fn bytes_per_sector(&self) -> u64 {
        u64::from(self.ebpb.bytes_per_sector())
    }

    #[must_use]
    #[inline]
    pub(crate) const fn bytes_per_cluster(&self) -> u32 {
        self.ebpb.bytes_per_cluster()
    }

    #[must_use]
    #[inline]
    const fn root_cluster(&self) -> Cluster {
        Cluster::new(self.ebpb.root_cluster())
    }

    /// Returns the byte offset of the first byte of `cluster`.
    fn cluster_offset(&self, cluster: Cluster) -> FsResult<u64> {
        if cluster.value() < Cluster::FIRST_DATA || cluster.value() >= self.cluster_limit {
            return Err(FsError::Io);
        }
        let sector = u64::from(self.first_data_sector)
            + u64::from(cluster.value() - Cluster::FIRST_DATA)
                * u64::from(self.ebpb.sectors_per_cluster());
        Ok(sector * self.bytes_per_sector())
    }

    /// Reserves a free cluster and marks it as the end of a chain.
    ///
    /// The search starts at the FS Information Sector hint when it lies in the
    /// data region, and wraps once to the root cluster.
    fn reserve(&mut self) -> FsResult<Cluster> {
        let root = self.root_cluster().value();
        let hint = self.fs_info.next_free();
        let start = if (root..self.table.len()).contains(&hint) {
            hint
        } else {
            root
        };

        let cluster = self.table.find_free(start, root, self.cluster_limit)?;
        self.table.set(cluster, FatEntry::EndOfChain)?;

        self.fs_info.set_next_free(cluster.value() + 1);
        let free = self.fs_info.free_count();
        if free != FsInfo::UNKNOWN {
            self.fs_info.set_free_count(free.saturating_sub(1));
        }

        log::trace!("Reserved cluster {}", cluster.value());
        Ok(cluster)
    }

    /// Reserves a cluster and appends it to the chain ending at `last`.
    fn extend_chain(&mut self, last: Cluster) -> FsResult<Cluster> {
        let cluster = self.reserve()?;
        self.table.set(last, FatEntry::Next(cluster))?;
        Ok(cluster)
    }
}

/// A mounted FAT32 volume.
pub struct FatFs<S: StreamSource> {
    source: S,
    /// Used by file reads.
    read_stream: S::Stream,
    /// Used by file writes, entry updates and metadata flushes.
    write_stream: S::Stream,
    /// Used to scan directory clusters.
    cluster_stream: S::Stream,
    volume: Volume,
    root: Directory,
}

impl<S: StreamSource> FatFs<S> {
    /// Mounts the FAT32 volume found on `source`.
    ///
    /// ## Errors
    ///
    /// - `FsError::Io` if a stream cannot be opened or read, or if the boot
    ///   sector or the FS Information Sector is malformed
    /// - `FsError::OutOfMemory` if the allocation table cannot be loaded
    pub fn mount(source: S) -> FsResult<Self> {
        let mut read_stream = source.open_stream()?;
        let write_stream = source.open_stream()?;
        let mut cluster_stream = source.open_stream()?;

        let mut sector = [0u8; SECTOR_SIZE];
        read_stream.read_at(0, &mut sector)?;
        let ebpb = *BootSector::from_bytes(&sector).ebpb();
        if !ebpb.validate() {
            log::warn!("Boot sector does not describe a FAT32 volume");
            return Err(FsError::Io);
        }

        let bytes_per_sector = u64::from(ebpb.bytes_per_sector());
        read_stream.read_at(u64::from(ebpb.fs_info_sector()) * bytes_per_sector, &mut sector)?;
        let fs_info = FsInfo::from_bytes(&sector);
        if !fs_info.validate() {
            log::warn!("FS Information Sector signatures mismatch");
            return Err(FsError::Io);
        }

        let fat_sectors = u32::from(ebpb.fat_count())
            .checked_mul(ebpb.sectors_per_fat())
            .ok_or(FsError::Io)?;
        let first_data_sector = u32::from(ebpb.reserved_sectors())
            .checked_add(fat_sectors)
            .ok_or(FsError::Io)?;
        let total_clusters = ebpb
            .sectors_per_fat()
            .checked_mul(u32::from(ebpb.bytes_per_sector()))
            .ok_or(FsError::Io)?
            / 4;
        let data_clusters = ebpb.total_sectors().saturating_sub(first_data_sector)
            / u32::from(ebpb.sectors_per_cluster());
        let cluster_limit =
            total_clusters.min(data_clusters.saturating_add(Cluster::FIRST_DATA));

        let table = FatTable::load(
            &mut read_stream,
            u64::from(ebpb.reserved_sectors()) * bytes_per_sector,
            total_clusters,
        )?;

        let volume = Volume {
            ebpb,
            fs_info,
            table,
            first_data_sector,
            cluster_limit,
        };
        let root = Directory::root(&volume, &mut cluster_stream)?;

        log::debug!(
            "FAT32 volume: {} bytes/sector, {} sectors/cluster, {} FAT(s) of {} sectors",
            ebpb.bytes_per_sector(),
            ebpb.sectors_per_cluster(),
            ebpb.fat_count(),
            ebpb.sectors_per_fat()
        );
        log::debug!(
            "First data sector {}, {} clusters, root cluster {} with {} entries",
            first_data_sector,
            total_clusters,
            ebpb.root_cluster(),
            root.entry_count()
        );
        log::debug!(
            "{} sectors, drive {:#x}, boot signature {:#x}, volume id {:#010x}",
            ebpb.total_sectors(),
            ebpb.drive_number(),
            ebpb.boot_signature(),
            ebpb.volume_id()
        );

        Ok(Self {
            source,
            read_stream,
            write_stream,
            cluster_stream,
            volume,
            root,
        })
    }

    #[must_use]
    #[inline]
    pub const fn ebpb(&self) -> &ExtendedBootParamBlock {
        &self.volume.ebpb
    }

    #[must_use]
    #[inline]
    /// Returns the cached FS Information Sector.
    pub const fn fs_info(&self) -> &FsInfo {
        &self.volume.fs_info
    }

    #[must_use]
    #[inline]
    pub const fn table(&self) -> &FatTable {
        &self.volume.table
    }

    #[must_use]
    #[inline]
    pub const fn root(&self) -> &Directory {
        &self.root
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_cluster(&self) -> u32 {
        self.volume.bytes_per_cluster()
    }

    #[must_use]
    #[inline]
    pub const fn first_data_sector(&self) -> u32 {
        self.volume.first_data_sector
    }

    #[must_use]
    #[inline]
    /// Returns the number of entries of the allocation table.
    pub const fn total_clusters(&self) -> u32 {
        self.volume.table.len()
    }

    #[must_use]
    /// Counts the free data clusters of the in-memory table.
    pub fn free_clusters(&self) -> u32 {
        self.volume
            .table
            .count_free(Cluster::FIRST_DATA, self.volume.cluster_limit)
    }

    /// Returns the metadata of the item at `path`.
    ///
    /// ## Errors
    ///
    /// Same as path resolution in [`FatFs::open`].
    pub fn stat(&mut self, path: &str) -> FsResult<Stat> {
        let item = self.resolve(Path::new(path)?)?;
        let entry = item.entry().ok_or(FsError::InvalidArgument)?;
        Ok(Stat::new(
            entry.file_size(),
            entry.attributes().bits(),
            entry.created(),
            entry.modified(),
        ))
    }

    /// Writes the FS Information Sector and every copy of the allocation table
    /// back to the medium.
    pub fn update(&mut self) -> FsResult<()> {
        let bytes_per_sector = self.volume.bytes_per_sector();
        let ebpb = self.volume.ebpb;

        self.write_stream.write_at(
            u64::from(ebpb.fs_info_sector()) * bytes_per_sector,
            self.volume.fs_info.as_bytes(),
        )?;

        for copy in 0..u32::from(ebpb.fat_count()) {
            let sector = u64::from(ebpb.reserved_sectors())
                + u64::from(copy) * u64::from(ebpb.sectors_per_fat());
            self.volume
                .table
                .store(&mut self.write_stream, sector * bytes_per_sector)?;
        }

        log::debug!(
            "Flushed FS information ({} free) and {} FAT(s)",
            self.volume.fs_info.free_count(),
            ebpb.fat_count()
        );
        Ok(())
    }
}
