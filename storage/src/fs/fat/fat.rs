use super::Cluster;
use crate::fs::{FsError, FsResult};
use crate::stream::BlockStream;
use alloc::vec::Vec;

/// Entries moved per stream access when loading or storing the table.
const ENTRIES_PER_CHUNK: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Decoded FAT32 table entry
pub enum FatEntry {
    /// Free cluster
    Free,
    /// Used cluster, pointing to the next cluster in the chain
    Next(Cluster),
    /// Last cluster in the chain
    EndOfChain,
    /// Bad cluster
    Bad,
    /// Reserved value
    Reserved,
}

impl FatEntry {
    #[must_use]
    pub const fn decode(raw: u32) -> Self {
        match raw & Cluster::ENTRY_MASK {
            0 => Self::Free,
            0x0FFF_FFF7 => Self::Bad,
            1 | 0x0FFF_FFF0..=0x0FFF_FFF6 => Self::Reserved,
            0x0FFF_FFF8..=0x0FFF_FFFF => Self::EndOfChain,
            value => Self::Next(Cluster::new(value)),
        }
    }

    #[must_use]
    pub const fn encode(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::Next(next) => next.value() & Cluster::ENTRY_MASK,
            Self::EndOfChain => Cluster::END_OF_CHAIN,
            Self::Bad => 0x0FFF_FFF7,
            Self::Reserved => 0x0FFF_FFF6,
        }
    }
}

/// Memory-resident copy of one File Allocation Table.
pub struct FatTable {
    entries: Vec<u32>,
}

impl FatTable {
    /// Reads `len` entries starting at byte `offset` of `stream`.
    ///
    /// ## Errors
    ///
    /// - `FsError::OutOfMemory` if the table cannot be allocated
    /// - `FsError::Io` if the stream fails
    pub fn load(stream: &mut impl BlockStream, offset: u64, len: u32) -> FsResult<Self> {
        let len = usize::try_from(len).map_err(|_| FsError::OutOfMemory)?;
        let mut entries = Vec::new();
        entries.try_reserve_exact(len)?;

        let mut buffer = [0u8; ENTRIES_PER_CHUNK * 4];
        stream.seek(offset)?;
        while entries.len() < len {
            let count = (len - entries.len()).min(ENTRIES_PER_CHUNK);
            let bytes = &mut buffer[..count * 4];
            stream.read(bytes)?;
            entries.extend(
                bytes
                    .chunks_exact(4)
                    .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            );
        }

        Ok(Self { entries })
    }

    /// Writes the whole table at byte `offset` of `stream`.
    pub fn store(&self, stream: &mut impl BlockStream, offset: u64) -> FsResult<()> {
        let mut buffer = [0u8; ENTRIES_PER_CHUNK * 4];
        stream.seek(offset)?;
        for chunk in self.entries.chunks(ENTRIES_PER_CHUNK) {
            for (raw, entry) in buffer.chunks_exact_mut(4).zip(chunk) {
                raw.copy_from_slice(&entry.to_le_bytes());
            }
            stream.write(&buffer[..chunk.len() * 4])?;
        }
        Ok(())
    }

    #[must_use]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    /// Returns the number of entries in the table.
    pub const fn len(&self) -> u32 {
        // Built from a `u32` length.
        self.entries.len() as u32
    }

    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    #[inline]
    /// Returns the low 28 bits of the entry of `cluster`.
    ///
    /// Clusters outside the table read as end-of-chain.
    pub fn raw(&self, cluster: Cluster) -> u32 {
        self.entries
            .get(cluster.index())
            .map_or(Cluster::END_OF_CHAIN, |entry| entry & Cluster::ENTRY_MASK)
    }

    #[must_use]
    #[inline]
    pub fn get(&self, cluster: Cluster) -> FatEntry {
        FatEntry::decode(self.raw(cluster))
    }

    /// Sets the entry of `cluster`, preserving its 4 reserved high bits.
    pub fn set(&mut self, cluster: Cluster, entry: FatEntry) -> FsResult<()> {
        let slot = self
            .entries
            .get_mut(cluster.index())
            .ok_or(FsError::OutOfBounds)?;
        *slot = (*slot & !Cluster::ENTRY_MASK) | entry.encode();
        Ok(())
    }

    #[must_use]
    /// Returns the cluster following `cluster`, or `None` at the end of the chain.
    ///
    /// Entries that do not name a data cluster of this table end the chain too.
    pub fn next(&self, cluster: Cluster) -> Option<Cluster> {
        match self.get(cluster) {
            FatEntry::Next(next) if next.index() < self.entries.len() => Some(next),
            _ => None,
        }
    }

    /// Looks for a free cluster in `[start, limit)`, then once more in `[restart, limit)`.
    ///
    /// ## Errors
    ///
    /// `FsError::OutOfBounds` if both passes fail.
    pub fn find_free(&self, start: u32, restart: u32, limit: u32) -> FsResult<Cluster> {
        let limit = limit.min(self.len());
        let scan = |from: u32| {
            (from..limit)
                .map(Cluster::new)
                .find(|&cluster| self.get(cluster) == FatEntry::Free)
        };
        scan(start)
            .or_else(|| scan(restart))
            .ok_or(FsError::OutOfBounds)
    }

    /// Counts the free entries in `[first, limit)`.
    #[must_use]
    pub fn count_free(&self, first: u32, limit: u32) -> u32 {
        let limit = limit.min(self.len());
        let free = (first..limit)
            .filter(|&c| self.get(Cluster::new(c)) == FatEntry::Free)
            .count();
        u32::try_from(free).unwrap_or(u32::MAX)
    }

    /// Iterates over the clusters of the chain starting at `start`.
    ///
    /// The iteration stops after `len()` clusters so that a looping chain
    /// cannot be followed forever.
    pub fn chain(&self, start: Cluster) -> impl Iterator<Item = Cluster> + '_ {
        core::iter::successors(Some(start), |&cluster| self.next(cluster)).take(self.entries.len())
    }
}
