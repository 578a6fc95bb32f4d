//! In-memory FAT32 volume builder shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use storage::RamDisk;

pub const BYTES_PER_SECTOR: usize = 512;
pub const RESERVED_SECTORS: usize = 8;
pub const FS_INFO_SECTOR: usize = 1;
pub const FAT_COUNT: usize = 2;
pub const SECTORS_PER_FAT: usize = 1;
pub const TOTAL_SECTORS: usize = 136;
pub const FIRST_DATA_SECTOR: usize = RESERVED_SECTORS + FAT_COUNT * SECTORS_PER_FAT;
/// One entry per 4 bytes of a FAT.
pub const TOTAL_CLUSTERS: u32 = (SECTORS_PER_FAT * BYTES_PER_SECTOR / 4) as u32;
pub const ROOT_CLUSTER: u32 = 2;
pub const END_OF_CHAIN: u32 = 0x0FFF_FFFF;

pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// Byte offset of the first byte of `cluster`.
pub const fn cluster_offset(cluster: u32) -> usize {
    (FIRST_DATA_SECTOR + cluster as usize - 2) * BYTES_PER_SECTOR
}

/// Reads an entry of the `copy`-th FAT of a raw image.
pub fn fat_entry(image: &[u8], copy: usize, cluster: u32) -> u32 {
    let offset =
        (RESERVED_SECTORS + copy * SECTORS_PER_FAT) * BYTES_PER_SECTOR + cluster as usize * 4;
    u32::from_le_bytes(image[offset..offset + 4].try_into().unwrap())
}

/// Reads the free cluster count and next free hint of a raw image.
pub fn fs_info(image: &[u8]) -> (u32, u32) {
    let base = FS_INFO_SECTOR * BYTES_PER_SECTOR;
    let read = |at: usize| u32::from_le_bytes(image[base + at..base + at + 4].try_into().unwrap());
    (read(488), read(492))
}

/// Builds a 1 sector per cluster FAT32 image with an empty root directory.
pub struct MockVolume {
    image: Vec<u8>,
    fat: Vec<u32>,
    next_cluster: u32,
    /// Entries already placed in each directory, keyed by first cluster.
    dir_slots: HashMap<u32, usize>,
    free_count: u32,
    next_free: u32,
}

impl MockVolume {
    pub fn new() -> Self {
        let mut image = vec![0; TOTAL_SECTORS * BYTES_PER_SECTOR];
        write_boot_sector(&mut image[..BYTES_PER_SECTOR]);

        let mut fat = vec![0; TOTAL_CLUSTERS as usize];
        fat[0] = 0x0FFF_FFF8;
        fat[1] = END_OF_CHAIN;
        fat[ROOT_CLUSTER as usize] = END_OF_CHAIN;

        Self {
            image,
            fat,
            next_cluster: ROOT_CLUSTER + 1,
            dir_slots: HashMap::new(),
            free_count: TOTAL_CLUSTERS - 3,
            next_free: ROOT_CLUSTER + 1,
        }
    }

    fn allocate_chain(&mut self, clusters: usize) -> u32 {
        if clusters == 0 {
            return 0;
        }
        let first = self.next_cluster;
        for i in 0..clusters as u32 {
            let cluster = first + i;
            self.fat[cluster as usize] = if i + 1 == clusters as u32 {
                END_OF_CHAIN
            } else {
                cluster + 1
            };
        }
        self.next_cluster += clusters as u32;
        self.free_count -= clusters as u32;
        self.next_free = self.next_cluster;
        first
    }

    /// Appends a raw 32-byte entry to the directory starting at `dir`.
    ///
    /// Directories are assumed to hold a single cluster.
    pub fn add_raw_entry(&mut self, dir: u32, entry: [u8; 32]) -> &mut Self {
        let slot = self.dir_slots.entry(dir).or_default();
        let offset = cluster_offset(dir) + *slot * 32;
        *slot += 1;
        self.image[offset..offset + 32].copy_from_slice(&entry);
        self
    }

    /// Adds a file in the directory starting at `dir`, returning its first cluster.
    pub fn add_file(&mut self, dir: u32, name: &[u8; 11], contents: &[u8]) -> u32 {
        let first = self.allocate_chain(contents.len().div_ceil(BYTES_PER_SECTOR));
        for (i, chunk) in contents.chunks(BYTES_PER_SECTOR).enumerate() {
            let offset = cluster_offset(first + i as u32);
            self.image[offset..offset + chunk.len()].copy_from_slice(chunk);
        }
        self.add_raw_entry(
            dir,
            raw_entry(name, ATTR_ARCHIVE, first, contents.len() as u32),
        );
        first
    }

    /// Adds an empty directory in `dir`, returning its cluster.
    pub fn add_dir(&mut self, dir: u32, name: &[u8; 11]) -> u32 {
        let first = self.allocate_chain(1);
        self.add_raw_entry(dir, raw_entry(name, ATTR_DIRECTORY, first, 0));
        first
    }

    /// Overrides a FAT entry.
    pub fn set_fat(&mut self, cluster: u32, value: u32) -> &mut Self {
        self.fat[cluster as usize] = value;
        self
    }

    /// Marks every cluster from the next unused one on as used.
    pub fn fill(&mut self) -> &mut Self {
        for cluster in self.next_cluster..TOTAL_CLUSTERS {
            self.fat[cluster as usize] = END_OF_CHAIN;
        }
        self.free_count = 0;
        self
    }

    pub fn set_fs_info(&mut self, free_count: u32, next_free: u32) -> &mut Self {
        self.free_count = free_count;
        self.next_free = next_free;
        self
    }

    pub fn image(&self) -> Vec<u8> {
        let mut image = self.image.clone();

        let fs_info = &mut image[FS_INFO_SECTOR * BYTES_PER_SECTOR..][..BYTES_PER_SECTOR];
        fs_info[0..4].copy_from_slice(&0x4161_5252u32.to_le_bytes());
        fs_info[484..488].copy_from_slice(&0x6141_7272u32.to_le_bytes());
        fs_info[488..492].copy_from_slice(&self.free_count.to_le_bytes());
        fs_info[492..496].copy_from_slice(&self.next_free.to_le_bytes());
        fs_info[508..512].copy_from_slice(&0xAA55_0000u32.to_le_bytes());

        for copy in 0..FAT_COUNT {
            let base = (RESERVED_SECTORS + copy * SECTORS_PER_FAT) * BYTES_PER_SECTOR;
            for (i, entry) in self.fat.iter().enumerate() {
                image[base + i * 4..base + i * 4 + 4].copy_from_slice(&entry.to_le_bytes());
            }
        }
        image
    }

    pub fn build(&self) -> RamDisk {
        RamDisk::new(self.image())
    }
}

pub fn raw_entry(name: &[u8; 11], attributes: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut entry = [0; 32];
    entry[..11].copy_from_slice(name);
    entry[11] = attributes;
    entry[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    entry[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    entry[28..32].copy_from_slice(&size.to_le_bytes());
    entry
}

fn write_boot_sector(sector: &mut [u8]) {
    sector[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    sector[3..11].copy_from_slice(b"MSWIN4.1");
    sector[11..13].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
    sector[13] = 1;
    sector[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
    sector[16] = FAT_COUNT as u8;
    sector[21] = 0xF8;
    sector[32..36].copy_from_slice(&(TOTAL_SECTORS as u32).to_le_bytes());
    sector[36..40].copy_from_slice(&(SECTORS_PER_FAT as u32).to_le_bytes());
    sector[44..48].copy_from_slice(&ROOT_CLUSTER.to_le_bytes());
    sector[48..50].copy_from_slice(&(FS_INFO_SECTOR as u16).to_le_bytes());
    sector[50..52].copy_from_slice(&6u16.to_le_bytes());
    sector[66] = 0x29;
    sector[71..82].copy_from_slice(b"NO NAME    ");
    sector[82..90].copy_from_slice(b"FAT32   ");
    sector[510..512].copy_from_slice(&[0x55, 0xAA]);
}
