//! Boot sector and FS Information Sector of a FAT32 volume.
//!
//! Both structures are read straight from their on-disk bytes. Multi-byte fields
//! are stored little endian and converted by the accessors.

/// Size of both the boot sector and the FS Information Sector.
pub const SECTOR_SIZE: usize = 512;

/// Generic part of the BIOS Parameter Block (BPB).
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
struct BootParamBlockStart {
    /// Sector size in bytes: 512, 1024, 2048 or 4096.
    bytes_per_sector: u16,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    fat_count: u8,
    /// Always 0 on FAT32.
    _root_entries: u16,
    /// 0 when the count does not fit, in which case `total_sectors_large` is used.
    total_sectors: u16,
    /// Media descriptor, 0xF8 on non-removable media.
    media_descriptor: u8,
    /// Always 0 on FAT32.
    _sectors_per_fat: u16,
    _sectors_per_track: u16,
    _heads: u16,
    hidden_sectors: u32,
    total_sectors_large: u32,
}

/// Trailing part of the BPB, common to all FAT types.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
struct BootParamBlockEnd {
    drive_number: u8,
    _reserved: u8,
    /// 0x29 when the three following fields are valid.
    boot_signature: u8,
    volume_id: u32,
    volume_label: [u8; 11],
    _fs_type: [u8; 8],
}

/// Extended BIOS Parameter Block of a FAT32 volume.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct ExtendedBootParamBlock {
    bpb_start: BootParamBlockStart,

    /// Sectors occupied by one FAT.
    sectors_per_fat_large: u32,
    _flags: u16,
    _version: u16,
    /// First cluster of the root directory chain.
    root_cluster: u32,
    /// Sector holding the FSInfo structure, relative to the volume start.
    fs_info_sector: u16,
    /// Sector holding a copy of the boot sector.
    backup_boot_sector: u16,
    _reserved: [u8; 12],

    bpb_end: BootParamBlockEnd,
}

impl ExtendedBootParamBlock {
    #[must_use]
    #[inline]
    pub const fn bytes_per_sector(&self) -> u16 {
        u16::from_le(self.bpb_start.bytes_per_sector)
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.bpb_start.sectors_per_cluster
    }

    #[must_use]
    #[inline]
    pub const fn reserved_sectors(&self) -> u16 {
        u16::from_le(self.bpb_start.reserved_sectors)
    }

    #[must_use]
    #[inline]
    pub const fn fat_count(&self) -> u8 {
        self.bpb_start.fat_count
    }

    #[must_use]
    #[inline]
    #[allow(clippy::cast_lossless)]
    /// Total sector count, whichever of the two fields carries it.
    pub const fn total_sectors(&self) -> u32 {
        let small = u16::from_le(self.bpb_start.total_sectors);
        if small != 0 {
            small as u32
        } else {
            u32::from_le(self.bpb_start.total_sectors_large)
        }
    }

    #[must_use]
    #[inline]
    pub const fn media_descriptor(&self) -> u8 {
        self.bpb_start.media_descriptor
    }

    #[must_use]
    #[inline]
    /// Returns the number of sectors occupied by one FAT.
    pub const fn sectors_per_fat(&self) -> u32 {
        u32::from_le(self.sectors_per_fat_large)
    }

    #[must_use]
    #[inline]
    pub const fn hidden_sectors(&self) -> u32 {
        u32::from_le(self.bpb_start.hidden_sectors)
    }

    #[must_use]
    #[inline]
    pub const fn root_cluster(&self) -> u32 {
        u32::from_le(self.root_cluster)
    }

    #[must_use]
    #[inline]
    pub const fn fs_info_sector(&self) -> u16 {
        u16::from_le(self.fs_info_sector)
    }

    #[must_use]
    #[inline]
    pub const fn backup_boot_sector(&self) -> u16 {
        u16::from_le(self.backup_boot_sector)
    }

    #[must_use]
    #[inline]
    pub const fn drive_number(&self) -> u8 {
        self.bpb_end.drive_number
    }

    #[must_use]
    #[inline]
    pub const fn boot_signature(&self) -> u8 {
        self.bpb_end.boot_signature
    }

    #[must_use]
    #[inline]
    pub const fn volume_id(&self) -> u32 {
        u32::from_le(self.bpb_end.volume_id)
    }

    #[must_use]
    #[inline]
    pub const fn volume_label(&self) -> [u8; 11] {
        self.bpb_end.volume_label
    }

    #[must_use]
    #[inline]
    #[allow(clippy::cast_lossless)]
    /// Returns the number of bytes per cluster.
    pub const fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector() as u32 * self.sectors_per_cluster() as u32
    }

    #[must_use]
    pub const fn validate(&self) -> bool {
        let bps = self.bytes_per_sector();
        let spc = self.sectors_per_cluster();

        if !bps.is_power_of_two() || bps < 512 || bps > 4096 {
            return false;
        }
        if !spc.is_power_of_two() {
            return false;
        }
        if self.reserved_sectors() == 0 || self.fs_info_sector() >= self.reserved_sectors() {
            return false;
        }
        if self.fat_count() == 0 || self.sectors_per_fat() == 0 {
            return false;
        }
        // The root directory must be a data cluster.
        self.root_cluster() >= 2
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct BootSector {
    _boot_jump: [u8; 3],
    _oem_name: [u8; 8],
    ebpb: ExtendedBootParamBlock,
    _boot_code: [u8; 420],
    /// 0x55 0xAA
    _boot_signature: [u8; 2],
}
const _: () = assert!(size_of::<BootSector>() == SECTOR_SIZE);

impl BootSector {
    #[must_use]
    pub const fn from_bytes(bytes: &[u8; SECTOR_SIZE]) -> Self {
        // SAFETY: `BootSector` is a packed plain-old-data struct of `SECTOR_SIZE` bytes,
        // so any byte pattern is a valid value and no alignment is required.
        unsafe { bytes.as_ptr().cast::<Self>().read() }
    }

    #[must_use]
    #[inline]
    pub const fn ebpb(&self) -> &ExtendedBootParamBlock {
        &self.ebpb
    }
}

/// FS Information Sector.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct FsInfo {
    lead_signature: u32,
    _reserved1: [u8; 480],
    struct_signature: u32,
    /// Last known number of free clusters, or [`FsInfo::UNKNOWN`].
    free_count: u32,
    /// Cluster where the search for a free cluster should start, or [`FsInfo::UNKNOWN`].
    next_free: u32,
    _reserved2: [u8; 12],
    trail_signature: u32,
}
const _: () = assert!(size_of::<FsInfo>() == SECTOR_SIZE);

impl FsInfo {
    pub const LEAD_SIGNATURE: u32 = 0x4161_5252;
    pub const STRUCT_SIGNATURE: u32 = 0x6141_7272;
    pub const TRAIL_SIGNATURE: u32 = 0xAA55_0000;
    /// Sentinel for an unknown free count or hint.
    pub const UNKNOWN: u32 = 0xFFFF_FFFF;

    #[must_use]
    pub const fn from_bytes(bytes: &[u8; SECTOR_SIZE]) -> Self {
        // SAFETY: `FsInfo` is a packed plain-old-data struct of `SECTOR_SIZE` bytes.
        unsafe { bytes.as_ptr().cast::<Self>().read() }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SECTOR_SIZE] {
        // SAFETY: `FsInfo` has no padding and is exactly `SECTOR_SIZE` bytes long.
        unsafe { &*(&raw const *self).cast::<[u8; SECTOR_SIZE]>() }
    }

    #[must_use]
    /// Returns true if the three magic values are present.
    pub const fn validate(&self) -> bool {
        u32::from_le(self.lead_signature) == Self::LEAD_SIGNATURE
            && u32::from_le(self.struct_signature) == Self::STRUCT_SIGNATURE
            && u32::from_le(self.trail_signature) == Self::TRAIL_SIGNATURE
    }

    #[must_use]
    #[inline]
    pub const fn free_count(&self) -> u32 {
        u32::from_le(self.free_count)
    }

    #[inline]
    pub const fn set_free_count(&mut self, count: u32) {
        self.free_count = count.to_le();
    }

    #[must_use]
    #[inline]
    pub const fn next_free(&self) -> u32 {
        u32::from_le(self.next_free)
    }

    #[inline]
    pub const fn set_next_free(&mut self, cluster: u32) {
        self.next_free = cluster.to_le();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fat32_boot_sector() -> [u8; SECTOR_SIZE] {
        let mut bytes = [0u8; SECTOR_SIZE];
        bytes[11..13].copy_from_slice(&512u16.to_le_bytes());
        bytes[13] = 8;
        bytes[14..16].copy_from_slice(&32u16.to_le_bytes());
        bytes[16] = 2;
        bytes[32..36].copy_from_slice(&1_000_000u32.to_le_bytes());
        bytes[36..40].copy_from_slice(&1000u32.to_le_bytes());
        bytes[44..48].copy_from_slice(&2u32.to_le_bytes());
        bytes[48..50].copy_from_slice(&1u16.to_le_bytes());
        bytes[50..52].copy_from_slice(&6u16.to_le_bytes());
        bytes[64] = 0x80;
        bytes[66] = 0x29;
        bytes[67..71].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        bytes[510] = 0x55;
        bytes[511] = 0xAA;
        bytes
    }

    #[test]
    fn test_field_offsets() {
        let bs = BootSector::from_bytes(&fat32_boot_sector());
        let ebpb = bs.ebpb();
        assert_eq!(ebpb.bytes_per_sector(), 512);
        assert_eq!(ebpb.sectors_per_cluster(), 8);
        assert_eq!(ebpb.reserved_sectors(), 32);
        assert_eq!(ebpb.fat_count(), 2);
        assert_eq!(ebpb.total_sectors(), 1_000_000);
        assert_eq!(ebpb.sectors_per_fat(), 1000);
        assert_eq!(ebpb.root_cluster(), 2);
        assert_eq!(ebpb.fs_info_sector(), 1);
        assert_eq!(ebpb.backup_boot_sector(), 6);
        assert_eq!(ebpb.drive_number(), 0x80);
        assert_eq!(ebpb.boot_signature(), 0x29);
        assert_eq!(ebpb.volume_id(), 0xDEAD_BEEF);
        assert_eq!(ebpb.bytes_per_cluster(), 4096);
        assert!(ebpb.validate());
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let mut bytes = fat32_boot_sector();
        bytes[11..13].copy_from_slice(&500u16.to_le_bytes());
        assert!(!BootSector::from_bytes(&bytes).ebpb().validate());

        let mut bytes = fat32_boot_sector();
        bytes[13] = 3;
        assert!(!BootSector::from_bytes(&bytes).ebpb().validate());

        let mut bytes = fat32_boot_sector();
        bytes[36..40].copy_from_slice(&0u32.to_le_bytes());
        assert!(!BootSector::from_bytes(&bytes).ebpb().validate());
    }

    #[test]
    fn test_fs_info_signatures() {
        let mut bytes = [0u8; SECTOR_SIZE];
        bytes[0..4].copy_from_slice(&FsInfo::LEAD_SIGNATURE.to_le_bytes());
        bytes[484..488].copy_from_slice(&FsInfo::STRUCT_SIGNATURE.to_le_bytes());
        bytes[488..492].copy_from_slice(&100u32.to_le_bytes());
        bytes[492..496].copy_from_slice(&5u32.to_le_bytes());
        bytes[508..512].copy_from_slice(&FsInfo::TRAIL_SIGNATURE.to_le_bytes());

        let mut info = FsInfo::from_bytes(&bytes);
        assert!(info.validate());
        assert_eq!(info.free_count(), 100);
        assert_eq!(info.next_free(), 5);

        info.set_next_free(9);
        assert_eq!(&info.as_bytes()[492..496], &9u32.to_le_bytes());

        bytes[508] ^= 0xFF;
        assert!(!FsInfo::from_bytes(&bytes).validate());
    }
}
