use super::Cluster;
use super::date::DateTime;
use crate::fs::{FsError, FsResult};

/// On-disk size of one directory slot.
pub const DIR_ENTRY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Bits of the attribute byte.
pub struct Attributes(u8);

impl Attributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    /// Attribute value of a long file name entry
    pub const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;
    /// Bits compared against `LONG_NAME`
    pub const LONG_NAME_MASK: u8 = Self::LONG_NAME | Self::DIRECTORY | Self::ARCHIVE;

    #[must_use]
    #[inline]
    pub const fn new(attributes: u8) -> Self {
        Self(attributes)
    }

    #[must_use]
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_volume_id(self) -> bool {
        self.0 & Self::VOLUME_ID != 0
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry is a piece of a long file name
    pub const fn is_long_name(self) -> bool {
        self.0 & Self::LONG_NAME_MASK == Self::LONG_NAME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An 11-byte, space padded, uppercase 8.3 name.
pub struct ShortName([u8; 11]);

impl ShortName {
    const STEM_LEN: usize = 8;
    const EXT_LEN: usize = 3;
    /// Stem kept in front of the `~1` suffix of a truncated name.
    const TRUNCATED_STEM_LEN: usize = 6;

    /// Encodes `name` in 8.3 form.
    ///
    /// Names of at most 11 characters are split at their last `.` into a stem of
    /// at most 8 characters and an extension of at most 3 characters. Longer
    /// names keep the first 6 characters of their stem followed by `~1`, and the
    /// last 3 characters of their extension. The `~1` suffix is never incremented,
    /// so two long names sharing a stem prefix encode to the same short name.
    ///
    /// ## Errors
    ///
    /// `FsError::InvalidArgument` if the name is empty, not ASCII, has an empty stem,
    /// or, when 11 characters or shorter, a stem or extension that does not fit.
    pub fn encode(name: &str) -> FsResult<Self> {
        if name.is_empty() || !name.is_ascii() {
            return Err(FsError::InvalidArgument);
        }
        let (stem, ext) = match name.rfind('.') {
            Some(dot) => (&name[..dot], &name[dot + 1..]),
            None => (name, ""),
        };
        if stem.is_empty() {
            return Err(FsError::InvalidArgument);
        }

        let mut out = [b' '; 11];
        if name.len() > out.len() {
            let stem = &stem.as_bytes()[..stem.len().min(Self::TRUNCATED_STEM_LEN)];
            out[..stem.len()].copy_from_slice(stem);
            out[stem.len()..stem.len() + 2].copy_from_slice(b"~1");

            let ext = &ext.as_bytes()[ext.len().saturating_sub(Self::EXT_LEN)..];
            out[Self::STEM_LEN..Self::STEM_LEN + ext.len()].copy_from_slice(ext);
        } else {
            if stem.len() > Self::STEM_LEN || ext.len() > Self::EXT_LEN {
                return Err(FsError::InvalidArgument);
            }
            out[..stem.len()].copy_from_slice(stem.as_bytes());
            out[Self::STEM_LEN..Self::STEM_LEN + ext.len()].copy_from_slice(ext.as_bytes());
        }

        out.make_ascii_uppercase();
        Ok(Self(out))
    }

    #[must_use]
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 11] {
        &self.0
    }
}

/// A 32-byte short name directory entry.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct DirEntry {
    name: [u8; 11],
    attributes: u8,
    _nt_reserved: u8,
    creation_time_tenths: u8,
    creation_time: u16,
    creation_date: u16,
    last_access_date: u16,
    first_cluster_high: u16,
    write_time: u16,
    write_date: u16,
    first_cluster_low: u16,
    file_size: u32,
}
const _: () = assert!(size_of::<DirEntry>() == DIR_ENTRY_SIZE);

impl DirEntry {
    /// First name byte of a deleted entry
    pub const DELETED_ENTRY: u8 = 0xE5;
    /// First name byte of the entry terminating the directory
    pub const END_OF_ENTRIES: u8 = 0x00;

    #[must_use]
    /// Creates an empty file entry with no cluster.
    pub const fn new_file(name: ShortName, timestamp: DateTime) -> Self {
        let date = timestamp.date().encode().to_le();
        let time = timestamp.time().encode().to_le();
        Self {
            name: name.0,
            attributes: Attributes::ARCHIVE,
            _nt_reserved: 0,
            creation_time_tenths: 0,
            creation_time: time,
            creation_date: date,
            last_access_date: date,
            first_cluster_high: 0,
            write_time: time,
            write_date: date,
            first_cluster_low: 0,
            file_size: 0,
        }
    }

    #[must_use]
    pub const fn from_bytes(bytes: &[u8; DIR_ENTRY_SIZE]) -> Self {
        // SAFETY: `DirEntry` is a packed plain-old-data struct of `DIR_ENTRY_SIZE` bytes.
        unsafe { bytes.as_ptr().cast::<Self>().read() }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIR_ENTRY_SIZE] {
        // SAFETY: `DirEntry` has no padding and is exactly `DIR_ENTRY_SIZE` bytes long.
        unsafe { &*(&raw const *self).cast::<[u8; DIR_ENTRY_SIZE]>() }
    }

    #[must_use]
    #[inline]
    pub const fn name(&self) -> &[u8; 11] {
        &self.name
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        Attributes::new(self.attributes)
    }

    #[must_use]
    #[inline]
    pub const fn is_end_of_entries(&self) -> bool {
        self.name[0] == Self::END_OF_ENTRIES
    }

    #[must_use]
    #[inline]
    pub const fn is_deleted(&self) -> bool {
        self.name[0] == Self::DELETED_ENTRY
    }

    #[must_use]
    #[inline]
    /// Returns true if the slot can receive a new entry.
    pub const fn is_free(&self) -> bool {
        self.is_end_of_entries() || self.is_deleted()
    }

    #[must_use]
    #[inline]
    /// Returns true if the entry names a file or a directory.
    ///
    /// Free slots, long file name pieces and the volume label do not.
    pub const fn is_item(&self) -> bool {
        let attributes = self.attributes();
        !self.is_free() && !attributes.is_long_name() && !attributes.is_volume_id()
    }

    #[must_use]
    #[inline]
    pub fn matches(&self, name: &ShortName) -> bool {
        self.name == name.0
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        let high = u16::from_le(self.first_cluster_high) as u32;
        let low = u16::from_le(self.first_cluster_low) as u32;
        Cluster::new((high << 16) | low)
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_first_cluster(&mut self, cluster: Cluster) {
        self.first_cluster_high = ((cluster.value() >> 16) as u16).to_le();
        self.first_cluster_low = (cluster.value() as u16).to_le();
    }

    #[must_use]
    #[inline]
    pub const fn file_size(&self) -> u32 {
        u32::from_le(self.file_size)
    }

    #[inline]
    pub const fn set_file_size(&mut self, size: u32) {
        self.file_size = size.to_le();
    }

    #[must_use]
    #[inline]
    pub const fn created(&self) -> DateTime {
        DateTime::decode(
            u16::from_le(self.creation_date),
            u16::from_le(self.creation_time),
        )
    }

    #[must_use]
    #[inline]
    pub const fn modified(&self) -> DateTime {
        DateTime::decode(u16::from_le(self.write_date), u16::from_le(self.write_time))
    }

    #[must_use]
    #[inline]
    pub const fn last_access_date(&self) -> u16 {
        u16::from_le(self.last_access_date)
    }

    #[must_use]
    #[inline]
    pub const fn creation_time_tenths(&self) -> u8 {
        self.creation_time_tenths
    }
}
