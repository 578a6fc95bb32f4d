mod common;

use common::*;
use storage::{
    fs::{FsError, OpenFlags, Stat},
    vfs::Vfs,
};

const READ: u8 = OpenFlags::READ.bits();
const WRITE: u8 = OpenFlags::WRITE.bits();
const CREATE: u8 = OpenFlags::CREATE.bits();

fn vfs() -> Vfs<storage::RamDisk> {
    let mut volume = MockVolume::new();
    volume.add_file(ROOT_CLUSTER, b"HELLO   TXT", b"Hello World!\n");
    Vfs::mount(volume.build()).unwrap()
}

#[test]
fn test_handles() {
    let mut vfs = vfs();

    let first = vfs.open("/hello.txt", READ);
    let second = vfs.open("/hello.txt", READ);
    assert_eq!(first, 0);
    assert_eq!(second, 1);
    assert_eq!(vfs.open_count(), 2);

    assert_eq!(vfs.close(first), 0);
    assert_eq!(vfs.close(first), FsError::BadDescriptor.code());
    assert_eq!(
        vfs.read(first, &mut [0; 4]),
        FsError::BadDescriptor.code() as isize
    );
    assert_eq!(vfs.open_count(), 1);

    // Failed opens do not consume a handle.
    assert_eq!(vfs.open("/missing.txt", READ), FsError::FileNotFound.code());
    assert_eq!(vfs.open("/hello.txt", READ), 2);
}

#[test]
fn test_read_write_codes() {
    let mut vfs = vfs();
    let handle = vfs.open("/log.txt", CREATE | READ | WRITE);
    assert!(handle >= 0);

    assert_eq!(vfs.write(handle, b"abcdef"), 6);
    assert_eq!(vfs.seek(handle, 0, 0), 0);
    let mut buf = [0; 16];
    assert_eq!(vfs.read(handle, &mut buf), 6);
    assert_eq!(&buf[..6], b"abcdef");
    assert_eq!(vfs.read(handle, &mut buf), FsError::ReadPastEnd.code() as isize);

    assert_eq!(vfs.seek(handle, 2, 2), 0);
    assert_eq!(vfs.tell(handle), Ok(4));
    assert_eq!(vfs.seek(handle, 0, 7), FsError::InvalidArgument.code());
    assert_eq!(vfs.seek(handle, 100, 0), FsError::InvalidArgument.code());

    assert_eq!(vfs.update(), 0);
    assert_eq!(vfs.close(handle), 0);
}

#[test]
fn test_bad_descriptor() {
    let mut vfs = vfs();
    let bad = FsError::BadDescriptor.code();

    assert_eq!(vfs.read(42, &mut [0; 4]), bad as isize);
    assert_eq!(vfs.write(42, b"x"), bad as isize);
    assert_eq!(vfs.seek(42, 0, 0), bad);
    assert_eq!(vfs.tell(42), Err(FsError::BadDescriptor));
    assert_eq!(vfs.close(-1), bad);
}

#[test]
fn test_invalid_flags() {
    let mut vfs = vfs();
    let invalid = FsError::InvalidArgument.code();

    assert_eq!(vfs.open("/hello.txt", 0), invalid);
    assert_eq!(vfs.open("/hello.txt", CREATE), invalid);
    assert_eq!(vfs.open("/hello.txt", 0x80), invalid);

    let read_only = vfs.open("/hello.txt", READ);
    assert_eq!(vfs.write(read_only, b"x"), FsError::Unsupported.code() as isize);
}

#[test]
fn test_stat() {
    let mut vfs = vfs();
    let mut stat = Stat::default();

    assert_eq!(vfs.stat("/hello.txt", &mut stat), 0);
    assert_eq!(stat.size(), 13);
    assert_eq!(vfs.stat("/nope.txt", &mut stat), FsError::FileNotFound.code());
    assert_eq!(vfs.stat("/", &mut stat), FsError::InvalidArgument.code());
    // Left untouched on failure
    assert_eq!(stat.size(), 13);
}
