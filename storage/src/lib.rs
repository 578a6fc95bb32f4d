//! Storage stack of the kernel.
//!
//! - [`stream`]: the raw medium, seen as a seekable byte stream
//! - [`fs`]: the FAT32 driver
//! - [`vfs`]: integer descriptors and signed status codes on top of the driver
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

extern crate alloc;

pub mod fs;
pub mod stream;
pub mod vfs;

pub use stream::{BlockStream, RamDisk, StreamError, StreamResult, StreamSource};
