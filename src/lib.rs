//! A library for reading [Windows
//! cabinet](https://en.wikipedia.org/wiki/Cabinet_(file_format)) (CAB) files,
//! with support for the firmware metadata carried by LVFS cabinets.
//!
//! Single-volume cabinets with uncompressed or MSZIP folders are supported.
//! Files can be read by name with [`Cabinet::content`], or visited in file
//! table order with [`Cabinet::entries`], which decompresses each folder
//! only once.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Read;
//!
//! # fn main() -> cabfile::Result<()> {
//! let mut cabinet = cabfile::Cabinet::new(File::open("firmware.cab")?)?;
//! let mut entries = cabinet.entries();
//! while let Some((mut reader, info)) = entries.next_file()? {
//!     let mut data = Vec::new();
//!     reader.read_to_end(&mut data)?;
//!     println!("{} ({} bytes)", info.name(), data.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cabinet;
mod checksum;
mod consts;
mod ctype;
mod datetime;
mod entries;
mod error;
mod file;
mod folder;
mod mszip;
mod string;

pub mod lvfs;

pub use crate::cabinet::{Cabinet, ReadOptions};
pub use crate::ctype::CompressionType;
pub use crate::entries::Entries;
pub use crate::error::{Error, ErrorClass, Record, Result};
pub use crate::file::{FileEntries, FileEntry, FileInfo, FileReader};
pub use crate::folder::{FolderEntries, FolderEntry};
