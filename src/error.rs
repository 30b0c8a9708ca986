use std::fmt;
use std::io;

use thiserror::Error;

/// A specialized [`Result`](std::result::Result) type for cabinet decoding.
pub type Result<T> = std::result::Result<T, Error>;

/// The fixed-size or variable-length record that was being read when the
/// byte source ran out.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Record {
    /// The fixed cabinet header.
    Header,
    /// The optional header reserve area.
    HeaderReserve,
    /// A folder entry (and its reserve area), by index.
    Folder(usize),
    /// The start of the file table.
    FileTable,
    /// A fixed-size file entry, by index.
    File(usize),
    /// The null-terminated name following a file entry, by index.
    FileName(usize),
    /// The first data block of a folder, by folder index.
    FolderData(usize),
    /// A data block header, by folder and block index.
    DataBlock {
        /// Index of the folder the block belongs to.
        folder: usize,
        /// Index of the block within its folder.
        block: usize,
    },
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Record::Header => write!(f, "cabinet header"),
            Record::HeaderReserve => write!(f, "header reserve area"),
            Record::Folder(index) => write!(f, "folder entry {}", index),
            Record::FileTable => write!(f, "file table"),
            Record::File(index) => write!(f, "file entry {}", index),
            Record::FileName(index) => write!(f, "name of file entry {}", index),
            Record::FolderData(index) => write!(f, "data of folder {}", index),
            Record::DataBlock { folder, block } => {
                write!(f, "data block {} of folder {}", block, folder)
            }
        }
    }
}

/// Broad category of an [`Error`], used to decide how far a failure reaches.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    /// The archive cannot be opened at all.
    Structural,
    /// The source ended before a record was complete.
    Truncation,
    /// One folder's data could not be decoded; other folders are unaffected.
    Decode,
    /// A single lookup failed; the cabinet stays usable.
    Access,
    /// The underlying byte source reported an error.
    Io,
}

/// Errors produced while opening or reading a cabinet.
#[derive(Debug, Error)]
pub enum Error {
    /// The first four bytes are not `MSCF`.
    #[error("not a cabinet file (signature is {found:02x?})")]
    BadSignature {
        /// The bytes actually found.
        found: [u8; 4],
    },

    /// The format version is not 1.3.
    #[error("cabinet format version {major}.{minor} is not supported")]
    UnsupportedVersion {
        /// Declared major version.
        major: u8,
        /// Declared minor version.
        minor: u8,
    },

    /// One of the header's reserved fields is nonzero.
    #[error(
        "reserved header fields must be zero \
         (found {reserved1:#x}, {reserved2:#x}, {reserved3:#x})"
    )]
    ReservedFieldViolation {
        /// First reserved field.
        reserved1: u32,
        /// Second reserved field.
        reserved2: u32,
        /// Third reserved field.
        reserved3: u32,
    },

    /// The cabinet is part of a multi-cabinet set.
    #[error("multi-part cabinet files are not supported (flags {flags:#06x})")]
    UnsupportedMultiPart {
        /// The header flag bits.
        flags: u16,
    },

    /// A folder uses a compression scheme other than none or MSZIP.
    #[error("folder {folder} uses unsupported compression type {bits:#06x}")]
    UnsupportedCompression {
        /// Index of the offending folder.
        folder: usize,
        /// The raw compression field.
        bits: u16,
    },

    /// The source ended in the middle of a record.
    #[error("unexpected end of input while reading {record}")]
    TruncatedInput {
        /// The record being read.
        record: Record,
    },

    /// The source ended in the middle of a data block payload.
    #[error(
        "data block {block} of folder {folder} is truncated \
         (expected {expected} bytes, read {actual})"
    )]
    TruncatedBlock {
        /// Folder index.
        folder: usize,
        /// Block index within the folder.
        block: usize,
        /// Declared compressed size.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// An uncompressed block declares different compressed and uncompressed
    /// sizes.
    #[error(
        "uncompressed data block {block} of folder {folder} has {compressed} \
         stored bytes but declares {uncompressed} uncompressed bytes"
    )]
    SizeMismatch {
        /// Folder index.
        folder: usize,
        /// Block index within the folder.
        block: usize,
        /// Declared compressed size.
        compressed: u16,
        /// Declared uncompressed size.
        uncompressed: u16,
    },

    /// An MSZIP block does not start with `CK`.
    #[error("data block {block} of folder {folder} has an invalid MSZIP signature")]
    BadBlockSignature {
        /// Folder index.
        folder: usize,
        /// Block index within the folder.
        block: usize,
    },

    /// Inflating an MSZIP block failed or produced the wrong byte count.
    #[error(
        "could not decompress data block {block} of folder {folder}: {reason}"
    )]
    DecompressionFailure {
        /// Folder index.
        folder: usize,
        /// Block index within the folder.
        block: usize,
        /// What went wrong.
        reason: String,
    },

    /// A data block checksum did not match (only with checksum verification
    /// enabled).
    #[error(
        "checksum error in data block {block} of folder {folder} \
         (expected {expected:08x}, actual {actual:08x})"
    )]
    ChecksumMismatch {
        /// Folder index.
        folder: usize,
        /// Block index within the folder.
        block: usize,
        /// Checksum stored in the block header.
        expected: u32,
        /// Checksum computed from the block.
        actual: u32,
    },

    /// A folder index past the end of the folder table.
    #[error("folder index {index} is out of range (cabinet has {count} folders)")]
    FolderIndexOutOfRange {
        /// Requested folder index.
        index: usize,
        /// Number of folders in the cabinet.
        count: usize,
    },

    /// No file with the requested name.
    #[error("no such file in cabinet: {name:?}")]
    FileNotFound {
        /// The queried name.
        name: String,
    },

    /// A file's byte range extends past the end of its decompressed folder.
    #[error(
        "file {name:?} spans bytes {offset}..{} but folder {folder} only has \
         {folder_len} bytes",
        .offset + .size
    )]
    OffsetOutOfRange {
        /// File name.
        name: String,
        /// Owning folder index.
        folder: usize,
        /// Offset of the file within the folder.
        offset: u64,
        /// Declared file size.
        size: u64,
        /// Decompressed length of the folder.
        folder_len: u64,
    },

    /// The byte source could not be repositioned.
    #[error("could not seek to offset {offset}")]
    SeekFailure {
        /// Target offset.
        offset: u64,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Any other error from the byte source.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the broad category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::BadSignature { .. }
            | Error::UnsupportedVersion { .. }
            | Error::ReservedFieldViolation { .. }
            | Error::UnsupportedMultiPart { .. }
            | Error::UnsupportedCompression { .. } => ErrorClass::Structural,
            Error::TruncatedInput { .. } | Error::TruncatedBlock { .. } => {
                ErrorClass::Truncation
            }
            Error::SizeMismatch { .. }
            | Error::BadBlockSignature { .. }
            | Error::DecompressionFailure { .. }
            | Error::ChecksumMismatch { .. } => ErrorClass::Decode,
            Error::FolderIndexOutOfRange { .. }
            | Error::FileNotFound { .. }
            | Error::OffsetOutOfRange { .. } => ErrorClass::Access,
            Error::SeekFailure { .. } | Error::Io(_) => ErrorClass::Io,
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        let kind = match error {
            Error::Io(error) => return error,
            Error::SeekFailure { ref source, .. } => source.kind(),
            Error::FileNotFound { .. } => io::ErrorKind::NotFound,
            Error::FolderIndexOutOfRange { .. } => io::ErrorKind::InvalidInput,
            Error::TruncatedInput { .. } | Error::TruncatedBlock { .. } => {
                io::ErrorKind::UnexpectedEof
            }
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, error)
    }
}

/// Maps a read failure on `record` to [`Error::TruncatedInput`] when the
/// source simply ran out.
pub(crate) fn read_error(record: Record) -> impl FnOnce(io::Error) -> Error {
    move |error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedInput { record }
        } else {
            Error::Io(error)
        }
    }
}

pub(crate) fn seek_error(offset: u64) -> impl FnOnce(io::Error) -> Error {
    move |source| Error::SeekFailure { offset, source }
}
