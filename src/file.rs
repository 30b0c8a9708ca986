use std::io::{self, Read, Seek, SeekFrom};
use std::slice;

use byteorder::{LittleEndian, ReadBytesExt};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::consts;
use crate::datetime::{datetime_from_bits, utc_datetime_from_bits};
use crate::error::{read_error, Record, Result};
use crate::string::read_null_terminated_string;

/// An iterator over file entries.
#[derive(Clone)]
pub struct FileEntries<'a> {
    pub(crate) iter: slice::Iter<'a, FileEntry>,
}

/// Metadata about one file stored in a cabinet.
#[derive(Debug, Clone)]
pub struct FileEntry {
    name: String,
    date: u16,
    time: u16,
    uncompressed_size: u32,
    attributes: u16,
    folder_index: u16,
    uncompressed_offset: u32,
}

impl<'a> Iterator for FileEntries<'a> {
    type Item = &'a FileEntry;

    fn next(&mut self) -> Option<&'a FileEntry> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> ExactSizeIterator for FileEntries<'a> {}

impl FileEntry {
    /// Returns the name of file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the datetime for this file.  According to the CAB spec, this
    /// "is typically considered the 'last modified' time in local time, but
    /// the actual definition is application-defined."
    ///
    /// Note that this will return [`None`] if the datetime in the cabinet file
    /// was not a valid date/time.
    pub fn datetime(&self) -> Option<PrimitiveDateTime> {
        datetime_from_bits(self.date, self.time)
    }

    /// Returns the raw DOS `(date, time)` fields.
    pub fn datetime_bits(&self) -> (u16, u16) {
        (self.date, self.time)
    }

    /// Returns the total size of the file when decompressed, in bytes.
    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    /// Returns the index of the folder holding this file's data.
    pub fn folder_index(&self) -> usize {
        self.folder_index as usize
    }

    /// Returns the offset of this file's data within its decompressed
    /// folder.
    pub fn uncompressed_offset(&self) -> u32 {
        self.uncompressed_offset
    }

    /// Returns true if this file has the "read-only" attribute set.
    pub fn is_read_only(&self) -> bool {
        (self.attributes & consts::ATTR_READ_ONLY) != 0
    }

    /// Returns true if this file has the "hidden" attribute set.
    pub fn is_hidden(&self) -> bool {
        (self.attributes & consts::ATTR_HIDDEN) != 0
    }

    /// Returns true if this file has the "system file" attribute set.
    pub fn is_system(&self) -> bool {
        (self.attributes & consts::ATTR_SYSTEM) != 0
    }

    /// Returns true if this file has the "archive" (modified since last
    /// backup) attribute set.
    pub fn is_archive(&self) -> bool {
        (self.attributes & consts::ATTR_ARCH) != 0
    }

    /// Returns true if this file has the "execute after extraction" attribute
    /// set.
    pub fn is_exec(&self) -> bool {
        (self.attributes & consts::ATTR_EXEC) != 0
    }

    /// Returns true if this file has the "name is UTF" attribute set.
    pub fn is_name_utf(&self) -> bool {
        (self.attributes & consts::ATTR_NAME_IS_UTF) != 0
    }

    /// Byte range of this file within its decompressed folder.
    pub(crate) fn folder_range(&self) -> (u64, u64) {
        let start = self.uncompressed_offset as u64;
        (start, start + self.uncompressed_size as u64)
    }

    pub(crate) fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            size: self.uncompressed_size as u64,
            modified: utc_datetime_from_bits(self.date, self.time),
        }
    }
}

/// Filesystem-style metadata for a file produced by sequential iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    size: u64,
    modified: Option<OffsetDateTime>,
}

impl FileInfo {
    /// Returns the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the uncompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the modification time, taken to be UTC, or `None` if the
    /// stored date/time is not valid.
    pub fn modified(&self) -> Option<OffsetDateTime> {
        self.modified
    }

    /// Returns the permission bits.  Cabinets do not store any, so this is
    /// always `0o700`.
    pub fn mode(&self) -> u32 {
        consts::FILE_MODE
    }

    /// Always false; cabinets have no directory entries.
    pub fn is_dir(&self) -> bool {
        false
    }
}

/// A reader over exactly one file's bytes within a decompressed folder.
pub struct FileReader<'a> {
    data: &'a [u8],
    offset: u64,
}

impl<'a> FileReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> FileReader<'a> {
        FileReader { data, offset: 0 }
    }

    /// Returns the total size of the file, in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl<'a> Read for FileReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let size = self.size();
        debug_assert!(self.offset <= size);
        let bytes_remaining = size - self.offset;
        let max_bytes = bytes_remaining.min(buf.len() as u64) as usize;
        if max_bytes == 0 {
            return Ok(0);
        }
        let start = self.offset as usize;
        buf[..max_bytes].copy_from_slice(&self.data[start..start + max_bytes]);
        self.offset += max_bytes as u64;
        Ok(max_bytes)
    }
}

impl<'a> Seek for FileReader<'a> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.size();
        let new_offset = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.offset as i64 + delta,
            SeekFrom::End(delta) => size as i64 + delta,
        };
        if new_offset < 0 || (new_offset as u64) > size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Cannot seek to {}, file length is {}",
                    new_offset, size
                ),
            ));
        }
        self.offset = new_offset as u64;
        Ok(self.offset)
    }
}

/// Reads one fixed-size file record and the name that follows it, leaving
/// the reader just past the name's terminator.
pub(crate) fn parse_file_entry<R: Read>(
    mut reader: R,
    index: usize,
) -> Result<FileEntry> {
    let record = Record::File(index);
    let uncompressed_size =
        reader.read_u32::<LittleEndian>().map_err(read_error(record))?;
    let uncompressed_offset =
        reader.read_u32::<LittleEndian>().map_err(read_error(record))?;
    let folder_index =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let date = reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let time = reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let attributes =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let name =
        read_null_terminated_string(&mut reader, Record::FileName(index))?;
    Ok(FileEntry {
        name,
        date,
        time,
        uncompressed_size,
        attributes,
        folder_index,
        uncompressed_offset,
    })
}
