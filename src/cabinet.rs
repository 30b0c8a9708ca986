use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::consts;
use crate::entries::Entries;
use crate::error::{read_error, seek_error, Error, Record, Result};
use crate::file::{parse_file_entry, FileEntries, FileEntry};
use crate::folder::{
    decompress_folder, parse_folder_entry, FolderEntries, FolderHeader,
};

/// Settings that control how strictly a cabinet is read.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ReadOptions {
    verify_checksums: bool,
}

impl ReadOptions {
    /// Returns the default options: data block checksums are not verified.
    pub fn new() -> ReadOptions {
        ReadOptions::default()
    }

    /// Sets whether to verify the checksum of every data block that has one
    /// (a stored checksum of zero means "none").  Many cabinet writers leave
    /// these fields unreliable, so verification is off by default.
    pub fn verify_checksums(mut self, verify: bool) -> ReadOptions {
        self.verify_checksums = verify;
        self
    }

    /// Returns true if data block checksums will be verified.
    pub fn verifies_checksums(&self) -> bool {
        self.verify_checksums
    }
}

/// A structure for reading a cabinet file.
///
/// The header, folder table, and file table are parsed when the cabinet is
/// opened.  File data is decompressed on demand, one whole folder at a time.
/// Names are read one byte at a time, so wrap unbuffered sources (such as a
/// `File`) in a `BufReader`.
pub struct Cabinet<R> {
    reader: R,
    source_len: u64,
    options: ReadOptions,
    version: (u8, u8),
    total_size: u32,
    cabinet_set_id: u16,
    cabinet_set_index: u16,
    data_reserve_size: u8,
    reserve_data: Vec<u8>,
    folders: Vec<FolderHeader>,
    files: Vec<FileEntry>,
}

impl<R: Read + Seek> Cabinet<R> {
    /// Open an existing cabinet file with the default [`ReadOptions`].
    pub fn new(reader: R) -> Result<Cabinet<R>> {
        Cabinet::with_options(reader, ReadOptions::default())
    }

    /// Open an existing cabinet file.
    pub fn with_options(
        mut reader: R,
        options: ReadOptions,
    ) -> Result<Cabinet<R>> {
        let source_len = reader.seek(SeekFrom::End(0)).map_err(Error::Io)?;
        reader.seek(SeekFrom::Start(0)).map_err(seek_error(0))?;
        if source_len < consts::HEADER_SIZE {
            return Err(Error::TruncatedInput { record: Record::Header });
        }

        let header = read_error(Record::Header);
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature).map_err(header)?;
        if signature != consts::FILE_SIGNATURE {
            return Err(Error::BadSignature { found: signature });
        }
        let reserved1 = read_u32(&mut reader, Record::Header)?;
        let total_size = read_u32(&mut reader, Record::Header)?;
        let reserved2 = read_u32(&mut reader, Record::Header)?;
        let first_file_offset = read_u32(&mut reader, Record::Header)?;
        let reserved3 = read_u32(&mut reader, Record::Header)?;
        let minor_version = read_u8(&mut reader, Record::Header)?;
        let major_version = read_u8(&mut reader, Record::Header)?;
        let num_folders = read_u16(&mut reader, Record::Header)? as usize;
        let num_files = read_u16(&mut reader, Record::Header)? as usize;
        let flags = read_u16(&mut reader, Record::Header)?;
        let cabinet_set_id = read_u16(&mut reader, Record::Header)?;
        let cabinet_set_index = read_u16(&mut reader, Record::Header)?;

        if major_version != consts::VERSION_MAJOR
            || minor_version != consts::VERSION_MINOR
        {
            return Err(Error::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }
        if reserved1 != 0 || reserved2 != 0 || reserved3 != 0 {
            return Err(Error::ReservedFieldViolation {
                reserved1,
                reserved2,
                reserved3,
            });
        }
        if flags & (consts::FLAG_PREV_CABINET | consts::FLAG_NEXT_CABINET) != 0
        {
            return Err(Error::UnsupportedMultiPart { flags });
        }

        let mut header_reserve_size = 0u16;
        let mut folder_reserve_size = 0u8;
        let mut data_reserve_size = 0u8;
        if (flags & consts::FLAG_RESERVE_PRESENT) != 0 {
            header_reserve_size = read_u16(&mut reader, Record::Header)?;
            folder_reserve_size = read_u8(&mut reader, Record::Header)?;
            data_reserve_size = read_u8(&mut reader, Record::Header)?;
        }
        let mut reserve_data = vec![0u8; header_reserve_size as usize];
        reader
            .read_exact(&mut reserve_data)
            .map_err(read_error(Record::HeaderReserve))?;

        // Declared counts are only trusted as far as the source could hold
        // that many records.
        let max_folders = (source_len / consts::FOLDER_ENTRY_SIZE) as usize;
        let mut folders = Vec::with_capacity(num_folders.min(max_folders));
        for index in 0..num_folders {
            folders.push(parse_folder_entry(
                &mut reader,
                index,
                folder_reserve_size as usize,
            )?);
        }

        let file_table = first_file_offset as u64;
        if num_files > 0 && file_table >= source_len {
            return Err(Error::TruncatedInput { record: Record::FileTable });
        }
        reader
            .seek(SeekFrom::Start(file_table))
            .map_err(seek_error(file_table))?;
        let max_files = (source_len / consts::FILE_ENTRY_SIZE) as usize;
        let mut files = Vec::with_capacity(num_files.min(max_files));
        for index in 0..num_files {
            files.push(parse_file_entry(&mut reader, index)?);
        }

        debug!(
            "opened cabinet: {} folders, {} files, {} bytes",
            folders.len(),
            files.len(),
            source_len
        );
        Ok(Cabinet {
            reader,
            source_len,
            options,
            version: (major_version, minor_version),
            total_size,
            cabinet_set_id,
            cabinet_set_index,
            data_reserve_size,
            reserve_data,
            folders,
            files,
        })
    }

    /// Returns the decompressed contents of the folder at `index`.
    ///
    /// Every call re-reads and re-decodes the folder from the source.  A
    /// folder whose data lies past the end of the source fails here, without
    /// affecting the other folders.
    pub fn read_folder(&mut self, index: usize) -> Result<Vec<u8>> {
        let folder = match self.folders.get(index) {
            Some(folder) => folder,
            None => {
                return Err(Error::FolderIndexOutOfRange {
                    index,
                    count: self.folders.len(),
                })
            }
        };
        if folder.num_data_blocks > 0
            && folder.first_data_block_offset as u64 >= self.source_len
        {
            return Err(Error::TruncatedInput {
                record: Record::FolderData(index),
            });
        }
        decompress_folder(
            &mut self.reader,
            index,
            folder,
            self.data_reserve_size as usize,
            self.options.verify_checksums,
        )
    }

    /// Returns the decompressed contents of the first file named `name`.
    ///
    /// The whole folder holding the file is decompressed on every call; to
    /// read many files, prefer [`Cabinet::entries`].
    pub fn content(&mut self, name: &str) -> Result<Vec<u8>> {
        let (folder_index, start, end) = match self.get_file_entry(name) {
            Some(file) => {
                let (start, end) = file.folder_range();
                (file.folder_index(), start, end)
            }
            None => {
                return Err(Error::FileNotFound { name: name.to_string() })
            }
        };
        let mut data = self.read_folder(folder_index)?;
        let range = checked_range(name, folder_index, start, end, &data)?;
        data.truncate(range.end);
        data.drain(..range.start);
        Ok(data)
    }

    /// Returns a cursor that walks every file in file table order.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries::new(self)
    }
}

impl<R> Cabinet<R> {
    /// Returns the `(major, minor)` format version; always `(1, 3)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Returns the total size of the cabinet file as declared in its header.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Returns the cabinet set ID for this cabinet (an arbitrary number used
    /// to group together a set of cabinets).
    pub fn cabinet_set_id(&self) -> u16 {
        self.cabinet_set_id
    }

    /// Returns this cabinet's (zero-based) index within its cabinet set.
    pub fn cabinet_set_index(&self) -> u16 {
        self.cabinet_set_index
    }

    /// Returns the application-defined reserve data stored in the cabinet
    /// header.
    pub fn reserve_data(&self) -> &[u8] {
        &self.reserve_data
    }

    /// Returns the options this cabinet was opened with.
    pub fn options(&self) -> ReadOptions {
        self.options
    }

    /// Returns an iterator over the folder entries in this cabinet.
    pub fn folder_entries(&self) -> FolderEntries<'_> {
        FolderEntries { iter: self.folders.iter().enumerate(), files: &self.files }
    }

    /// Returns an iterator over all file entries, in file table order.
    pub fn file_entries(&self) -> FileEntries<'_> {
        FileEntries { iter: self.files.iter() }
    }

    /// Returns the names of all files, in file table order.
    pub fn file_list(&self) -> Vec<&str> {
        self.files.iter().map(FileEntry::name).collect()
    }

    /// Returns the entry for the first file with the given name, if any.
    pub fn get_file_entry(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|&file| file.name() == name)
    }

    pub(crate) fn file_at(&self, index: usize) -> Option<&FileEntry> {
        self.files.get(index)
    }

    /// Consumes the cabinet, returning the underlying byte source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Checks that `start..end` lies within the decompressed folder `data`.
pub(crate) fn checked_range(
    name: &str,
    folder: usize,
    start: u64,
    end: u64,
    data: &[u8],
) -> Result<Range<usize>> {
    if end > data.len() as u64 {
        return Err(Error::OffsetOutOfRange {
            name: name.to_string(),
            folder,
            offset: start,
            size: end - start,
            folder_len: data.len() as u64,
        });
    }
    Ok(start as usize..end as usize)
}

fn read_u8<R: Read>(reader: &mut R, record: Record) -> Result<u8> {
    reader.read_u8().map_err(read_error(record))
}

fn read_u16<R: Read>(reader: &mut R, record: Record) -> Result<u16> {
    reader.read_u16::<LittleEndian>().map_err(read_error(record))
}

fn read_u32<R: Read>(reader: &mut R, record: Record) -> Result<u32> {
    reader.read_u32::<LittleEndian>().map_err(read_error(record))
}
