use std::io::{Read, Seek, SeekFrom};
use std::slice;

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};

use crate::checksum::block_checksum;
use crate::ctype::CompressionType;
use crate::error::{read_error, seek_error, Error, Record, Result};
use crate::file::FileEntry;
use crate::mszip::{self, BlockError, History};

/// An iterator over the folder entries in a cabinet.
#[derive(Clone)]
pub struct FolderEntries<'a> {
    pub(crate) iter: std::iter::Enumerate<slice::Iter<'a, FolderHeader>>,
    pub(crate) files: &'a [FileEntry],
}

/// Metadata about one folder in a cabinet.
pub struct FolderEntry<'a> {
    index: usize,
    header: &'a FolderHeader,
    files: &'a [FileEntry],
}

/// A parsed folder record, as stored in the cabinet's folder table.
#[derive(Debug, Clone)]
pub(crate) struct FolderHeader {
    pub(crate) first_data_block_offset: u32,
    pub(crate) num_data_blocks: u16,
    pub(crate) compression_type: CompressionType,
    pub(crate) reserve_data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct DataBlockHeader {
    checksum: u32,
    compressed_size: u16,
    uncompressed_size: u16,
}

impl<'a> Iterator for FolderEntries<'a> {
    type Item = FolderEntry<'a>;

    fn next(&mut self) -> Option<FolderEntry<'a>> {
        let (index, header) = self.iter.next()?;
        Some(FolderEntry { index, header, files: self.files })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> ExactSizeIterator for FolderEntries<'a> {}

impl<'a> FolderEntry<'a> {
    /// Returns this folder's index in the folder table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the scheme used to compress this folder's data.
    pub fn compression_type(&self) -> CompressionType {
        self.header.compression_type
    }

    /// Returns the number of data blocks used to store this folder's data.
    pub fn num_data_blocks(&self) -> u16 {
        self.header.num_data_blocks
    }

    /// Returns the application-defined reserve data for this folder.
    pub fn reserve_data(&self) -> &[u8] {
        &self.header.reserve_data
    }

    /// Returns an iterator over the entries of the files stored in this
    /// folder, in file table order.
    pub fn file_entries(&self) -> impl Iterator<Item = &'a FileEntry> + 'a {
        let index = self.index;
        self.files.iter().filter(move |file| file.folder_index() == index)
    }
}

pub(crate) fn parse_folder_entry<R: Read>(
    mut reader: R,
    index: usize,
    reserve_size: usize,
) -> Result<FolderHeader> {
    let record = Record::Folder(index);
    let first_data_block_offset =
        reader.read_u32::<LittleEndian>().map_err(read_error(record))?;
    let num_data_blocks =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let compression_bits =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let compression_type =
        CompressionType::from_bitfield(compression_bits, index)?;
    let mut reserve_data = vec![0u8; reserve_size];
    reader.read_exact(&mut reserve_data).map_err(read_error(record))?;
    Ok(FolderHeader {
        first_data_block_offset,
        num_data_blocks,
        compression_type,
        reserve_data,
    })
}

fn parse_block_header<R: Read>(
    mut reader: R,
    record: Record,
) -> Result<DataBlockHeader> {
    let checksum =
        reader.read_u32::<LittleEndian>().map_err(read_error(record))?;
    let compressed_size =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    let uncompressed_size =
        reader.read_u16::<LittleEndian>().map_err(read_error(record))?;
    Ok(DataBlockHeader { checksum, compressed_size, uncompressed_size })
}

/// Reads every data block of folder `index` from `reader` and returns the
/// folder's complete uncompressed contents.
pub(crate) fn decompress_folder<R: Read + Seek>(
    reader: &mut R,
    index: usize,
    folder: &FolderHeader,
    data_reserve_size: usize,
    verify_checksums: bool,
) -> Result<Vec<u8>> {
    debug!(
        "decompressing folder {} ({} blocks, {:?})",
        index, folder.num_data_blocks, folder.compression_type
    );
    let start = folder.first_data_block_offset as u64;
    reader.seek(SeekFrom::Start(start)).map_err(seek_error(start))?;

    let mut output = Vec::<u8>::new();
    let mut history = History::new();
    for block_index in 0..folder.num_data_blocks as usize {
        let record = Record::DataBlock { folder: index, block: block_index };
        let block = parse_block_header(&mut *reader, record)?;
        let mut reserve_data = vec![0u8; data_reserve_size];
        reader.read_exact(&mut reserve_data).map_err(read_error(record))?;
        let expected = block.compressed_size as usize;
        let mut payload = Vec::with_capacity(expected);
        (&mut *reader).take(expected as u64).read_to_end(&mut payload)?;
        if payload.len() != expected {
            return Err(Error::TruncatedBlock {
                folder: index,
                block: block_index,
                expected,
                actual: payload.len(),
            });
        }
        trace!(
            "folder {} block {}: {} -> {} bytes",
            index,
            block_index,
            block.compressed_size,
            block.uncompressed_size
        );
        if verify_checksums && block.checksum != 0 {
            let actual = block_checksum(
                &reserve_data,
                &payload,
                block.compressed_size,
                block.uncompressed_size,
            );
            if actual != block.checksum {
                return Err(Error::ChecksumMismatch {
                    folder: index,
                    block: block_index,
                    expected: block.checksum,
                    actual,
                });
            }
        }
        match folder.compression_type {
            CompressionType::None => {
                if block.compressed_size != block.uncompressed_size {
                    return Err(Error::SizeMismatch {
                        folder: index,
                        block: block_index,
                        compressed: block.compressed_size,
                        uncompressed: block.uncompressed_size,
                    });
                }
                output.extend_from_slice(&payload);
            }
            CompressionType::MsZip => {
                let (data, next) = mszip::decompress_block(
                    history,
                    &payload,
                    block.uncompressed_size as usize,
                )
                .map_err(|error| block_error(error, index, block_index))?;
                output.extend_from_slice(&data);
                history = next;
            }
        }
    }
    Ok(output)
}

fn block_error(error: BlockError, folder: usize, block: usize) -> Error {
    match error {
        BlockError::BadSignature => Error::BadBlockSignature { folder, block },
        BlockError::Inflate(reason) => {
            Error::DecompressionFailure { folder, block, reason }
        }
        BlockError::WrongSize { expected, actual } => {
            Error::DecompressionFailure {
                folder,
                block,
                reason: if actual > expected {
                    format!("expected {} uncompressed bytes, got more", expected)
                } else {
                    format!(
                        "expected {} uncompressed bytes, got {}",
                        expected, actual
                    )
                },
            }
        }
    }
}
