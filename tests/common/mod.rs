//! Writes small single-volume cabinets for the integration tests.

#![allow(dead_code)]

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{Compress, Compression, FlushCompress};
use time::PrimitiveDateTime;

use cabfile::CompressionType;

const HEADER_SIZE: usize = 36;
const FOLDER_ENTRY_SIZE: usize = 8;
const FILE_ENTRY_SIZE: usize = 16;
const BLOCK_SIZE: usize = 0x8000;

pub struct FileSpec {
    name: String,
    data: Vec<u8>,
    date: u16,
    time: u16,
    attributes: u16,
}

impl FileSpec {
    pub fn set_datetime(&mut self, datetime: PrimitiveDateTime) -> &mut Self {
        self.date = ((datetime.year() - 1980) as u16) << 9
            | (u8::from(datetime.month()) as u16) << 5
            | datetime.day() as u16;
        self.time = (datetime.hour() as u16) << 11
            | (datetime.minute() as u16) << 5
            | (datetime.second() as u16) / 2;
        self
    }

    pub fn set_attributes(&mut self, attributes: u16) -> &mut Self {
        self.attributes = attributes;
        self
    }
}

pub struct FolderSpec {
    ctype: CompressionType,
    files: Vec<FileSpec>,
}

impl FolderSpec {
    pub fn add_file<D: Into<Vec<u8>>>(
        &mut self,
        name: &str,
        data: D,
    ) -> &mut FileSpec {
        self.files.push(FileSpec {
            name: name.to_string(),
            data: data.into(),
            date: 0x226c,
            time: 0x59ba,
            attributes: 0x20,
        });
        self.files.last_mut().unwrap()
    }
}

/// Describes the folders and files of a cabinet to be written.
pub struct CabinetSpec {
    folders: Vec<FolderSpec>,
    set_id: u16,
}

impl CabinetSpec {
    pub fn new() -> CabinetSpec {
        CabinetSpec { folders: Vec::new(), set_id: 0x1234 }
    }

    pub fn add_folder(&mut self, ctype: CompressionType) -> &mut FolderSpec {
        self.folders.push(FolderSpec { ctype, files: Vec::new() });
        self.folders.last_mut().unwrap()
    }

    /// Serializes the cabinet.  Files appear in the file table grouped by
    /// folder, in the order they were added.  Block checksums are left at
    /// zero.
    pub fn build(&self) -> Vec<u8> {
        let file_table_offset =
            HEADER_SIZE + FOLDER_ENTRY_SIZE * self.folders.len();
        let file_table_size: usize = self
            .folders
            .iter()
            .flat_map(|folder| folder.files.iter())
            .map(|file| FILE_ENTRY_SIZE + file.name.len() + 1)
            .sum();
        let num_files: usize =
            self.folders.iter().map(|folder| folder.files.len()).sum();

        let mut folder_table = Vec::new();
        let mut file_table = Vec::new();
        let mut data_area = Vec::new();
        let data_offset = file_table_offset + file_table_size;
        for (index, folder) in self.folders.iter().enumerate() {
            let mut contents = Vec::new();
            for file in folder.files.iter() {
                file_table.write_u32::<LittleEndian>(file.data.len() as u32).unwrap();
                file_table.write_u32::<LittleEndian>(contents.len() as u32).unwrap();
                file_table.write_u16::<LittleEndian>(index as u16).unwrap();
                file_table.write_u16::<LittleEndian>(file.date).unwrap();
                file_table.write_u16::<LittleEndian>(file.time).unwrap();
                file_table.write_u16::<LittleEndian>(file.attributes).unwrap();
                file_table.extend_from_slice(file.name.as_bytes());
                file_table.push(0);
                contents.extend_from_slice(&file.data);
            }
            let blocks = match folder.ctype {
                CompressionType::None => contents
                    .chunks(BLOCK_SIZE)
                    .map(|chunk| (chunk.len(), chunk.to_vec()))
                    .collect(),
                CompressionType::MsZip => mszip_blocks(&contents),
            };
            let first_block = data_offset + data_area.len();
            folder_table.write_u32::<LittleEndian>(first_block as u32).unwrap();
            folder_table.write_u16::<LittleEndian>(blocks.len() as u16).unwrap();
            folder_table
                .write_u16::<LittleEndian>(match folder.ctype {
                    CompressionType::None => 0,
                    CompressionType::MsZip => 1,
                })
                .unwrap();
            for (uncompressed_size, payload) in blocks {
                data_area.write_u32::<LittleEndian>(0).unwrap();
                data_area.write_u16::<LittleEndian>(payload.len() as u16).unwrap();
                data_area
                    .write_u16::<LittleEndian>(uncompressed_size as u16)
                    .unwrap();
                data_area.extend_from_slice(&payload);
            }
        }

        let total_size = data_offset + data_area.len();
        let mut out = Vec::with_capacity(total_size);
        out.extend_from_slice(b"MSCF");
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(total_size as u32).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(file_table_offset as u32).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.push(3);
        out.push(1);
        out.write_u16::<LittleEndian>(self.folders.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(num_files as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.set_id).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(&folder_table);
        out.extend_from_slice(&file_table);
        out.extend_from_slice(&data_area);
        assert_eq!(out.len(), total_size);
        out
    }
}

/// Splits `data` into 32 KiB MSZIP blocks that share one deflate stream, so
/// later blocks may refer back into earlier ones.
fn mszip_blocks(data: &[u8]) -> Vec<(usize, Vec<u8>)> {
    let mut compressor = Compress::new(Compression::best(), false);
    let chunks: Vec<&[u8]> = data.chunks(BLOCK_SIZE).collect();
    let mut blocks = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let is_last = index + 1 == chunks.len();
        let mut out = Vec::<u8>::with_capacity(0xffff);
        out.extend_from_slice(b"CK");
        let flush =
            if is_last { FlushCompress::Finish } else { FlushCompress::Sync };
        compressor.compress_vec(chunk, &mut out, flush).unwrap();
        if !is_last {
            out.extend_from_slice(&[0x03, 0x00]);
        }
        blocks.push((chunk.len(), out));
    }
    blocks
}

/// Returns the first data block offset of every folder in a cabinet written
/// by [`CabinetSpec::build`].
pub fn folder_data_offsets(cabinet: &[u8]) -> Vec<u64> {
    let num_folders = u16::from_le_bytes([cabinet[0x1a], cabinet[0x1b]]);
    (0..num_folders as usize)
        .map(|index| {
            let at = HEADER_SIZE + FOLDER_ENTRY_SIZE * index;
            u32::from_le_bytes([
                cabinet[at],
                cabinet[at + 1],
                cabinet[at + 2],
                cabinet[at + 3],
            ]) as u64
        })
        .collect()
}

/// Wraps a source and records the target of every absolute seek.
pub struct SeekLog<R> {
    inner: R,
    pub seeks: Vec<u64>,
}

impl<R> SeekLog<R> {
    pub fn new(inner: R) -> SeekLog<R> {
        SeekLog { inner, seeks: Vec::new() }
    }

    /// Counts absolute seeks to any of `offsets`.
    pub fn count_seeks_to(&self, offsets: &[u64]) -> usize {
        self.seeks.iter().filter(|seek| offsets.contains(seek)).count()
    }
}

impl<R: Read> Read for SeekLog<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for SeekLog<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let SeekFrom::Start(offset) = pos {
            self.seeks.push(offset);
        }
        self.inner.seek(pos)
    }
}

/// Wraps a source and fails every absolute seek to one of `offsets`.
pub struct SeekFault<R> {
    inner: R,
    offsets: Vec<u64>,
}

impl<R> SeekFault<R> {
    pub fn new(inner: R, offsets: &[u64]) -> SeekFault<R> {
        SeekFault { inner, offsets: offsets.to_vec() }
    }
}

impl<R: Read> Read for SeekFault<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for SeekFault<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let SeekFrom::Start(offset) = pos {
            if self.offsets.contains(&offset) {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("seek to {} refused", offset),
                ));
            }
        }
        self.inner.seek(pos)
    }
}

/// Overwrites the first data block offset of folder `index` in a cabinet
/// written by [`CabinetSpec::build`].
pub fn set_folder_data_offset(cabinet: &mut [u8], index: usize, offset: u32) {
    let at = HEADER_SIZE + FOLDER_ENTRY_SIZE * index;
    cabinet[at..at + 4].copy_from_slice(&offset.to_le_bytes());
}
