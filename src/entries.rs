use std::io::{Read, Seek};
use std::ops::Range;

use log::debug;

use crate::cabinet::{checked_range, Cabinet};
use crate::error::{Error, ErrorClass, Result};
use crate::file::{FileInfo, FileReader};

/// A forward-only cursor over every file in a cabinet, in file table order.
///
/// The most recently decompressed folder is kept and reused for consecutive
/// files in that folder, so a cabinet whose file table groups files by folder
/// decompresses each folder exactly once.
pub struct Entries<'a, R> {
    cabinet: &'a mut Cabinet<R>,
    next_index: usize,
    buffer_folder: Option<usize>,
    buffer: Vec<u8>,
}

impl<'a, R: Read + Seek> Entries<'a, R> {
    pub(crate) fn new(cabinet: &'a mut Cabinet<R>) -> Entries<'a, R> {
        Entries { cabinet, next_index: 0, buffer_folder: None, buffer: Vec::new() }
    }

    /// Returns a reader over the next file's data together with its
    /// metadata, or `None` once every file has been returned.
    ///
    /// If the file's data cannot be decoded or located, the error is returned
    /// and the cursor moves past that file, so later files (in other folders)
    /// can still be reached.  Errors from the byte source itself
    /// ([`ErrorClass::Io`]) leave the cursor where it is.
    pub fn next_file(&mut self) -> Result<Option<(FileReader<'_>, FileInfo)>> {
        match self.locate_next() {
            Ok(Some((range, info))) => {
                Ok(Some((FileReader::new(&self.buffer[range]), info)))
            }
            Ok(None) => Ok(None),
            Err(error) => {
                if error.class() != ErrorClass::Io {
                    self.next_index += 1;
                }
                Err(error)
            }
        }
    }

    fn locate_next(&mut self) -> Result<Option<(Range<usize>, FileInfo)>> {
        let (folder, start, end, info) =
            match self.cabinet.file_at(self.next_index) {
                Some(file) => {
                    let (start, end) = file.folder_range();
                    (file.folder_index(), start, end, file.info())
                }
                None => return Ok(None),
            };
        if self.buffer_folder != Some(folder) {
            debug!("file {} starts folder {}", self.next_index, folder);
            self.buffer_folder = None;
            self.buffer = Vec::new();
            self.buffer = self.cabinet.read_folder(folder)?;
            self.buffer_folder = Some(folder);
        }
        let range = checked_range(info.name(), folder, start, end, &self.buffer)?;
        self.next_index += 1;
        Ok(Some((range, info)))
    }

    /// Returns the number of files not yet returned.
    pub fn remaining(&self) -> usize {
        self.cabinet.file_entries().len().saturating_sub(self.next_index)
    }

    /// Reads every remaining file to the end, calling `visit` with each
    /// file's metadata and contents.
    pub fn for_each_file<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&FileInfo, &[u8]) -> Result<()>,
    {
        while let Some((mut reader, info)) = self.next_file()? {
            let mut data = Vec::with_capacity(info.size() as usize);
            reader.read_to_end(&mut data).map_err(Error::Io)?;
            visit(&info, &data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use time::macros::datetime;

    use crate::cabinet::Cabinet;
    use crate::error::Error;

    const TWO_FOLDERS: &[u8] = b"MSCF\0\0\0\0\x96\0\0\0\0\0\0\0\
        \x34\0\0\0\0\0\0\0\x03\x01\x02\0\x02\0\0\0\x34\x12\0\0\
        \x62\0\0\0\x01\0\0\0\
        \x78\0\0\0\x01\0\x01\0\
        \x0e\0\0\0\0\0\0\0\0\0\x6c\x22\xba\x59\x01\0hi.txt\0\
        \x0e\0\0\0\0\0\0\0\x01\0\x6c\x22\xba\x59\x01\0hi.zip\0\
        \0\0\0\0\x0e\0\x0e\0Hello, world!\n\
        \0\0\0\0\x16\0\x0e\0\
        CK\xf3H\xcd\xc9\xc9\xd7Q(\xcf/\xcaIQ\xe4\x02\x00$\xf2\x04\x94";

    #[test]
    fn walk_files_in_two_folders() {
        assert_eq!(TWO_FOLDERS.len(), 0x96);
        let mut cabinet = Cabinet::new(Cursor::new(TWO_FOLDERS)).unwrap();
        let mut entries = cabinet.entries();
        assert_eq!(entries.remaining(), 2);

        let mut names = Vec::new();
        while let Some((mut reader, info)) = entries.next_file().unwrap() {
            let mut data = Vec::new();
            reader.read_to_end(&mut data).unwrap();
            assert_eq!(data, b"Hello, world!\n");
            assert_eq!(info.size(), 14);
            assert_eq!(
                info.modified(),
                Some(datetime!(1997-03-12 11:13:52 UTC))
            );
            names.push(info.name().to_string());
        }
        assert_eq!(names, vec!["hi.txt", "hi.zip"]);
        assert_eq!(entries.remaining(), 0);
        assert!(entries.next_file().unwrap().is_none());
    }

    #[test]
    fn decode_error_moves_past_file() {
        let mut binary = TWO_FOLDERS.to_vec();
        // Break the MSZIP signature of the second folder's only block.
        binary[0x80] = b'X';
        let mut cabinet = Cabinet::new(Cursor::new(binary)).unwrap();
        let mut entries = cabinet.entries();
        assert!(entries.next_file().unwrap().is_some());
        match entries.next_file() {
            Err(Error::BadBlockSignature { folder: 1, block: 0 }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
        assert_eq!(entries.remaining(), 0);
        assert!(entries.next_file().unwrap().is_none());
    }

    #[test]
    fn file_past_folder_end_is_skipped() {
        let mut binary = TWO_FOLDERS.to_vec();
        // Declare the first file as 15 bytes in a 14-byte folder.
        binary[0x34] = 0x0f;
        let mut cabinet = Cabinet::new(Cursor::new(binary)).unwrap();
        let mut entries = cabinet.entries();
        match entries.next_file() {
            Err(Error::OffsetOutOfRange {
                offset: 0,
                size: 15,
                folder_len: 14,
                ..
            }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
        let (mut reader, info) = entries.next_file().unwrap().unwrap();
        assert_eq!(info.name(), "hi.zip");
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"Hello, world!\n");
    }

    #[test]
    fn for_each_file_visits_everything() {
        let mut cabinet = Cabinet::new(Cursor::new(TWO_FOLDERS)).unwrap();
        let mut seen = Vec::new();
        cabinet
            .entries()
            .for_each_file(|info, data| {
                seen.push((info.name().to_string(), data.len()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![("hi.txt".to_string(), 14), ("hi.zip".to_string(), 14)]
        );
    }
}
