use crate::cache::format::{FileLocation, INDEX_RECORD_SIZE};
use crate::error::{CacheError, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Lookup of file locations in one archive's index file
pub struct IndexStore<R = File> {
    archive: u8,
    reader: R,
    len: u64,
}

impl IndexStore<File> {
    /// Open the index file of an archive
    pub fn open<P: AsRef<Path>>(archive: u8, path: P) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::IndexFileMissing { archive });
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        Ok(Self::new(archive, file, len))
    }
}

impl<R: Read + Seek> IndexStore<R> {
    /// Wrap an already opened index of `len` bytes
    pub fn new(archive: u8, reader: R, len: u64) -> Self {
        Self { archive, reader, len }
    }

    pub fn archive(&self) -> u8 {
        self.archive
    }

    /// Number of records in the index
    pub fn file_count(&self) -> u32 {
        (self.len / INDEX_RECORD_SIZE as u64) as u32
    }

    /// Read the record of `file`. The location is returned as stored; use
    /// [`FileLocation::is_valid`] before following it.
    pub fn locate(&mut self, file: u32) -> Result<FileLocation> {
        let position = u64::from(file) * INDEX_RECORD_SIZE as u64;
        if position + INDEX_RECORD_SIZE as u64 > self.len {
            return Err(CacheError::RecordOutOfRange {
                archive: self.archive,
                file,
            });
        }

        self.reader.seek(SeekFrom::Start(position))?;
        let mut record = [0u8; INDEX_RECORD_SIZE];
        self.reader.read_exact(&mut record)?;

        Ok(FileLocation::from_record(self.archive, file, &record))
    }
}
