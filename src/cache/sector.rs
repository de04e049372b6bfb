use crate::cache::format::{header_size, is_large_file, payload_capacity, FileLocation, SectorHeader};
use crate::error::{CacheError, Result};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Walks sector chains in the monolithic data file
pub struct SectorReader<R> {
    reader: R,
    data_len: u64,
}

impl<R: Read + Seek> SectorReader<R> {
    pub fn new(reader: R, data_len: u64) -> Self {
        Self { reader, data_len }
    }

    /// Length of the underlying data file
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Reassemble the raw bytes of a file by following its sector chain.
    ///
    /// Each sector must carry the expected file id, chunk sequence number and
    /// archive id; the first mismatch fails the whole file, so no partial
    /// buffer is ever returned.
    pub fn read_chain(&mut self, location: &FileLocation) -> Result<Vec<u8>> {
        if !location.is_valid(self.data_len) {
            return Err(CacheError::InvalidLocation {
                archive: location.archive,
                file: location.file,
                size: location.size,
                offset: location.offset,
            });
        }

        let size = location.size as usize;
        let large = is_large_file(location.file);
        let capacity = payload_capacity(location.file);

        let mut buffer = Vec::with_capacity(size);
        let mut offset = location.offset;
        let mut chunk: u16 = 0;

        while buffer.len() < size {
            let integrity = |reason: String| CacheError::ChunkIntegrity {
                archive: location.archive,
                file: location.file,
                chunk,
                reason,
            };

            if offset == 0 || offset + header_size(location.file) as u64 > self.data_len {
                return Err(integrity(format!("sector offset {} outside data file", offset)));
            }

            self.reader.seek(SeekFrom::Start(offset))?;
            let header = SectorHeader::read_from(&mut self.reader, large)
                .map_err(|e| eof_as_integrity(e, &integrity))?;

            if header.file != location.file {
                return Err(integrity(format!(
                    "file id mismatch: expected {}, got {}",
                    location.file, header.file
                )));
            }
            if header.chunk != chunk {
                return Err(integrity(format!(
                    "chunk mismatch: expected {}, got {}",
                    chunk, header.chunk
                )));
            }
            if header.archive != location.archive {
                return Err(integrity(format!(
                    "archive id mismatch: expected {}, got {}",
                    location.archive, header.archive
                )));
            }
            if header.next_offset >= self.data_len {
                return Err(integrity(format!(
                    "next sector offset {} outside data file",
                    header.next_offset
                )));
            }

            let take = capacity.min(size - buffer.len());
            let start = buffer.len();
            buffer.resize(start + take, 0);
            self.reader
                .read_exact(&mut buffer[start..])
                .map_err(|e| eof_as_integrity(e, &integrity))?;

            offset = header.next_offset;
            chunk = chunk.wrapping_add(1);
        }

        Ok(buffer)
    }
}

/// A sector cut short by the end of the data file is a broken chain, not an I/O fault
fn eof_as_integrity(err: std::io::Error, integrity: &impl Fn(String) -> CacheError) -> CacheError {
    if err.kind() == ErrorKind::UnexpectedEof {
        integrity("sector truncated by end of data file".to_string())
    } else {
        CacheError::Io(err)
    }
}
