use std::io::Read;

/// Size of one sector in the data file
pub const SECTOR_SIZE: usize = 520;

/// Size of one record in an index file
pub const INDEX_RECORD_SIZE: usize = 6;

/// Sector header size for file ids below [`LARGE_FILE_THRESHOLD`]
pub const SECTOR_HEADER_SIZE: usize = 8;

/// Sector header size for large file ids (4-byte id)
pub const LARGE_SECTOR_HEADER_SIZE: usize = 10;

/// File ids from here on use the extended sector header
pub const LARGE_FILE_THRESHOLD: u32 = 65536;

/// Leading container bytes that precede every reconstructed file
pub const CONTAINER_HEADER_SIZE: usize = 5;

/// Where a logical file lives inside the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    pub archive: u8,
    pub file: u32,
    /// Total bytes of the chunk chain, container header included
    pub size: u32,
    /// Byte offset of the first sector (sector number * 520)
    pub offset: u64,
}

impl FileLocation {
    /// Decode a 6-byte index record: 3-byte size, 3-byte sector number
    pub fn from_record(archive: u8, file: u32, record: &[u8; INDEX_RECORD_SIZE]) -> Self {
        let size = be_u24(&record[0..3]);
        let sector = be_u24(&record[3..6]);
        Self {
            archive,
            file,
            size,
            offset: u64::from(sector) * SECTOR_SIZE as u64,
        }
    }

    /// A zero size, a zero offset, or a chain that cannot fit in the data file
    /// means the record does not describe a readable file.
    pub fn is_valid(&self, data_len: u64) -> bool {
        self.size > 0 && self.offset > 0 && self.offset + u64::from(self.size) <= data_len
    }
}

/// Whether sectors of this file use the extended 10-byte header
pub fn is_large_file(file: u32) -> bool {
    file >= LARGE_FILE_THRESHOLD
}

/// Payload bytes carried by one sector of the given file
pub fn payload_capacity(file: u32) -> usize {
    SECTOR_SIZE - header_size(file)
}

/// Large sector headers carry a 4-byte file id, but only its low 24 bits are
/// compared against the index
const LARGE_FILE_ID_MASK: u32 = 0x00ff_ffff;

pub fn header_size(file: u32) -> usize {
    if is_large_file(file) {
        LARGE_SECTOR_HEADER_SIZE
    } else {
        SECTOR_HEADER_SIZE
    }
}

/// Integrity fields at the start of each sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    pub file: u32,
    pub chunk: u16,
    /// Byte offset of the next sector (sector number * 520)
    pub next_offset: u64,
    pub archive: u8,
}

impl SectorHeader {
    /// Read a sector header. `large` selects the 4-byte file id layout.
    pub fn read_from<R: Read>(mut reader: R, large: bool) -> std::io::Result<Self> {
        let file = if large {
            read_u32(&mut reader)? & LARGE_FILE_ID_MASK
        } else {
            u32::from(read_u16(&mut reader)?)
        };
        let chunk = read_u16(&mut reader)?;
        let next_sector = read_u24(&mut reader)?;
        let mut archive = [0u8; 1];
        reader.read_exact(&mut archive)?;

        Ok(Self {
            file,
            chunk,
            next_offset: u64::from(next_sector) * SECTOR_SIZE as u64,
            archive: archive[0],
        })
    }
}

/// Big-endian 24-bit integer from the first three bytes
pub fn be_u24(bytes: &[u8]) -> u32 {
    (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
}

/// Big-endian u16 at `pos`, if the slice is long enough
pub fn be_u16_at(data: &[u8], pos: usize) -> Option<u16> {
    let bytes = data.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Big-endian u32 at `pos`, if the slice is long enough
pub fn be_u32_at(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = data.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// Helper functions for reading primitive types
fn read_u16<R: Read>(mut reader: R) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u24<R: Read>(mut reader: R) -> std::io::Result<u32> {
    let mut buf = [0u8; 3];
    reader.read_exact(&mut buf)?;
    Ok(be_u24(&buf))
}

fn read_u32<R: Read>(mut reader: R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
