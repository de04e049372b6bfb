mod compression;
mod format;
mod index;
mod reader;
mod sector;

pub use compression::{
    resolve, CompressionLayer, DecodedFile, BZIP2_BLOCK_MAGIC, BZIP2_STREAM_HEADER, GZIP_MAGIC,
};
pub use format::{
    FileLocation, SectorHeader, CONTAINER_HEADER_SIZE, INDEX_RECORD_SIZE, LARGE_FILE_THRESHOLD,
    SECTOR_SIZE,
};
pub use index::IndexStore;
pub use reader::CacheReader;
pub use sector::SectorReader;

pub(crate) use format::{be_u16_at, be_u32_at};
