//! Builds small caches on disk for integration tests

#![allow(dead_code)]

use rscache::{CacheConfig, SECTOR_SIZE};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// A cache directory assembled sector by sector
pub struct CacheFixture {
    pub dir: TempDir,
    data: Vec<u8>,
    indexes: BTreeMap<u8, Vec<u8>>,
}

impl CacheFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            // Sector 0 is never part of a chain
            data: vec![0; SECTOR_SIZE],
            indexes: BTreeMap::new(),
        }
    }

    /// Append the sector chain of `raw` and point the index record at it.
    /// Returns the first sector number.
    pub fn add_file(&mut self, archive: u8, file: u32, raw: &[u8]) -> u32 {
        let large = file >= 65536;
        let capacity = if large { 510 } else { 512 };
        let first = (self.data.len() / SECTOR_SIZE) as u32;

        let chunks: Vec<&[u8]> = raw.chunks(capacity).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let sector = (self.data.len() / SECTOR_SIZE) as u32;
            let next = if i + 1 < chunks.len() { sector + 1 } else { 0 };

            let mut block = Vec::with_capacity(SECTOR_SIZE);
            if large {
                block.extend_from_slice(&file.to_be_bytes());
            } else {
                block.extend_from_slice(&(file as u16).to_be_bytes());
            }
            block.extend_from_slice(&(i as u16).to_be_bytes());
            block.extend_from_slice(&next.to_be_bytes()[1..]);
            block.push(archive);
            block.extend_from_slice(chunk);
            block.resize(SECTOR_SIZE, 0);
            self.data.extend(block);
        }

        self.set_record(archive, file, raw.len() as u32, first);
        first
    }

    /// Start the next chain at `sector`, leaving zeroed sectors before it
    pub fn pad_to_sector(&mut self, sector: u32) {
        let len = sector as usize * SECTOR_SIZE;
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }

    /// Write an index record directly
    pub fn set_record(&mut self, archive: u8, file: u32, size: u32, sector: u32) {
        let index = self.indexes.entry(archive).or_default();
        let pos = file as usize * 6;
        if index.len() < pos + 6 {
            index.resize(pos + 6, 0);
        }
        index[pos..pos + 3].copy_from_slice(&size.to_be_bytes()[1..]);
        index[pos + 3..pos + 6].copy_from_slice(&sector.to_be_bytes()[1..]);
    }

    /// Make sure an index file exists, even without records
    pub fn touch_index(&mut self, archive: u8) {
        self.indexes.entry(archive).or_default();
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn data_path(&self) -> PathBuf {
        self.cache_dir().join("main_file_cache.dat2")
    }

    /// Write the data and index files and return a configuration for them
    pub fn write(&self) -> CacheConfig {
        let cache_dir = self.cache_dir();
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(self.data_path(), &self.data).unwrap();
        for (archive, index) in &self.indexes {
            fs::write(cache_dir.join(format!("main_file_cache.idx{}", archive)), index).unwrap();
        }

        let mut config = CacheConfig::new(cache_dir, self.dir.path().join("out"));
        config.temp_dir = self.dir.path().join("tmp");
        config.workers = 2;
        config
    }

    /// Overwrite bytes of the written data file
    pub fn patch_data(&self, offset: usize, bytes: &[u8]) {
        let mut data = fs::read(self.data_path()).unwrap();
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        fs::write(self.data_path(), data).unwrap();
    }
}

/// Container without a compression layer
pub fn plain(payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![0, 0, 0, 0, payload.len() as u8];
    raw.extend_from_slice(payload);
    raw
}

/// Container holding a gzip stream
pub fn gzip_container(payload: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    let stream = encoder.finish().unwrap();

    let mut raw = vec![2, 0, 0, 0, 0];
    raw.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    raw.extend(stream);
    raw
}

/// Container holding a bzip2 stream with its `BZh1` header removed
pub fn bzip2_container(payload: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(1));
    encoder.write_all(payload).unwrap();
    let stream = encoder.finish().unwrap();
    assert_eq!(&stream[..4], b"BZh1");

    let mut raw = vec![1, 0, 0, 0, 0];
    raw.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    raw.extend_from_slice(&stream[4..]);
    raw
}

/// An ogg page lookalike
pub fn ogg(body: &[u8]) -> Vec<u8> {
    let mut data = b"OggS".to_vec();
    data.extend_from_slice(body);
    data
}

/// Jaga manifest with `(length, file id)` descriptors and an embedded first chunk
pub fn jaga(chunks: &[(u32, u32)], embedded: &[u8]) -> Vec<u8> {
    let mut data = b"JAGA".to_vec();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&2u32.to_be_bytes());
    data.extend_from_slice(&22_050u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&(chunks.len() as u32).to_be_bytes());
    for (length, file) in chunks {
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&file.to_be_bytes());
    }
    data.extend_from_slice(embedded);
    data
}

/// Track name resolution file with the given name and file tables
pub fn name_resolution(names: &[(u16, &str)], files: &[(u16, u32)]) -> Vec<u8> {
    let mut data = vec![0x00, 0x01, 0x69];

    data.extend_from_slice(&[0x00, 0x66, 0x24, 0x07, 0x10, 0x20]);
    data.extend_from_slice(&(names.len() as u16).to_be_bytes());
    for (track, name) in names {
        data.extend_from_slice(&track.to_be_bytes());
        data.extend_from_slice(name.as_bytes());
        data.push(0);
    }

    data.extend_from_slice(&[0x00, 0x66, 0x0b, 0x08, 0x30, 0x40]);
    data.extend_from_slice(&(files.len() as u16).to_be_bytes());
    for (track, file) in files {
        data.extend_from_slice(&track.to_be_bytes());
        data.extend_from_slice(&file.to_be_bytes());
    }
    data
}
