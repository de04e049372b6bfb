use crate::cache::compression::{resolve, DecodedFile};
use crate::cache::format::FileLocation;
use crate::cache::index::IndexStore;
use crate::cache::sector::SectorReader;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use tracing::{debug, info};

/// Decodes logical files out of a cache directory.
///
/// A reader owns its file handles and read cursors. Workers decoding in
/// parallel each take their own reader via [`CacheReader::reopen`].
pub struct CacheReader {
    config: CacheConfig,
    sectors: SectorReader<File>,
    indexes: HashMap<u8, IndexStore>,
}

impl CacheReader {
    /// Open the data file named by the configuration. Index files are opened
    /// lazily, per archive.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let data_path = config.data_file_path();
        let file = File::open(&data_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CacheError::DataFileMissing(data_path.clone()),
            _ => CacheError::Io(e),
        })?;
        let data_len = file.metadata()?.len();

        info!(path = %data_path.display(), size = data_len, "Opened cache data file");

        Ok(Self {
            config,
            sectors: SectorReader::new(file, data_len),
            indexes: HashMap::new(),
        })
    }

    /// A second reader over the same cache with independent handles
    pub fn reopen(&self) -> Result<Self> {
        Self::open(self.config.clone())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Length of the monolithic data file
    pub fn data_len(&self) -> u64 {
        self.sectors.data_len()
    }

    /// Archives that have an index file, in ascending order
    pub fn archive_ids(&self) -> Vec<u8> {
        (0..=u8::MAX)
            .filter(|&archive| self.config.index_file_path(archive).is_file())
            .collect()
    }

    /// Number of index records of an archive
    pub fn file_count(&mut self, archive: u8) -> Result<u32> {
        Ok(self.index(archive)?.file_count())
    }

    /// Read the index record of a file
    pub fn locate(&mut self, archive: u8, file: u32) -> Result<FileLocation> {
        self.index(archive)?.locate(file)
    }

    /// Raw chain bytes of a file, container header included
    pub fn read_raw(&mut self, archive: u8, file: u32) -> Result<Vec<u8>> {
        let location = self.locate(archive, file)?;
        self.sectors.read_chain(&location)
    }

    /// Decode one logical file: locate, read the chain, resolve compression
    pub fn decode(&mut self, archive: u8, file: u32) -> Result<DecodedFile> {
        let raw = self.read_raw(archive, file)?;
        debug!(archive, file, raw_size = raw.len(), "Read sector chain");
        resolve(archive, file, &raw)
    }

    fn index(&mut self, archive: u8) -> Result<&mut IndexStore> {
        match self.indexes.entry(archive) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let store = IndexStore::open(archive, self.config.index_file_path(archive))?;
                Ok(entry.insert(store))
            }
        }
    }
}
