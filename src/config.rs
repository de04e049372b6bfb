//! Cache configuration
//!
//! All paths the engine and its collaborators touch come from one explicit
//! [`CacheConfig`] value. It can be built in code, or loaded from a TOML file:
//!
//! ```toml
//! cache_dir = "/home/me/jagexcache/runescape/LIVE"
//! output_dir = "out"
//! combiner = "sox"
//! workers = 4
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// External tool used to concatenate soundtrack chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinerTool {
    /// `oggCat <output> <inputs...>`
    #[default]
    OggCat,
    /// `sox --combine concatenate <inputs...> <output>`
    Sox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory holding the data file and the index files
    pub cache_dir: PathBuf,

    /// Root of everything written by extraction, combining and naming
    pub output_dir: PathBuf,

    /// Scratch directory for soundtrack chunk files
    pub temp_dir: PathBuf,

    /// Name of the monolithic data file inside `cache_dir`
    pub data_file: String,

    /// Index file name prefix; the archive id is appended
    pub index_prefix: String,

    /// Archive holding jaga manifests and ogg chunks
    pub music_archive: u8,

    /// Archive and file id of the track name resolution file
    pub names_archive: u8,
    pub names_file: u32,

    pub combiner: CombinerTool,

    /// Soundtrack worker threads; 0 uses the available parallelism
    pub workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: PathBuf::from("cache"),
            temp_dir: std::env::temp_dir().join("rscache"),
            data_file: "main_file_cache.dat2".to_string(),
            index_prefix: "main_file_cache.idx".to_string(),
            music_archive: 40,
            names_archive: 17,
            names_file: 5,
            combiner: CombinerTool::OggCat,
            workers: 0,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("jagexcache").join("runescape").join("LIVE")
}

impl CacheConfig {
    /// Configuration rooted at the given cache and output directories
    pub fn new(cache_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn data_file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.data_file)
    }

    pub fn index_file_path(&self, archive: u8) -> PathBuf {
        self.cache_dir.join(format!("{}{}", self.index_prefix, archive))
    }

    /// Directory extracted files of one archive are written to
    pub fn archive_output_dir(&self, archive: u8) -> PathBuf {
        self.output_dir.join(archive.to_string())
    }

    /// Directory combined soundtracks are written to
    pub fn soundtrack_dir(&self) -> PathBuf {
        self.output_dir.join("soundtrack")
    }

    /// Resolved worker count, never zero
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
