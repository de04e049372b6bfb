//! rscache: decoder for sector-chained game asset caches
//!
//! This library reads the `main_file_cache.dat2` / `main_file_cache.idxN` cache
//! layout, combining:
//! - Index lookup and checksum-validated sector chain reassembly
//! - Container unwrapping with gzip/bzip2 layer detection
//! - Jaga soundtrack manifests and the track name resolution table
//! - Batch extraction, soundtrack combining and track naming
//!
//! # Example
//!
//! ```no_run
//! use rscache::{CacheConfig, CacheReader};
//!
//! let config = CacheConfig::new("/path/to/LIVE", "out");
//! let mut reader = CacheReader::open(config)?;
//!
//! let file = reader.decode(40, 1234)?;
//! println!("{} bytes, extension {:?}", file.data.len(), file.extension());
//! # Ok::<(), rscache::CacheError>(())
//! ```

// Core modules
pub mod cache;
pub mod config;
pub mod error;
pub mod jaga;
pub mod names;
pub mod payload;

// Output collaborators
pub mod extract;
pub mod naming;
pub mod soundtrack;

// Re-export commonly used types
pub use cache::{
    resolve, CacheReader, CompressionLayer, DecodedFile, FileLocation, IndexStore, SectorReader,
    INDEX_RECORD_SIZE, SECTOR_SIZE,
};
pub use config::{CacheConfig, CombinerTool};
pub use error::{CacheError, Result};
pub use extract::{ExtractReport, Extractor};
pub use jaga::{JagaChunk, JagaManifest};
pub use names::NameTable;
pub use naming::{NamingOptions, TrackNamer};
pub use payload::{find_first, PayloadKind};
pub use soundtrack::{AudioCombiner, ExternalCombiner, SoundtrackExporter, SoundtrackOptions};
