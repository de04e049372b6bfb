use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Unified error type for all cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    // Top-level inputs
    #[error("Cache data file not found: {}", .0.display())]
    DataFileMissing(PathBuf),

    #[error("Index file missing for archive {archive}")]
    IndexFileMissing { archive: u8 },

    // Location errors
    #[error("Index record for file {file} is out of range in archive {archive}")]
    RecordOutOfRange { archive: u8, file: u32 },

    #[error("Invalid location for {archive}/{file}: size {size}, offset {offset}")]
    InvalidLocation {
        archive: u8,
        file: u32,
        size: u32,
        offset: u64,
    },

    // Sector chain errors
    #[error("Chunk {chunk} of {archive}/{file} failed integrity check: {reason}")]
    ChunkIntegrity {
        archive: u8,
        file: u32,
        chunk: u16,
        reason: String,
    },

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    // Sub-format errors
    #[error("Invalid jaga manifest: {0}")]
    ManifestFormat(String),

    #[error("Anchor {anchor:02x?} not found in name table")]
    AnchorNotFound { anchor: [u8; 4] },

    // Collaborator errors
    #[error("{tool} exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    ExternalToolFailure { tool: String, code: Option<i32> },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether this error only concerns a single file, so a batch run should
    /// log it and move on to the next one.
    pub fn is_file_local(&self) -> bool {
        matches!(
            self,
            CacheError::RecordOutOfRange { .. }
                | CacheError::InvalidLocation { .. }
                | CacheError::ChunkIntegrity { .. }
                | CacheError::DecompressionFailed(_)
                | CacheError::ManifestFormat(_)
                | CacheError::ExternalToolFailure { .. }
        )
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        CacheError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CacheError {
    fn from(err: toml::ser::Error) -> Self {
        CacheError::Config(err.to_string())
    }
}
