//! Jaga soundtrack manifests
//!
//! A jaga file indexes the ogg chunks of one soundtrack. Layout, all
//! integers big-endian:
//!
//! ```text
//! 0   "JAGA"
//! 4   u32  (opaque)
//! 8   u32  (opaque)
//! 12  u32  sample rate
//! 16  u32  (opaque)
//! 20  u32  chunk count
//! 24  chunk descriptors: u32 length, u32 file id  (chunk count times)
//! ..  "OggS..." first chunk, embedded up to the end of the file
//! ```
//!
//! The first descriptor describes the embedded chunk; every later one names a
//! file in the same archive that holds the next chunk.

use crate::cache::{be_u32_at, DecodedFile};
use crate::error::{CacheError, Result};
use crate::payload::{JAGA_MAGIC, OGG_MAGIC};

/// Fixed header length, up to the first chunk descriptor
pub const JAGA_HEADER_SIZE: usize = 24;

const CHUNK_COUNT_OFFSET: usize = 20;
const SAMPLE_RATE_OFFSET: usize = 12;
const DESCRIPTOR_SIZE: usize = 8;

/// One chunk of a soundtrack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JagaChunk {
    pub length: u32,
    pub file: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JagaManifest {
    pub sample_rate: u32,
    /// Descriptors in playback order; always as many as the declared count
    pub chunks: Vec<JagaChunk>,
    /// Audio of chunk 0, starting at its `OggS` marker
    pub embedded: Vec<u8>,
}

impl JagaManifest {
    /// Parse a decoded jaga file
    pub fn parse(file: &DecodedFile) -> Result<Self> {
        Self::parse_bytes(&file.data)
    }

    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < JAGA_HEADER_SIZE {
            return Err(CacheError::ManifestFormat(format!(
                "header needs {} bytes, file has {}",
                JAGA_HEADER_SIZE,
                data.len()
            )));
        }
        if data[..4] != JAGA_MAGIC {
            return Err(CacheError::ManifestFormat("missing JAGA magic".to_string()));
        }

        let sample_rate = be_u32_at(data, SAMPLE_RATE_OFFSET).unwrap_or_default();
        let declared = be_u32_at(data, CHUNK_COUNT_OFFSET).unwrap_or_default();

        let mut chunks = Vec::new();
        let mut pos = JAGA_HEADER_SIZE;
        loop {
            let field = data.get(pos..pos + 4).ok_or_else(|| {
                CacheError::ManifestFormat(format!(
                    "no OggS marker after {} chunk descriptors",
                    chunks.len()
                ))
            })?;
            if field == OGG_MAGIC {
                break;
            }

            let (length, file) = be_u32_at(data, pos)
                .zip(be_u32_at(data, pos + 4))
                .ok_or_else(|| {
                    CacheError::ManifestFormat(format!("descriptor {} truncated", chunks.len()))
                })?;
            chunks.push(JagaChunk { length, file });
            pos += DESCRIPTOR_SIZE;
        }

        if chunks.len() as u64 != u64::from(declared) {
            return Err(CacheError::ManifestFormat(format!(
                "declares {} chunks, lists {}",
                declared,
                chunks.len()
            )));
        }

        Ok(Self {
            sample_rate,
            chunks,
            embedded: data[pos..].to_vec(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// File ids of all chunks, the embedded one first
    pub fn chunk_file_ids(&self) -> Vec<u32> {
        self.chunks.iter().map(|chunk| chunk.file).collect()
    }

    /// File ids that must be fetched from the archive (every chunk but the first)
    pub fn referenced_file_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.chunks.iter().skip(1).map(|chunk| chunk.file)
    }

    /// Referenced chunk files for which `exists` is false
    pub fn missing_chunks<F: FnMut(u32) -> bool>(&self, mut exists: F) -> Vec<u32> {
        self.referenced_file_ids().filter(|&id| !exists(id)).collect()
    }

    /// A manifest is complete when every referenced chunk file exists
    pub fn is_complete<F: FnMut(u32) -> bool>(&self, exists: F) -> bool {
        self.missing_chunks(exists).is_empty()
    }
}
