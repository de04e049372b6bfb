use crate::cache::format::CONTAINER_HEADER_SIZE;
use crate::error::{CacheError, Result};
use crate::payload::PayloadKind;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Gzip stream signature, found at offset 4 of a stripped container
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Bzip2 block magic (pi), found at offset 4 of a stripped container whose
/// `BZh1` stream header was dropped
pub const BZIP2_BLOCK_MAGIC: [u8; 6] = [0x31, 0x41, 0x59, 0x26, 0x53, 0x59];

/// Bzip2 stream header restored before inflating: `BZ`, version `h`, 100k blocks
pub const BZIP2_STREAM_HEADER: [u8; 4] = [b'B', b'Z', b'h', b'1'];

/// Length prefix in front of a compressed stream
pub const COMPRESSED_PREFIX_SIZE: usize = 4;

/// Compression layer detected on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLayer {
    None,
    Gzip,
    Bzip2,
}

impl CompressionLayer {
    /// Detect the layer of a container with its 5 leading bytes already
    /// stripped. Gzip is checked first and wins if both patterns match.
    pub fn detect(stripped: &[u8]) -> Self {
        let magic_at = |magic: &[u8]| {
            stripped
                .get(COMPRESSED_PREFIX_SIZE..COMPRESSED_PREFIX_SIZE + magic.len())
                .is_some_and(|bytes| bytes == magic)
        };

        if magic_at(&GZIP_MAGIC) {
            Self::Gzip
        } else if magic_at(&BZIP2_BLOCK_MAGIC) {
            Self::Bzip2
        } else {
            Self::None
        }
    }
}

/// A logical file decoded out of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub archive: u8,
    pub file: u32,
    pub data: Vec<u8>,
    pub kind: PayloadKind,
    pub layer: CompressionLayer,
}

impl DecodedFile {
    /// Extension inferred from the payload, without the dot
    pub fn extension(&self) -> Option<&'static str> {
        self.kind.extension()
    }

    /// Output file name: the file id plus the inferred extension
    pub fn file_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{}", self.file, ext),
            None => self.file.to_string(),
        }
    }
}

/// Strip container metadata from a raw chain buffer, unwrap at most one
/// compression layer, and classify the payload.
pub fn resolve(archive: u8, file: u32, raw: &[u8]) -> Result<DecodedFile> {
    let stripped = raw.get(CONTAINER_HEADER_SIZE..).unwrap_or_default();

    let layer = CompressionLayer::detect(stripped);
    let data = match layer {
        CompressionLayer::None => stripped.to_vec(),
        CompressionLayer::Gzip => inflate_gzip(&stripped[COMPRESSED_PREFIX_SIZE..])?,
        CompressionLayer::Bzip2 => inflate_bzip2(&stripped[COMPRESSED_PREFIX_SIZE..])?,
    };

    let kind = PayloadKind::sniff(&data);
    debug!(archive, file, ?layer, ?kind, size = data.len(), "Resolved container");

    Ok(DecodedFile {
        archive,
        file,
        data,
        kind,
        layer,
    })
}

/// Inflate a gzip stream into a growable buffer
fn inflate_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|e| CacheError::DecompressionFailed(format!("Gzip decompression failed: {}", e)))?;
    Ok(output)
}

/// Inflate a bzip2 stream whose `BZh1` header was stripped by the container
fn inflate_bzip2(data: &[u8]) -> Result<Vec<u8>> {
    let mut stream = Vec::with_capacity(BZIP2_STREAM_HEADER.len() + data.len());
    stream.extend_from_slice(&BZIP2_STREAM_HEADER);
    stream.extend_from_slice(data);

    let mut output = Vec::new();
    BzDecoder::new(&stream[..])
        .read_to_end(&mut output)
        .map_err(|e| CacheError::DecompressionFailed(format!("Bzip2 decompression failed: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip2_headerless(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(1));
        encoder.write_all(data).unwrap();
        let stream = encoder.finish().unwrap();
        assert_eq!(&stream[..4], &BZIP2_STREAM_HEADER);
        stream[4..].to_vec()
    }

    /// 5 container bytes, 4-byte length prefix, then the compressed stream
    fn container(compression: u8, stream: &[u8]) -> Vec<u8> {
        let mut raw = vec![compression];
        raw.extend_from_slice(&(stream.len() as u32).to_be_bytes());
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.extend_from_slice(stream);
        raw
    }

    #[test]
    fn test_plain_container_only_stripped() {
        let raw = b"\x00\x00\x00\x00\x0aplain payload";
        let decoded = resolve(3, 4, raw).unwrap();
        assert_eq!(decoded.data, b"plain payload");
        assert_eq!(decoded.layer, CompressionLayer::None);
        assert_eq!(decoded.kind, PayloadKind::Unknown);
        assert_eq!(decoded.file_name(), "4");
    }

    #[test]
    fn test_gzip_layer() {
        let payload = b"OggS gzip compressed audio".repeat(20);
        let raw = container(2, &gzip(&payload));

        let decoded = resolve(40, 1, &raw).unwrap();
        assert_eq!(decoded.layer, CompressionLayer::Gzip);
        assert_eq!(decoded.data, payload);
        assert_eq!(decoded.kind, PayloadKind::Ogg);
        assert_eq!(decoded.file_name(), "1.ogg");
    }

    #[test]
    fn test_bzip2_layer() {
        let payload = b"JAGA bzip2 compressed manifest".repeat(30);
        let raw = container(1, &bzip2_headerless(&payload));

        let decoded = resolve(40, 2, &raw).unwrap();
        assert_eq!(decoded.layer, CompressionLayer::Bzip2);
        assert_eq!(decoded.data, payload);
        assert_eq!(decoded.extension(), Some("jaga"));
    }

    #[test]
    fn test_single_layer_only() {
        // Inflated content itself looks like a headerless bzip2 container
        let mut inner = vec![0u8, 0, 0, 0];
        inner.extend_from_slice(&BZIP2_BLOCK_MAGIC);
        inner.extend_from_slice(b"not really bzip2");
        let raw = container(2, &gzip(&inner));

        let decoded = resolve(0, 0, &raw).unwrap();
        assert_eq!(decoded.layer, CompressionLayer::Gzip);
        assert_eq!(decoded.data, inner);
    }

    #[test]
    fn test_gzip_precedence_in_detection() {
        let mut stripped = vec![0u8; 4];
        stripped.extend_from_slice(&GZIP_MAGIC);
        stripped.extend_from_slice(&BZIP2_BLOCK_MAGIC[2..]);
        assert_eq!(CompressionLayer::detect(&stripped), CompressionLayer::Gzip);

        let mut stripped = vec![0u8; 4];
        stripped.extend_from_slice(&BZIP2_BLOCK_MAGIC);
        assert_eq!(CompressionLayer::detect(&stripped), CompressionLayer::Bzip2);

        assert_eq!(CompressionLayer::detect(&[0, 0, 0, 0, 0x1f]), CompressionLayer::None);
    }

    #[test]
    fn test_corrupt_gzip_fails() {
        let mut stream = gzip(&vec![7u8; 4096]);
        let len = stream.len();
        stream.truncate(len / 2);
        let raw = container(2, &stream);

        assert!(matches!(
            resolve(0, 0, &raw),
            Err(CacheError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn test_corrupt_bzip2_fails() {
        let mut stream = vec![0u8; 4];
        stream.extend_from_slice(&BZIP2_BLOCK_MAGIC);
        stream.extend_from_slice(&[0xff; 32]);
        let mut raw = vec![1u8, 0, 0, 0, 0];
        raw.extend_from_slice(&stream);

        assert!(matches!(
            resolve(0, 0, &raw),
            Err(CacheError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn test_short_buffers() {
        assert_eq!(resolve(0, 0, &[1, 2, 3]).unwrap().data, Vec::<u8>::new());
        assert_eq!(resolve(0, 0, &[0, 0, 0, 0, 0, b'O']).unwrap().data, b"O");
    }
}
