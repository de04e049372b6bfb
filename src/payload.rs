//! Payload type detection by magic bytes

/// `OggS`
pub const OGG_MAGIC: [u8; 4] = [0x4f, 0x67, 0x67, 0x53];

/// `JAGA`
pub const JAGA_MAGIC: [u8; 4] = [0x4a, 0x41, 0x47, 0x41];

/// `\x89PNG`
pub const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4e, 0x47];

/// Known payload types of decoded files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Ogg,
    Jaga,
    Png,
    Unknown,
}

impl PayloadKind {
    /// Classify a buffer by its first four bytes
    pub fn sniff(data: &[u8]) -> Self {
        match data.get(..4) {
            Some(magic) if magic == OGG_MAGIC => Self::Ogg,
            Some(magic) if magic == JAGA_MAGIC => Self::Jaga,
            Some(magic) if magic == PNG_MAGIC => Self::Png,
            _ => Self::Unknown,
        }
    }

    /// File extension without the dot
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Ogg => Some("ogg"),
            Self::Jaga => Some("jaga"),
            Self::Png => Some("png"),
            Self::Unknown => None,
        }
    }
}

/// Offset of the first occurrence of `needle` in `haystack`
pub fn find_first(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}
