//! Track name resolution table
//!
//! The resolution file has no fixed layout. Two record tables are found by
//! scanning for their anchor bytes; each table starts 6 bytes after its anchor
//! with a u16 record count:
//!
//! - names: `u16 track id`, NUL-terminated Windows-1252 string
//! - files: `u16 track id`, `u32 file id`
//!
//! Joining both on the track id gives a display name per soundtrack file.

use crate::cache::{be_u16_at, be_u32_at, DecodedFile};
use crate::error::{CacheError, Result};
use crate::payload::find_first;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Marks the track name table
pub const NAMES_ANCHOR: [u8; 4] = [0x00, 0x66, 0x24, 0x07];

/// Marks the track to file id table
pub const FILES_ANCHOR: [u8; 4] = [0x00, 0x66, 0x0b, 0x08];

/// Distance from an anchor to its table's record count
const TABLE_OFFSET: usize = 6;

/// Characters that are not allowed in file names on any supported platform
const ILLEGAL_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    /// Track id to sanitized, non-empty display name
    pub track_names: HashMap<u16, String>,
    /// Soundtrack file id to track id
    pub file_tracks: HashMap<u32, u16>,
}

impl NameTable {
    /// Parse a decoded resolution file
    pub fn parse(file: &DecodedFile) -> Result<Self> {
        Self::parse_bytes(&file.data)
    }

    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let names_at = find_first(data, &NAMES_ANCHOR)
            .ok_or(CacheError::AnchorNotFound { anchor: NAMES_ANCHOR })?;
        let files_at = find_first(data, &FILES_ANCHOR)
            .ok_or(CacheError::AnchorNotFound { anchor: FILES_ANCHOR })?;

        let table = Self {
            track_names: read_names(data, names_at + TABLE_OFFSET),
            file_tracks: read_files(data, files_at + TABLE_OFFSET),
        };

        debug!(
            names = table.track_names.len(),
            files = table.file_tracks.len(),
            "Parsed name table"
        );
        Ok(table)
    }

    /// Display name of a soundtrack file, if both tables know it
    pub fn name_for_file(&self, file: u32) -> Option<&str> {
        let track = self.file_tracks.get(&file)?;
        self.track_names.get(track).map(String::as_str)
    }

    /// The composed file id to display name mapping
    pub fn file_names(&self) -> BTreeMap<u32, String> {
        self.file_tracks
            .iter()
            .filter_map(|(&file, track)| {
                self.track_names
                    .get(track)
                    .map(|name| (file, name.clone()))
            })
            .collect()
    }
}

fn read_names(data: &[u8], start: usize) -> HashMap<u16, String> {
    let mut names = HashMap::new();
    let Some(count) = be_u16_at(data, start) else {
        warn!(offset = start, "Name table count truncated");
        return names;
    };

    let mut pos = start + 2;
    for i in 0..count {
        let Some(track) = be_u16_at(data, pos) else {
            warn!(record = i, count, "Name table truncated");
            break;
        };
        pos += 2;

        let raw = &data[pos..];
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        pos = (pos + len + 1).min(data.len());

        let name = sanitize_name(&raw[..len]);
        if name.trim().is_empty() {
            continue;
        }
        if let Entry::Vacant(entry) = names.entry(track) {
            entry.insert(name);
        }
    }

    names
}

fn read_files(data: &[u8], start: usize) -> HashMap<u32, u16> {
    let mut files = HashMap::new();
    let Some(count) = be_u16_at(data, start) else {
        warn!(offset = start, "File table count truncated");
        return files;
    };

    let mut pos = start + 2;
    for i in 0..count {
        let Some((track, file)) = be_u16_at(data, pos).zip(be_u32_at(data, pos + 2)) else {
            warn!(record = i, count, "File table truncated");
            break;
        };
        pos += 6;

        files.entry(file).or_insert(track);
    }

    files
}

/// Decode a Windows-1252 name and drop characters unusable in file names
pub fn sanitize_name(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter_map(|&b| decode_cp1252(b))
        .filter(|c| !c.is_control() && !ILLEGAL_NAME_CHARS.contains(c))
        .collect()
}

fn decode_cp1252(byte: u8) -> Option<char> {
    let c = match byte {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8a => 'Š',
        0x8b => '‹',
        0x8c => 'Œ',
        0x8e => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9a => 'š',
        0x9b => '›',
        0x9c => 'œ',
        0x9e => 'ž',
        0x9f => 'Ÿ',
        0x81 | 0x8d | 0x8f | 0x90 | 0x9d => return None,
        _ => char::from(byte),
    };
    Some(c)
}
