//! Batch extraction of decoded files to `<output>/<archive>/<file>[.ext]`

use crate::cache::{CacheReader, DecodedFile};
use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counters of one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub written: usize,
    /// Already extracted and not overwritten
    pub skipped: usize,
    /// Empty or out of bounds index records
    pub invalid: usize,
    /// Broken chains, failed decompression
    pub failed: usize,
}

impl ExtractReport {
    pub fn merge(&mut self, other: ExtractReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.invalid += other.invalid;
        self.failed += other.failed;
    }
}

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
}

pub struct Extractor<'a> {
    reader: &'a mut CacheReader,
    overwrite: bool,
}

impl<'a> Extractor<'a> {
    pub fn new(reader: &'a mut CacheReader) -> Self {
        Self {
            reader,
            overwrite: false,
        }
    }

    /// Replace files that were extracted before
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Extract every archive that has an index file
    pub fn extract_all(&mut self) -> Result<ExtractReport> {
        let mut report = ExtractReport::default();
        for archive in self.reader.archive_ids() {
            match self.extract_archive(archive) {
                Ok(archive_report) => report.merge(archive_report),
                Err(CacheError::IndexFileMissing { archive }) => {
                    warn!(archive, "Index file disappeared, skipping archive");
                }
                Err(e) => return Err(e),
            }
        }
        info!(?report, "Done extracting files");
        Ok(report)
    }

    /// Extract every file of one archive. Per-file failures are logged and
    /// counted; only I/O errors on the output side abort the run.
    pub fn extract_archive(&mut self, archive: u8) -> Result<ExtractReport> {
        let count = self.reader.file_count(archive)?;
        let dir = self.reader.config().archive_output_dir(archive);
        let mut existing = scan_extracted(&dir)?;
        let mut report = ExtractReport::default();

        for file in 0..count {
            let previous = existing.remove(&file);
            match self.extract_into(&dir, archive, file, previous) {
                Ok(ExtractOutcome::Written(_)) => report.written += 1,
                Ok(ExtractOutcome::Skipped(path)) => {
                    debug!(path = %path.display(), "Skipping file because it already exists");
                    report.skipped += 1;
                }
                Err(e @ CacheError::InvalidLocation { .. }) => {
                    debug!(archive, file, error = %e, "Ignoring file because of size or offset");
                    report.invalid += 1;
                }
                Err(e) if e.is_file_local() => {
                    warn!(archive, file, error = %e, "Ignoring file");
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(archive, ?report, "Extracted archive");
        Ok(report)
    }

    /// Decode one file and write it out
    pub fn extract_file(&mut self, archive: u8, file: u32) -> Result<ExtractOutcome> {
        let dir = self.reader.config().archive_output_dir(archive);
        let previous = find_extracted(&dir, file)?;
        self.extract_into(&dir, archive, file, previous)
    }

    fn extract_into(
        &mut self,
        dir: &Path,
        archive: u8,
        file: u32,
        previous: Option<PathBuf>,
    ) -> Result<ExtractOutcome> {
        if let Some(existing) = previous.as_ref().filter(|_| !self.overwrite) {
            return Ok(ExtractOutcome::Skipped(existing.clone()));
        }

        let decoded = self.reader.decode(archive, file)?;
        let path = replace_extracted(dir, &decoded, previous.as_deref())?;
        Ok(ExtractOutcome::Written(path))
    }
}

/// Write a decoded file into `dir`, replacing any earlier version of the same
/// file id regardless of its extension.
pub fn write_decoded(dir: &Path, decoded: &DecodedFile) -> Result<PathBuf> {
    let previous = find_extracted(dir, decoded.file)?;
    replace_extracted(dir, decoded, previous.as_deref())
}

fn replace_extracted(dir: &Path, decoded: &DecodedFile, previous: Option<&Path>) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let path = dir.join(decoded.file_name());
    if let Some(previous) = previous.filter(|previous| *previous != path) {
        fs::remove_file(previous)?;
    }

    fs::write(&path, &decoded.data)?;
    debug!(path = %path.display(), size = decoded.data.len(), "Wrote file");
    Ok(path)
}

/// Path of an extracted file named `<file>` or `<file>.<ext>` in `dir`
pub fn find_extracted(dir: &Path, file: u32) -> Result<Option<PathBuf>> {
    let Some(entries) = read_output_dir(dir)? else {
        return Ok(None);
    };

    for entry in entries {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .and_then(extracted_id)
            .is_some_and(|id| id == file);
        if matches && entry.file_type()?.is_file() {
            return Ok(Some(entry.path()));
        }
    }

    Ok(None)
}

/// Every extracted file in `dir`, by file id. The first entry wins when an id
/// was written with several extensions.
pub fn scan_extracted(dir: &Path) -> Result<HashMap<u32, PathBuf>> {
    let mut found = HashMap::new();
    let Some(entries) = read_output_dir(dir)? else {
        return Ok(found);
    };

    for entry in entries {
        let entry = entry?;
        let Some(id) = entry.file_name().to_str().and_then(extracted_id) else {
            continue;
        };
        if entry.file_type()?.is_file() {
            found.entry(id).or_insert_with(|| entry.path());
        }
    }

    debug!(path = %dir.display(), files = found.len(), "Scanned extracted files");
    Ok(found)
}

fn read_output_dir(dir: &Path) -> Result<Option<fs::ReadDir>> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// File id of an output name `<id>` or `<id>.<ext>`
fn extracted_id(name: &str) -> Option<u32> {
    let stem = match name.split_once('.') {
        Some((_, "")) => return None,
        Some((stem, _)) => stem,
        None => name,
    };
    let id: u32 = stem.parse().ok()?;
    (id.to_string() == stem).then_some(id)
}
