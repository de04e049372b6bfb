//! Copies combined soundtracks to `<output>/soundtrack/named/<track name>.<ext>`

use crate::cache::CacheReader;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::names::NameTable;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingOptions {
    pub overwrite: bool,
    /// Also name tracks from `soundtrack/incomplete/`
    pub include_incomplete: bool,
    /// Only name this soundtrack file id
    pub only: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingReport {
    pub copied: usize,
    /// A file with the target name exists and overwriting is off
    pub existing: usize,
    /// No name known for the file id
    pub unnamed: usize,
}

/// Decode and parse the track name resolution file named by the configuration
pub fn load_name_table(reader: &mut CacheReader) -> Result<NameTable> {
    let archive = reader.config().names_archive;
    let file = reader.config().names_file;
    let decoded = reader.decode(archive, file)?;
    NameTable::parse(&decoded)
}

pub struct TrackNamer<'a> {
    config: &'a CacheConfig,
    table: &'a NameTable,
    options: NamingOptions,
}

impl<'a> TrackNamer<'a> {
    pub fn new(config: &'a CacheConfig, table: &'a NameTable, options: NamingOptions) -> Self {
        Self {
            config,
            table,
            options,
        }
    }

    /// Copy every combined track that has a known name
    pub fn run(&self) -> Result<NamingReport> {
        let source = self.config.soundtrack_dir();
        let target = source.join("named");

        let mut report = self.copy_named(&source, &target)?;
        if self.options.include_incomplete {
            let incomplete = self.copy_named(&source.join("incomplete"), &target.join("incomplete"))?;
            report.copied += incomplete.copied;
            report.existing += incomplete.existing;
            report.unnamed += incomplete.unnamed;
        }

        info!(?report, "Done naming tracks");
        Ok(report)
    }

    fn copy_named(&self, source: &Path, target: &Path) -> Result<NamingReport> {
        let mut report = NamingReport::default();
        let entries = match fs::read_dir(source) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %source.display(), "No tracks to name");
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };
        fs::create_dir_all(target)?;

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(file) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
            else {
                continue;
            };
            if self.options.only.is_some_and(|only| only != file) {
                continue;
            }

            let Some(name) = self
                .table
                .name_for_file(file)
                .filter(|name| *name != "." && *name != "..")
            else {
                debug!(file, "No name for track");
                report.unnamed += 1;
                continue;
            };

            let mut destination = target.join(name);
            if let Some(ext) = path.extension() {
                let mut file_name = destination.into_os_string();
                file_name.push(".");
                file_name.push(ext);
                destination = file_name.into();
            }

            if destination.exists() && !self.options.overwrite {
                report.existing += 1;
                continue;
            }

            fs::copy(&path, &destination)?;
            info!(path = %destination.display(), "Named track");
            report.copied += 1;
        }

        Ok(report)
    }
}
