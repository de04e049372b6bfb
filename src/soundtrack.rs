//! Soundtrack assembly
//!
//! Every jaga manifest in the music archive lists the ogg chunks of one
//! track. The exporter writes the embedded first chunk and the referenced
//! chunk files to uniquely named temporary files, hands them to an external
//! concatenation tool, and moves the result to
//! `<output>/soundtrack/[incomplete/]<manifest>.<ogg|flac>`.
//!
//! Manifests are processed on a rayon pool; every worker thread decodes
//! through its own [`CacheReader`].

use crate::cache::CacheReader;
use crate::config::{CacheConfig, CombinerTool};
use crate::error::{CacheError, Result};
use crate::jaga::JagaManifest;
use crate::payload::PayloadKind;
use rand::Rng;
use rayon::prelude::*;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Concatenates audio files in order into one output file
pub trait AudioCombiner: Sync {
    fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;

    /// Whether the combiner can write the given output extension
    fn supports(&self, extension: &str) -> bool {
        extension == "ogg"
    }
}

/// Runs oggCat or SoX as a child process
#[derive(Debug, Clone)]
pub struct ExternalCombiner {
    tool: CombinerTool,
    program: OsString,
}

impl ExternalCombiner {
    pub fn new(tool: CombinerTool) -> Self {
        let program = match tool {
            CombinerTool::OggCat => "oggCat",
            CombinerTool::Sox => "sox",
        };
        Self {
            tool,
            program: program.into(),
        }
    }

    /// Use a different executable that takes the same arguments
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, inputs: &[PathBuf], output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.tool {
            CombinerTool::OggCat => {
                cmd.arg(output).args(inputs);
            }
            CombinerTool::Sox => {
                cmd.args(["--combine", "concatenate"])
                    .args(inputs)
                    .args(["-C", "6"])
                    .arg(output);
            }
        }
        cmd
    }
}

impl AudioCombiner for ExternalCombiner {
    fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut cmd = self.command(inputs, output);
        debug!(command = ?cmd, "Running audio combiner");

        let status = cmd.stdin(Stdio::null()).stdout(Stdio::null()).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(CacheError::ExternalToolFailure {
                tool: self.program.to_string_lossy().into_owned(),
                code: status.code(),
            })
        }
    }

    fn supports(&self, extension: &str) -> bool {
        match self.tool {
            CombinerTool::OggCat => extension == "ogg",
            CombinerTool::Sox => extension == "ogg" || extension == "flac",
        }
    }
}

const TEMP_NAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789-_";
const TEMP_NAME_LEN: usize = 16;

/// Hands out random temporary file names that collide neither with existing
/// files nor with names other workers currently hold.
pub struct TempNamer {
    dir: PathBuf,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl TempNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve `count` names with the given extension. The names are
    /// released, and any files written to them removed, when the returned
    /// guard is dropped.
    pub fn reserve(&self, count: usize, extension: &str) -> TempFiles<'_> {
        let mut rng = rand::thread_rng();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let mut paths = Vec::with_capacity(count);

        while paths.len() < count {
            let name: String = (0..TEMP_NAME_LEN)
                .map(|_| char::from(TEMP_NAME_CHARS[rng.gen_range(0..TEMP_NAME_CHARS.len())]))
                .collect();
            let path = self.dir.join(format!("{}.{}", name, extension));
            if path.exists() || !in_flight.insert(path.clone()) {
                continue;
            }
            paths.push(path);
        }

        TempFiles { namer: self, paths }
    }

    fn release(&self, paths: &[PathBuf]) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        for path in paths {
            in_flight.remove(path);
        }
    }

    #[cfg(test)]
    fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|set| set.len()).unwrap_or_default()
    }
}

/// Reserved temporary paths; removed from disk and released on drop
pub struct TempFiles<'a> {
    namer: &'a TempNamer,
    paths: Vec<PathBuf>,
}

impl TempFiles<'_> {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for TempFiles<'_> {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
                }
            }
        }
        self.namer.release(&self.paths);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundtrackOptions {
    pub overwrite: bool,
    /// Also combine manifests with missing chunk files, into `incomplete/`
    pub include_incomplete: bool,
    /// Write flac instead of ogg
    pub lossless: bool,
    /// Only process this manifest file id
    pub only: Option<u32>,
}

impl SoundtrackOptions {
    pub fn extension(&self) -> &'static str {
        if self.lossless {
            "flac"
        } else {
            "ogg"
        }
    }
}

/// Result of processing one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Written { path: PathBuf, complete: bool },
    /// Output exists and overwriting is off
    Exists(PathBuf),
    /// Chunk files are missing and incomplete tracks were not requested
    Incomplete { missing: Vec<u32> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundtrackReport {
    pub written: usize,
    pub written_incomplete: usize,
    pub existing: usize,
    pub skipped_incomplete: usize,
    pub failed: usize,
}

impl SoundtrackReport {
    fn record(&mut self, outcome: &TrackOutcome) {
        match outcome {
            TrackOutcome::Written { complete: true, .. } => self.written += 1,
            TrackOutcome::Written { complete: false, .. } => self.written_incomplete += 1,
            TrackOutcome::Exists(_) => self.existing += 1,
            TrackOutcome::Incomplete { .. } => self.skipped_incomplete += 1,
        }
    }

    fn merge(mut self, other: SoundtrackReport) -> Self {
        self.written += other.written;
        self.written_incomplete += other.written_incomplete;
        self.existing += other.existing;
        self.skipped_incomplete += other.skipped_incomplete;
        self.failed += other.failed;
        self
    }
}

pub struct SoundtrackExporter<'a, C> {
    config: &'a CacheConfig,
    combiner: C,
    options: SoundtrackOptions,
    namer: TempNamer,
}

impl<'a> SoundtrackExporter<'a, ExternalCombiner> {
    /// Exporter using the combiner tool named in the configuration
    pub fn from_config(config: &'a CacheConfig, options: SoundtrackOptions) -> Self {
        Self::new(config, ExternalCombiner::new(config.combiner), options)
    }
}

impl<'a, C: AudioCombiner> SoundtrackExporter<'a, C> {
    pub fn new(config: &'a CacheConfig, combiner: C, options: SoundtrackOptions) -> Self {
        Self {
            config,
            combiner,
            options,
            namer: TempNamer::new(&config.temp_dir),
        }
    }

    /// Combine every manifest of the music archive, or just the selected one
    pub fn export(&self, reader: &CacheReader) -> Result<SoundtrackReport> {
        let extension = self.options.extension();
        if !self.combiner.supports(extension) {
            return Err(CacheError::Config(format!(
                "combiner cannot write .{} output",
                extension
            )));
        }

        fs::create_dir_all(self.config.soundtrack_dir().join("incomplete"))?;
        fs::create_dir_all(&self.config.temp_dir)?;

        let archive = self.config.music_archive;
        let jobs: Vec<u32> = match self.options.only {
            Some(file) => vec![file],
            None => (0..reader.reopen()?.file_count(archive)?).collect(),
        };

        let workers = self.config.worker_count().min(jobs.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("rscache-soundtrack-{}", i))
            .build()
            .map_err(|e| CacheError::Config(format!("failed to start worker pool: {}", e)))?;

        info!(archive, manifests = jobs.len(), workers, "Combining soundtracks");

        let report = pool.install(|| {
            jobs.into_par_iter()
                .map_init(
                    || reader.reopen(),
                    |worker, file| {
                        let result = match worker {
                            Ok(worker) => self.export_track(worker, file),
                            Err(e) => Err(CacheError::Io(std::io::Error::new(
                                std::io::ErrorKind::Other,
                                e.to_string(),
                            ))),
                        };
                        (file, result)
                    },
                )
                .fold(SoundtrackReport::default, |mut totals, (file, result)| {
                    match result {
                        Ok(Some(outcome)) => {
                            if let TrackOutcome::Incomplete { missing } = &outcome {
                                info!(file, ?missing, "Skipping track because it's incomplete");
                            }
                            totals.record(&outcome);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(archive, file, error = %e, "Failed to combine track");
                            totals.failed += 1;
                        }
                    }
                    totals
                })
                .reduce(SoundtrackReport::default, SoundtrackReport::merge)
        });

        info!(?report, "Done combining soundtracks");
        Ok(report)
    }

    /// Process one file id of the music archive. `Ok(None)` when the file is
    /// not a jaga manifest or has no readable location.
    pub fn export_track(&self, reader: &mut CacheReader, file: u32) -> Result<Option<TrackOutcome>> {
        let archive = self.config.music_archive;
        let decoded = match reader.decode(archive, file) {
            Ok(decoded) => decoded,
            Err(CacheError::InvalidLocation { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if decoded.kind != PayloadKind::Jaga {
            return Ok(None);
        }

        let manifest = JagaManifest::parse(&decoded)?;

        let extension = self.options.extension();
        let soundtrack = self.config.soundtrack_dir();
        let complete_path = soundtrack.join(format!("{}.{}", file, extension));
        let incomplete_path = soundtrack
            .join("incomplete")
            .join(format!("{}.{}", file, extension));

        // Checked before any chunk is decoded
        if !self.options.overwrite {
            if complete_path.exists() {
                return Ok(Some(TrackOutcome::Exists(complete_path)));
            }
            if self.options.include_incomplete && incomplete_path.exists() {
                return Ok(Some(TrackOutcome::Exists(incomplete_path)));
            }
        }

        let mut chunks = Vec::with_capacity(manifest.chunk_count());
        let mut missing = Vec::new();
        for id in manifest.referenced_file_ids() {
            match reader.decode(archive, id) {
                Ok(chunk) => chunks.push(chunk.data),
                Err(e) if e.is_file_local() => {
                    debug!(archive, file, chunk = id, error = %e, "Chunk file unavailable");
                    missing.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        let complete = missing.is_empty();
        if !complete && !self.options.include_incomplete {
            return Ok(Some(TrackOutcome::Incomplete { missing }));
        }

        let output = if complete { complete_path } else { incomplete_path };

        self.combine(&manifest.embedded, &chunks, &output)?;
        info!(path = %output.display(), complete, "Combined track");
        Ok(Some(TrackOutcome::Written { path: output, complete }))
    }

    /// Write the chunks to temporary files and combine them into `output`.
    /// The tool writes next to the destination; only a successful result is
    /// moved into place.
    fn combine(&self, embedded: &[u8], chunks: &[Vec<u8>], output: &Path) -> Result<()> {
        let temp = self.namer.reserve(chunks.len() + 1, "ogg");
        let paths = temp.paths();
        fs::write(&paths[0], embedded)?;
        for (path, data) in paths[1..].iter().zip(chunks) {
            fs::write(path, data)?;
        }

        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(".rscache-")
            .suffix(&format!(".{}", self.options.extension()))
            .tempfile_in(dir)?
            .into_temp_path();
        // The tool creates the file itself
        fs::remove_file(&staged)?;

        self.combiner.combine(paths, &staged)?;
        staged.persist(output).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}
