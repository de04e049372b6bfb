use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rscache::extract::Extractor;
use rscache::naming::{load_name_table, NamingOptions, TrackNamer};
use rscache::{CacheConfig, CacheReader, CombinerTool, SoundtrackExporter, SoundtrackOptions};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Decode and extract files from a sector-chained game cache
#[derive(Parser, Debug)]
#[command(name = "rscache", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "RSCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding main_file_cache.dat2 and the index files
    #[arg(long, global = true, env = "RSCACHE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Output root directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long, global = true)]
    overwrite: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract every file of one archive, or of all archives
    Extract { archive: Option<u8> },

    /// Combine jaga manifests and their chunks into soundtracks
    Combine {
        /// Archive holding the manifests
        #[arg(long)]
        archive: Option<u8>,

        /// Only combine this manifest
        #[arg(long)]
        file: Option<u32>,

        /// Also combine tracks with missing chunks
        #[arg(long)]
        incomplete: bool,

        /// Write flac instead of ogg (requires sox)
        #[arg(long)]
        lossless: bool,
    },

    /// Copy combined soundtracks to files named after their tracks
    Name {
        #[arg(long)]
        file: Option<u32>,

        #[arg(long)]
        incomplete: bool,
    },

    /// Print the file id to track name table as JSON
    Names,

    /// Print where a file lives and what it decodes to
    Info { archive: u8, file: u32 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "rscache=debug" } else { "rscache=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Extract { archive } => {
            let mut reader = open(config)?;
            let mut extractor = Extractor::new(&mut reader).overwrite(cli.overwrite);
            let report = match archive {
                Some(archive) => extractor
                    .extract_archive(archive)
                    .with_context(|| format!("Failed to extract archive {}", archive))?,
                None => extractor.extract_all().context("Failed to extract archives")?,
            };
            println!(
                "written: {}, skipped: {}, invalid: {}, failed: {}",
                report.written, report.skipped, report.invalid, report.failed
            );
        }

        Command::Combine {
            archive,
            file,
            incomplete,
            lossless,
        } => {
            let config = combine_config(config, archive, lossless);
            let reader = open(config.clone())?;
            let options = SoundtrackOptions {
                overwrite: cli.overwrite,
                include_incomplete: incomplete,
                lossless,
                only: file,
            };
            let report = SoundtrackExporter::from_config(&config, options)
                .export(&reader)
                .context("Failed to combine soundtracks")?;
            println!(
                "written: {}, incomplete written: {}, existing: {}, incomplete skipped: {}, failed: {}",
                report.written,
                report.written_incomplete,
                report.existing,
                report.skipped_incomplete,
                report.failed
            );
        }

        Command::Name { file, incomplete } => {
            let mut reader = open(config.clone())?;
            let table = load_name_table(&mut reader).context("Failed to read track names")?;
            let options = NamingOptions {
                overwrite: cli.overwrite,
                include_incomplete: incomplete,
                only: file,
            };
            let report = TrackNamer::new(&config, &table, options)
                .run()
                .context("Failed to name tracks")?;
            println!(
                "copied: {}, existing: {}, unnamed: {}",
                report.copied, report.existing, report.unnamed
            );
        }

        Command::Names => {
            let mut reader = open(config)?;
            let table = load_name_table(&mut reader).context("Failed to read track names")?;
            println!("{}", serde_json::to_string_pretty(&table.file_names())?);
        }

        Command::Info { archive, file } => {
            let mut reader = open(config)?;
            let location = reader
                .locate(archive, file)
                .with_context(|| format!("Failed to locate {}/{}", archive, file))?;
            println!("archive: {}", location.archive);
            println!("file:    {}", location.file);
            println!("size:    {}", location.size);
            println!("offset:  {}", location.offset);

            let decoded = reader
                .decode(archive, file)
                .with_context(|| format!("Failed to decode {}/{}", archive, file))?;
            println!("layer:   {:?}", decoded.layer);
            println!("kind:    {:?}", decoded.kind);
            println!("decoded: {} bytes", decoded.data.len());
        }
    }

    Ok(())
}

/// The configuration file, or defaults, with command line flags applied on top
fn load_config(cli: &Cli) -> Result<CacheConfig> {
    let mut config = match &cli.config {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CacheConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn combine_config(mut config: CacheConfig, archive: Option<u8>, lossless: bool) -> CacheConfig {
    if let Some(archive) = archive {
        config.music_archive = archive;
    }
    if lossless && config.combiner != CombinerTool::Sox {
        info!("Lossless output needs sox, switching combiner");
        config.combiner = CombinerTool::Sox;
    }
    config
}

fn open(config: CacheConfig) -> Result<CacheReader> {
    let dir = config.cache_dir.clone();
    CacheReader::open(config).with_context(|| format!("Failed to open cache in {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("rscache.toml");
        fs::write(
            &path,
            "cache_dir = \"/from/file\"\noutput_dir = \"file-out\"\nmusic_archive = 41\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = config_file(&dir);

        let cli = Cli::try_parse_from([
            "rscache",
            "--config",
            path.to_str().unwrap(),
            "--cache-dir",
            "/from/flag",
            "names",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.output_dir, PathBuf::from("file-out"));
        assert_eq!(config.music_archive, 41);

        // Global flags are accepted after the subcommand too
        let cli = Cli::try_parse_from([
            "rscache",
            "extract",
            "3",
            "--output-dir",
            "flag-out",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/from/file"));
        assert_eq!(config.output_dir, PathBuf::from("flag-out"));
        assert!(matches!(cli.command, Command::Extract { archive: Some(3) }));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let cli = Cli::try_parse_from(["rscache", "--config", missing.to_str().unwrap(), "names"])
            .unwrap();
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_combine_overrides() {
        let cli = Cli::try_parse_from([
            "rscache",
            "combine",
            "--archive",
            "12",
            "--lossless",
            "--file",
            "7",
        ])
        .unwrap();
        let Command::Combine {
            archive,
            file,
            incomplete,
            lossless,
        } = cli.command
        else {
            panic!("Expected the combine command");
        };
        assert_eq!(file, Some(7));
        assert!(!incomplete);

        let config = combine_config(CacheConfig::default(), archive, lossless);
        assert_eq!(config.music_archive, 12);
        assert_eq!(config.combiner, CombinerTool::Sox);

        let config = combine_config(CacheConfig::default(), None, false);
        assert_eq!(config.music_archive, 40);
        assert_eq!(config.combiner, CombinerTool::OggCat);
    }
}
