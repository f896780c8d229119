use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use inspection_features::cache::SledArtifactCache;
use inspection_features::config::AppConfig;
use inspection_features::file_writer::{write_feature_table, write_joined_table};
use inspection_features::logging::init_logging;
use inspection_features::models::{FeatureTable, OutputFormat, Role};
use inspection_features::pipeline::{FeaturePipeline, PipelineSettings};
use inspection_features::sources::load_datasets;
use inspection_features::ArtifactCache;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (overrides config/default, config/local and config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten prior review and tip text per inspection and cache it
    Flatten {
        /// Build documents on all cores
        #[arg(long)]
        parallel: bool,

        /// Also export the feature tables (csv or json)
        #[arg(short, long)]
        format: Option<String>,

        /// Output directory for exports
        #[arg(short, long)]
        output_dir: Option<String>,
    },
    /// Build the joined table of events preceding each training inspection
    Features {
        /// Output format (csv or json)
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (defaults to full_features.<ext> in the export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export cached documents for a role
    Show {
        /// Role to load (train or test)
        #[arg(short, long, default_value = "train")]
        role: String,

        /// Output format (csv or json)
        #[arg(short, long)]
        format: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<String>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging
    let log_file = config.logging.file_path.as_ref().map(PathBuf::from);
    let _guard = init_logging(
        Some(&config.get_log_level()),
        config.logging.format == "json",
        log_file.as_deref(),
    )?;

    info!("Starting inspection-features");
    let started = std::time::Instant::now();

    match &cli.command {
        Commands::Flatten {
            parallel,
            format,
            output_dir,
        } => flatten(&config, *parallel, format.as_deref(), output_dir.as_deref())?,
        Commands::Features { format, output } => {
            full_features(&config, format.as_deref(), output.as_deref())?;
        }
        Commands::Show {
            role,
            format,
            output_dir,
        } => show(&config, role, format.as_deref(), output_dir.as_deref())?,
    }

    info!("{:.2} seconds elapsed.", started.elapsed().as_secs_f64());
    Ok(())
}

fn parse_format(config: &AppConfig, format: Option<&str>) -> OutputFormat {
    let name = format.unwrap_or(&config.export.default_format);
    OutputFormat::parse(name).unwrap_or_else(|| {
        warn!("Invalid format: {}. Using csv as default.", name);
        OutputFormat::Csv
    })
}

fn open_cache(config: &AppConfig) -> Result<SledArtifactCache> {
    SledArtifactCache::open(Path::new(&config.cache.directory))
        .with_context(|| format!("Failed to open artifact cache at {}", config.cache.directory))
}

/// Build and cache documents for both roles
fn flatten(config: &AppConfig, parallel: bool, format: Option<&str>, output_dir: Option<&str>) -> Result<()> {
    let mut settings = PipelineSettings::try_from(&config.pipeline)?;
    settings.flatten.parallel |= parallel;
    let pipeline = FeaturePipeline::new(settings);

    let raw = load_datasets(&config.data).context("Failed to load input data")?;
    let prepared = pipeline.prepare(&raw)?;
    let cache = open_cache(config)?;
    let output = pipeline.run(&prepared, &cache)?;

    info!(
        train = output.train.documents.len(),
        train_empty = output.train.documents.empty_count(),
        test = output.test.documents.len(),
        test_empty = output.test.documents.empty_count(),
        "Cached flattened documents"
    );

    if format.is_some() || output_dir.is_some() {
        let format = parse_format(config, format);
        let dir = Path::new(output_dir.unwrap_or(&config.export.output_directory));
        for table in [&output.train, &output.test] {
            let path = write_feature_table(table, format, dir)?;
            info!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// Where `features` writes when no output file is given
fn default_features_path(config: &AppConfig, format: OutputFormat) -> PathBuf {
    Path::new(&config.export.output_directory).join(format!("full_features.{}", format.extension()))
}

/// Build the leakage-free joined table and export it
fn full_features(config: &AppConfig, format: Option<&str>, output: Option<&Path>) -> Result<()> {
    let pipeline = FeaturePipeline::new(PipelineSettings::try_from(&config.pipeline)?);

    let raw = load_datasets(&config.data).context("Failed to load input data")?;
    let prepared = pipeline.prepare(&raw)?;
    let table = pipeline.full_features(&prepared)?;
    info!(rows = table.len(), "Built joined feature table");

    let (format, output) = match (format, output) {
        (Some(name), Some(path)) => (parse_format(config, Some(name)), path.to_path_buf()),
        (None, Some(path)) => {
            let format = path
                .extension()
                .and_then(|e| OutputFormat::parse(&e.to_string_lossy()))
                .unwrap_or_else(|| parse_format(config, None));
            (format, path.to_path_buf())
        }
        (name, None) => {
            let format = parse_format(config, name);
            (format, default_features_path(config, format))
        }
    };
    write_joined_table(&table, format, &output)?;
    info!("Wrote {}", output.display());
    Ok(())
}

/// Export cached documents for one role
fn show(config: &AppConfig, role: &str, format: Option<&str>, output_dir: Option<&str>) -> Result<()> {
    let role = match role.to_lowercase().as_str() {
        "train" => Role::Train,
        "test" => Role::Test,
        other => anyhow::bail!("Unknown role: {other}. Must be train or test"),
    };

    let cache = open_cache(config)?;
    let documents = cache
        .load(role)
        .with_context(|| format!("No flattened documents cached for {role}; run flatten first"))?;

    let table = FeatureTable {
        role,
        documents,
        targets: None,
    };
    let dir = Path::new(output_dir.unwrap_or(&config.export.output_directory));
    let path = write_feature_table(&table, parse_format(config, format), dir)?;
    info!(documents = table.documents.len(), "Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_path_follows_export_config() {
        let mut config = AppConfig::default();
        config.export.output_directory = "/tmp/exports".to_string();

        assert_eq!(
            default_features_path(&config, OutputFormat::Json),
            PathBuf::from("/tmp/exports/full_features.json")
        );
        assert_eq!(
            default_features_path(&config, OutputFormat::Csv),
            PathBuf::from("/tmp/exports/full_features.csv")
        );
    }

    #[test]
    fn test_features_command_has_no_fixed_output() {
        let cli = Cli::parse_from(["inspection-features", "features", "--format", "json"]);
        match cli.command {
            Commands::Features { output, format } => {
                assert!(output.is_none());
                assert_eq!(format.as_deref(), Some("json"));
            }
            _ => panic!("expected features command"),
        }
    }
}
