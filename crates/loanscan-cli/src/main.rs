//! loanscan - command-line front end for the Loanscan pipeline
//!
//! Usage:
//!   loanscan process <images...>   Full document analysis, printed as JSON
//!   loanscan text <image>          Recognized text of one page
//!   loanscan tables <image>        Tables of one page as Markdown
//!   loanscan structure <image>     Layout regions of one page as JSON
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `loanscan=info`).

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use loanscan::{DocumentPipeline, PageImage, PipelineConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "loanscan", version, about = "Extract text, tables and layout from scanned loan documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a multi-page document (one image per page) and print the result as JSON
    Process {
        /// Page images in document order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Only process pages START:END (1-based, inclusive)
        #[arg(long, value_parser = parse_range)]
        range: Option<(usize, usize)>,

        /// Process pages one after another instead of on a worker pool
        #[arg(long)]
        sequential: bool,

        /// Worker pool size (defaults to the number of logical CPUs)
        #[arg(long)]
        max_workers: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the recognized text of one page
    Text {
        image: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the tables of one page as Markdown
    Tables {
        image: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the layout regions of one page as JSON
    Structure {
        image: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Configuration file (TOML, YAML or JSON); defaults to a discovered loanscan.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the fingerprint caches
    #[arg(long)]
    no_cache: bool,
}

fn parse_range(value: &str) -> std::result::Result<(usize, usize), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{value}'"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid range start '{start}': {e}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid range end '{end}': {e}"))?;
    Ok((start, end))
}

fn load_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let mut config = match &common.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::discover()
            .context("Failed to discover configuration")?
            .unwrap_or_default(),
    };
    if common.no_cache {
        config.enable_cache = false;
    }
    Ok(config)
}

fn load_page(path: &Path) -> Result<PageImage> {
    PageImage::open(path).with_context(|| format!("Failed to load page image {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("loanscan=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            images,
            range,
            sequential,
            max_workers,
            common,
        } => {
            let mut config = load_config(&common)?;
            if sequential {
                config.enable_parallel = false;
            }
            if max_workers.is_some() {
                config.max_workers = max_workers;
            }
            let pipeline = DocumentPipeline::from_config(config)?;

            let pages = images.iter().map(|p| load_page(p)).collect::<Result<Vec<_>>>()?;
            let document = match range {
                Some((start, end)) => pipeline.extract_page_range(&pages, start, end)?,
                None => pipeline.process_document(&pages)?,
            };

            if document.is_degraded() {
                tracing::warn!(failed_pages = ?document.metadata.failed_pages, "Some pages could not be processed");
            }
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Text { image, common } => {
            let pipeline = DocumentPipeline::from_config(load_config(&common)?)?;
            let text = pipeline.extract_text_only(&load_page(&image)?)?;
            println!("{text}");
        }
        Commands::Tables { image, common } => {
            let pipeline = DocumentPipeline::from_config(load_config(&common)?)?;
            let tables = pipeline.extract_tables_only(&load_page(&image)?)?;
            if tables.is_empty() {
                bail!("No tables found in {}", image.display());
            }
            let rendered: Vec<String> = tables.iter().map(|t| t.to_markdown()).collect();
            println!("{}", rendered.join("\n\n"));
        }
        Commands::Structure { image, common } => {
            let pipeline = DocumentPipeline::from_config(load_config(&common)?)?;
            let layout = pipeline.get_structure_only(&load_page(&image)?);
            println!("{}", serde_json::to_string_pretty(&layout)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("2:5"), Ok((2, 5)));
        assert_eq!(parse_range(" 1 : 3 "), Ok((1, 3)));
        assert!(parse_range("5").is_err());
        assert!(parse_range("a:3").is_err());
    }

    #[test]
    fn test_no_cache_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loanscan.toml");
        std::fs::write(&path, "enable_cache = true\nmax_pages = 10\n").unwrap();

        let config = load_config(&CommonArgs {
            config: Some(path),
            no_cache: true,
        })
        .unwrap();
        assert!(!config.enable_cache);
        assert_eq!(config.max_pages, 10);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
