//! mdindex CLI tool
//!
//! Downloads every `!(indexer)<url>` resource referenced from the markdown documents under a
//! root into `<root>/attachments/` and rewrites each reference to a local link.
//!
//! ## Modes
//!
//! - default: one pass over the tree, stopping at the first failing document
//! - `--watch`: one pass, then keep rewriting documents as they change until interrupted

use clap::Parser;
use mdindex::{config::IndexerConfig, run};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mdindex")]
#[command(author, version, about = "Capture remote resources referenced from markdown notes", long_about = None)]
struct Cli {
    /// Root directory of the document tree (overrides the config file)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Keep running and rewrite documents as they change
    #[arg(short = 'd', long)]
    watch: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match (cli.config, cli.root) {
        (Some(path), Some(root)) => IndexerConfig::load(path)?.with_root(root)?,
        (Some(path), None) => IndexerConfig::load(path)?,
        (None, Some(root)) => IndexerConfig::new(root)?,
        (None, None) => IndexerConfig::new(".")?,
    };
    let config = if cli.watch {
        config.with_watch(true)
    } else {
        config
    };

    if config.watch {
        ctrlc::set_handler(|| {
            tracing::info!("Interrupted, shutting down");
            std::process::exit(0);
        })?;
        tracing::info!(
            "Watching {} for changes. Press Ctrl-C to stop.",
            config.root.display()
        );
    }

    if let Err(e) = run(&config) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}
