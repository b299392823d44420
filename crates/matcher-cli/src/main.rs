//! Image Matcher
//!
//! Matches customer-submitted photos to the most likely catalog product.
//!
//! # Usage
//!
//! ```bash
//! image-matcher match <PATHS>... [--catalog PATH] [--top-k K] [--backend embedding|hash]
//! image-matcher index [--catalog PATH] [--backend embedding|hash]
//! image-matcher warm-model
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/image-matcher/config.toml)
//! 3. Environment variables (MATCHER_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use matcher_cli::{build_index, match_images, warm_model, Cli, Commands, Overrides};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut overrides = Overrides {
        log_level: cli.log_level.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Match {
            paths,
            catalog,
            top_k,
            backend,
        } => {
            overrides.catalog = catalog;
            overrides.top_k = top_k;
            overrides.backend = backend;
            match_images(cli.config.as_deref(), overrides, &paths).await?;
        }
        Commands::Index { catalog, backend } => {
            overrides.catalog = catalog;
            overrides.backend = backend;
            build_index(cli.config.as_deref(), overrides).await?;
        }
        Commands::WarmModel => {
            warm_model(cli.config.as_deref(), overrides).await?;
        }
    }

    Ok(())
}
