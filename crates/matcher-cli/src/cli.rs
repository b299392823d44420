//! CLI argument parsing for the image matcher.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Image Matcher
///
/// Matches customer photos to the most likely product in a merchant catalog.
#[derive(Parser, Debug)]
#[command(name = "image-matcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/image-matcher/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Matcher commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index the catalog and match query images against it
    Match {
        /// Query image files or directories of images
        #[arg(required = true)]
        paths: Vec<String>,

        /// Override catalog file path
        #[arg(long)]
        catalog: Option<String>,

        /// Number of products per query
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Feature strategy (embedding or hash)
        #[arg(short, long)]
        backend: Option<String>,
    },

    /// Build the catalog index and print its statistics
    Index {
        /// Override catalog file path
        #[arg(long)]
        catalog: Option<String>,

        /// Feature strategy (embedding or hash)
        #[arg(short, long)]
        backend: Option<String>,
    },

    /// Download and cache the image encoder weights
    WarmModel,
}
