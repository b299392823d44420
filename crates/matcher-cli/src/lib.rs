//! Image matcher CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (match, index, warm-model)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    apply_overrides, build_index, expand_inputs, match_images, warm_model, Overrides,
};
