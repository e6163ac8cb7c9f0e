//! covhub CLI library
//!
//! Command-line interface over the `covhub` coverage library: a development
//! server that instruments client scripts and mounts the live report, and an
//! offline report renderer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;

pub use commands::{Cli, Commands, ReportArgs, ServeArgs};
pub use config::{ServeConfig, Verbosity, DEFAULT_CONFIG_FILE};
pub use error::{CliError, CliResult};
