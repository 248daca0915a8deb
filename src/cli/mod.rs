//! CLI module for Tourbook
//!
//! Provides command-line interface for:
//! - serve: Start the HTTP server
//! - seed: Import tours, users and reviews from a JSON file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{
    clear, init_tracing, open_database, run, run_command, seed, seed_database, serve, SeedData,
    SeedReport,
};
pub use errors::{CliError, CliResult};
