//! CLI argument definitions using clap
//!
//! Commands:
//! - tourbook serve [--host <h>] [--port <p>] [--mode <m>] [--db <dir>]
//! - tourbook seed --file <path> [--reset] [--db <dir>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Mode;

/// Tourbook - tour booking API server
#[derive(Parser, Debug)]
#[command(name = "tourbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// sled data directory; overrides DATABASE_PATH
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Host to bind to; overrides HOST
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to; overrides PORT
        #[arg(long)]
        port: Option<u16>,

        /// development or production; overrides APP_MODE
        #[arg(long, value_parser = parse_mode)]
        mode: Option<Mode>,
    },

    /// Import tours, users and reviews from a JSON file
    Seed {
        /// File holding `{tours, users, reviews}`
        #[arg(long)]
        file: PathBuf,

        /// Delete existing documents first
        #[arg(long)]
        reset: bool,
    },
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse()
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "tourbook", "serve", "--port", "8080", "--mode", "production",
        ])
        .unwrap();
        match cli.command {
            Command::Serve { port, mode, host } => {
                assert_eq!(port, Some(8080));
                assert_eq!(mode, Some(Mode::Production));
                assert!(host.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_seed_flags() {
        let cli = Cli::try_parse_from([
            "tourbook", "seed", "--file", "data.json", "--reset", "--db", "/tmp/tb",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/tb")));
        assert!(matches!(cli.command, Command::Seed { reset: true, .. }));
    }

    #[test]
    fn test_bad_mode_is_rejected() {
        assert!(Cli::try_parse_from(["tourbook", "serve", "--mode", "staging"]).is_err());
    }
}
