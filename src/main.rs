//! Tourbook entry point
//!
//! Parses arguments and dispatches through `cli::run`; any error is
//! printed to stderr and the process exits non-zero.

use tourbook::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}: {}", e.code(), e);
        std::process::exit(1);
    }
}
