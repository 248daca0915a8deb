//! CLI command implementations

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::crypto;
use crate::config::{AppConfig, Mode};
use crate::http_server::{AppState, HttpServer};
use crate::models::{decode, encode, register_indexes, Resource, Review, Tour, User};
use crate::ratings::calc_average_ratings;
use crate::rest_api::factory::create_document;
use crate::rest_api::ApiError;
use crate::store::{Database, Query};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Default log filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info,tourbook=debug,tower_http=info";

/// Contents of a seed file
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub tours: Vec<Value>,
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub reviews: Vec<Value>,
}

/// Documents written by a seed run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub tours: usize,
    pub users: usize,
    pub reviews: usize,
}

/// Parse arguments, load configuration and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let mut config = AppConfig::from_env();
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    run_command(cli.command, config)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command, mut config: AppConfig) -> CliResult<()> {
    match cmd {
        Command::Serve { host, port, mode } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }
            init_tracing(config.mode);
            serve(config)
        }
        Command::Seed { file, reset } => {
            init_tracing(config.mode);
            seed(&config, &file, reset)
        }
    }
}

/// Install the global subscriber: JSON lines in production, human
/// readable output otherwise. `RUST_LOG` overrides the filter.
pub fn init_tracing(mode: Mode) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = match mode {
        Mode::Production => fmt().with_env_filter(filter).json().try_init(),
        Mode::Development => fmt().with_env_filter(filter).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing init failed: {e}");
    }
}

/// Open the configured store and register its indexes
pub fn open_database(config: &AppConfig) -> CliResult<Database> {
    let db = match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "opening sled store");
            Database::open(path)?
        }
        None => {
            tracing::warn!("no DATABASE_PATH configured, data lives in memory only");
            Database::in_memory()
        }
    };
    register_indexes(&db)?;
    Ok(db)
}

/// Start the HTTP server and block until it stops
pub fn serve(config: AppConfig) -> CliResult<()> {
    let db = open_database(&config)?;
    let server = HttpServer::new(AppState::new(db, config));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::BootFailed(format!("Failed to create tokio runtime: {e}")))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::BootFailed(format!("HTTP server failed: {e}")))
    })
}

/// Import a seed file into the configured store
pub fn seed(config: &AppConfig, file: &Path, reset: bool) -> CliResult<()> {
    let content = fs::read_to_string(file).map_err(|e| {
        CliError::Config(format!("Failed to read seed file {}: {e}", file.display()))
    })?;
    let data: SeedData = serde_json::from_str(&content)?;

    let db = open_database(config)?;
    if reset {
        let removed = clear(&db)?;
        tracing::info!(removed, "existing documents deleted");
    }

    let report = seed_database(&db, data)?;
    tracing::info!(
        tours = report.tours,
        users = report.users,
        reviews = report.reviews,
        "seed data imported"
    );
    Ok(())
}

/// Remove every document of every collection
pub fn clear(db: &Database) -> CliResult<usize> {
    let mut removed = 0;
    for collection in [Review::COLLECTION, Tour::COLLECTION, User::COLLECTION] {
        for doc in db.find(&Query::new(collection))? {
            if let Some(id) = doc.get("_id").and_then(Value::as_str) {
                if db.find_by_id_and_delete(collection, id)?.is_some() {
                    removed += 1;
                }
            }
        }
    }
    Ok(removed)
}

/// Insert users, tours and reviews in dependency order, then recompute
/// every tour's rating statistics.
///
/// User passwords may be given in plain text; they are hashed on import.
pub fn seed_database(db: &Database, data: SeedData) -> CliResult<SeedReport> {
    let mut report = SeedReport::default();

    for doc in data.users {
        let mut user: User = decode(doc)?;
        if let Some(password) = user.password.take() {
            let hash = if password.starts_with("$argon2") {
                password
            } else {
                crypto::hash_password(&password).map_err(ApiError::from)?
            };
            user.password = Some(hash);
        }
        let (_, value) = encode(user)?;
        db.create(User::COLLECTION, value)?;
        report.users += 1;
    }

    let mut tour_ids = Vec::new();
    for doc in data.tours {
        let created = create_document::<Tour>(db, doc)?;
        if let Some(id) = created.get("_id").and_then(Value::as_str) {
            tour_ids.push(id.to_string());
        }
        report.tours += 1;
    }

    for doc in data.reviews {
        create_document::<Review>(db, doc)?;
        report.reviews += 1;
    }

    for id in &tour_ids {
        calc_average_ratings(db, id)?;
    }
    Ok(report)
}
