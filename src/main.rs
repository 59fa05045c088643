//! API tier binary.

use std::process::ExitCode;

use tracing::{error, info};

use codevault::config::config_path;
use codevault::web::ApiServer;
use codevault::{Config, Database};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let path = config_path();
    let (config, load_error) = Config::load_or_default(&path);
    if let Some(e) = load_error {
        eprintln!("Failed to load {}: {e}", path.display());
        eprintln!("Using default configuration.");
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = codevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        codevault::logging::init_console_only(&config.logging.level);
    }

    info!("codevault API tier");
    info!("Storage tier at {}", config.api.storage_url);

    let db = match Database::open(&config.database.url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match ApiServer::new(&config, db) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create API server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("API server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
