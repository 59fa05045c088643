//! Storage tier binary.

use std::process::ExitCode;

use tracing::{error, info};

use codevault::config::config_path;
use codevault::web::StorageServer;
use codevault::Config;

#[tokio::main]
async fn main() -> ExitCode {
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

    if let Err(e) = codevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        codevault::logging::init_console_only(&config.logging.level);
    }

    info!("codevault storage tier");

    let server = match StorageServer::new(&config.storage, config.upload.max_upload_bytes()) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to create storage server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Storage server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
