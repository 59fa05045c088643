//! HTTP servers for the API tier and the storage tier.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;

use crate::config::{ApiConfig, Config, LedgerConfig, StorageConfig};
use crate::db::CodebaseRepository;
use crate::vault::{BlobStore, CodebaseId};
use crate::{Database, Result, VaultError};

use super::client::StorageClient;
use super::handlers::{ApiState, StorageState};
use super::router::{create_api_router, create_storage_router, with_static_fallback};

/// Extra body allowance on the storage tier for the forwarded form's own fields.
const FORWARDED_FORM_OVERHEAD: usize = 1024 * 1024;

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| VaultError::Config(format!("invalid listen address {host}:{port}: {e}")))
}

/// Bind `addr` and serve `router` in a background task.
async fn spawn_server(
    name: &'static str,
    addr: SocketAddr,
    router: Router,
) -> std::result::Result<SocketAddr, std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("{} listening on http://{}", name, local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("{} error: {}", name, e);
        }
    });

    Ok(local_addr)
}

/// Public API tier.
pub struct ApiServer {
    addr: SocketAddr,
    state: Arc<ApiState>,
    api_config: ApiConfig,
    ledger_config: LedgerConfig,
    max_upload_bytes: usize,
}

impl ApiServer {
    /// Create the API server from configuration and an open ledger.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let addr = socket_addr(&config.api.host, config.api.port)?;
        let storage = StorageClient::new(&config.api.storage_url)?;

        Ok(Self {
            addr,
            state: Arc::new(ApiState::new(db, storage)),
            api_config: config.api.clone(),
            ledger_config: config.ledger.clone(),
            max_upload_bytes: config.upload.max_upload_bytes(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(&self) -> Router {
        let router = create_api_router(
            Arc::clone(&self.state),
            &self.api_config.cors_origins,
            self.max_upload_bytes,
        );

        if self.api_config.serve_static {
            with_static_fallback(router, &self.api_config.static_path)
        } else {
            router
        }
    }

    /// Start the background task that clears abandoned pending uploads.
    fn start_pending_sweep_task(db: Database, storage: StorageClient, config: LedgerConfig) {
        tokio::spawn(async move {
            let grace = Duration::from_secs(config.pending_grace_secs);
            let mut interval =
                tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match sweep_pending(&db, &storage, grace).await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::info!(deleted_count = count, "Swept abandoned pending uploads");
                        } else {
                            tracing::debug!("No abandoned pending uploads to sweep");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to sweep pending uploads");
                    }
                }
            }
        });
    }

    /// Run the API server until it fails.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_pending_sweep_task(
            self.state.db.clone(),
            self.state.storage.clone(),
            self.ledger_config,
        );
        tracing::info!("Pending upload sweep started");

        tracing::info!("API server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.router();
        let local_addr = spawn_server("API server", self.addr, router).await?;

        Self::start_pending_sweep_task(
            self.state.db.clone(),
            self.state.storage.clone(),
            self.ledger_config,
        );

        Ok(local_addr)
    }
}

/// Remove pending uploads older than `grace`, in the storage tier and the ledger.
///
/// A row whose blobs could not be removed is kept for the next sweep.
/// Returns the number of ledger rows deleted.
pub async fn sweep_pending(db: &Database, storage: &StorageClient, grace: Duration) -> Result<usize> {
    let grace = chrono::Duration::from_std(grace)
        .map_err(|e| VaultError::Config(format!("invalid pending grace period: {e}")))?;
    let cutoff = Utc::now()
        .checked_sub_signed(grace)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let repo = CodebaseRepository::new(db.pool());
    let stale = repo.list_stale_pending(cutoff).await?;

    let mut deleted = 0;
    for row in stale {
        let id = match CodebaseId::parse(&row.id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(codebase_id = %row.id, error = %e, "Skipping malformed ledger row");
                continue;
            }
        };

        if let Err(e) = storage.delete(&id).await {
            tracing::warn!(codebase_id = %id, error = %e, "Failed to remove abandoned blobs");
            continue;
        }
        if repo.delete(&id).await? {
            tracing::debug!(codebase_id = %id, "Removed abandoned pending upload");
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Internal storage tier.
pub struct StorageServer {
    addr: SocketAddr,
    state: Arc<StorageState>,
    max_upload_bytes: usize,
}

impl StorageServer {
    /// Create the storage server, creating the blob root if needed.
    pub fn new(config: &StorageConfig, max_upload_bytes: usize) -> Result<Self> {
        let addr = socket_addr(&config.host, config.port)?;
        let store = BlobStore::new(&config.root)?;
        tracing::info!("Blob store initialized at: {}", config.root);

        Ok(Self {
            addr,
            state: Arc::new(StorageState::new(store)),
            max_upload_bytes: max_upload_bytes.saturating_add(FORWARDED_FORM_OVERHEAD),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(&self) -> Router {
        create_storage_router(Arc::clone(&self.state), self.max_upload_bytes)
    }

    /// Run the storage server until it fails.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Storage server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the bound address.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.router();
        spawn_server("Storage server", self.addr, router).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_config(root: &std::path::Path) -> StorageConfig {
        StorageConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            root: root.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_invalid_listen_address() {
        let mut config = Config::default();
        config.api.host = "not an address".to_string();

        let result = socket_addr(&config.api.host, config.api.port);
        assert!(matches!(result, Err(VaultError::Config(_))));
    }

    #[tokio::test]
    async fn test_storage_server_run() {
        let temp = tempfile::TempDir::new().unwrap();
        let server = StorageServer::new(&storage_config(temp.path()), 1024 * 1024).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");

        let addr = server.run_with_addr().await.unwrap();
        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_api_server_run() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage_addr = StorageServer::new(&storage_config(temp.path()), 1024 * 1024)
            .unwrap()
            .run_with_addr()
            .await
            .unwrap();

        let mut config = Config::default();
        config.api.host = "127.0.0.1".to_string();
        config.api.port = 0;
        config.api.storage_url = format!("http://{storage_addr}");

        let db = Database::open_in_memory().await.unwrap();
        let addr = ApiServer::new(&config, db)
            .unwrap()
            .run_with_addr()
            .await
            .unwrap();

        let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert!(resp.status().is_success());
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sweep_keeps_fresh_pending_rows() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = CodebaseRepository::new(db.pool());
        let id = CodebaseId::new();
        repo.create_pending(&id).await.unwrap();

        // Nothing listens here; fresh rows must not reach the client at all.
        let storage = StorageClient::new("http://127.0.0.1:9").unwrap();
        let swept = sweep_pending(&db, &storage, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(swept, 0);
        assert!(repo.get(&id).await.unwrap().is_some());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sweep_removes_stale_pending_rows() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = BlobStore::new(temp.path()).unwrap();
        let storage_addr = StorageServer::new(&storage_config(temp.path()), 1024 * 1024)
            .unwrap()
            .run_with_addr()
            .await
            .unwrap();
        let storage = StorageClient::new(&format!("http://{storage_addr}")).unwrap();

        let db = Database::open_in_memory().await.unwrap();
        let repo = CodebaseRepository::new(db.pool());

        let orphan = CodebaseId::new();
        repo.create_pending(&orphan).await.unwrap();
        store.create_codebase(&orphan).await.unwrap();

        let committed = CodebaseId::new();
        repo.create_pending(&committed).await.unwrap();
        repo.commit(&committed, &[]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let swept = sweep_pending(&db, &storage, Duration::ZERO).await.unwrap();

        assert_eq!(swept, 1);
        assert!(repo.get(&orphan).await.unwrap().is_none());
        assert!(!store.exists(&orphan).await);
        assert!(repo.get(&committed).await.unwrap().is_some());
    }
}
