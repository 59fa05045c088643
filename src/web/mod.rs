//! HTTP surface of codevault.
//!
//! The API tier serves clients and keeps the metadata ledger; the storage
//! tier owns the files on disk. The API tier talks to the storage tier
//! through [`StorageClient`].

pub mod client;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use client::StorageClient;
pub use error::ApiError;
pub use router::{create_api_router, create_storage_router};
pub use server::{sweep_pending, ApiServer, StorageServer};
