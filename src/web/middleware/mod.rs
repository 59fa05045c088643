//! Middleware for the HTTP tiers.

pub mod cors;

pub use cors::create_cors_layer;
