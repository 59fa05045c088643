//! Data Transfer Objects for the HTTP tiers.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
