//! Provider API boundary: wire types and the HTTP client.

pub mod client;
pub mod models;

pub use client::{ApiClient, DEFAULT_BASE_URL};
