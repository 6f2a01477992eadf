//! Chef server integration module.
//!
//! This module provides the signed HTTP client for the Chef server REST API
//! and the typed request/response bodies it exchanges.

mod auth;
mod client;
mod types;

pub use auth::{RequestSigner, canonical_path, canonical_request, content_hash};
pub use client::{ChefApi, ChefClient, DEFAULT_TIMEOUT_SECS};
#[cfg(test)]
pub use client::MockChefApi;
pub use types::{DataBagCreated, Environment, SearchQuery, SearchResult, DEFAULT_SEARCH_SORT};
