//! Configuration specification types.
//!
//! This module defines the structs that map to `chef-resources.yaml`. Only
//! the connection to the Chef server is configured here; resources
//! themselves arrive through the provider protocol.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chef::DEFAULT_TIMEOUT_SECS;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Chef server connection.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Chef server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Organization URL, e.g. `https://chef.example.com/organizations/acme/`.
    #[serde(default)]
    pub url: Option<String>,
    /// API client (or user) name used to sign requests.
    #[serde(default)]
    pub client_name: Option<String>,
    /// PEM-encoded private key, inline.
    #[serde(default)]
    pub key_material: Option<String>,
    /// Path to the PEM-encoded private key.
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub allow_unverified_ssl: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            client_name: None,
            key_material: None,
            key_file: None,
            allow_unverified_ssl: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Where the signing key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Inline PEM.
    Material(String),
    /// PEM file on disk.
    File(PathBuf),
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Organization URL.
    pub url: String,
    /// Client name.
    pub client_name: String,
    /// Signing key source.
    pub key: KeySource,
    /// Skip TLS certificate verification.
    pub allow_unverified_ssl: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}
