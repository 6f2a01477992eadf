//! Configuration module for the Chef connection.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `chef-resources.yaml` and `CHEF_*` environment overrides
//! - Validation of connection settings
//! - Resolving defaults for the client name and key location

mod spec;
mod parser;
mod validator;

pub use spec::{ConnectionSettings, KeySource, ProviderConfig, ServerConfig};
pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_ALLOW_UNVERIFIED_SSL, ENV_CLIENT_NAME,
    ENV_KEY_FILE, ENV_KEY_MATERIAL, ENV_SERVER_URL, ENV_TIMEOUT_SECS, find_config_file,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
