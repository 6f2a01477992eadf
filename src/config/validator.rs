//! Configuration validation for connection settings.
//!
//! Catches mistakes that would otherwise surface as an opaque network or
//! authentication failure on the first request.

use crate::error::{ChefResourcesError, ConfigError, Result};
use tracing::{debug, warn};
use url::Url;

use super::spec::ServerConfig;

/// Validator for provider configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the server connection settings.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, if any.
    pub fn validate(&self, server: &ServerConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_url(server, &mut result);
        Self::validate_credentials(server, &mut result);

        if server.timeout_secs == 0 {
            result.error("server.timeout_secs", "Timeout must be greater than zero");
        }

        if server.allow_unverified_ssl {
            result
                .warnings
                .push(String::from("TLS certificate verification is disabled"));
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if let Some(first_error) = result.errors.first() {
            return Err(ChefResourcesError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    fn validate_url(server: &ServerConfig, result: &mut ValidationResult) {
        // A missing URL is reported at resolve time with its env var.
        let Some(raw) = &server.url else {
            return;
        };

        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "https" => {}
                "http" => result
                    .warnings
                    .push(format!("Server URL {raw} is not using HTTPS")),
                scheme => result.error(
                    "server.url",
                    format!("Server URL must use http or https, got '{scheme}'"),
                ),
            },
            Err(e) => result.error("server.url", format!("Invalid server URL '{raw}': {e}")),
        }
    }

    fn validate_credentials(server: &ServerConfig, result: &mut ValidationResult) {
        if server
            .client_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            result.error("server.client_name", "Client name cannot be empty");
        }

        if server.key_material.is_some() && server.key_file.is_some() {
            result.error(
                "server.key_material",
                "Set either key_material or key_file, not both",
            );
        }

        if server
            .key_material
            .as_deref()
            .is_some_and(|pem| !pem.contains("PRIVATE KEY"))
        {
            result.error(
                "server.key_material",
                "Key material does not look like a PEM private key",
            );
        }
    }
}
