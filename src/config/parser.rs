//! Configuration parser for loading connection settings.
//!
//! Settings come from an optional YAML file, a `.env` file and `CHEF_*`
//! environment variables, in increasing order of precedence.

use crate::chef::{ChefClient, RequestSigner};
use crate::error::{ChefResourcesError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{ConnectionSettings, KeySource, ProviderConfig};

/// Environment variable for the server URL.
pub const ENV_SERVER_URL: &str = "CHEF_SERVER_URL";
/// Environment variable for the client name.
pub const ENV_CLIENT_NAME: &str = "CHEF_CLIENT_NAME";
/// Environment variable for inline key material.
pub const ENV_KEY_MATERIAL: &str = "CHEF_KEY_MATERIAL";
/// Environment variable for the key file path.
pub const ENV_KEY_FILE: &str = "CHEF_PRIVATE_KEY_FILE";
/// Environment variable for skipping TLS verification.
pub const ENV_ALLOW_UNVERIFIED_SSL: &str = "CHEF_ALLOW_UNVERIFIED_SSL";
/// Environment variable for the request timeout.
pub const ENV_TIMEOUT_SECS: &str = "CHEF_TIMEOUT_SECS";

/// Configuration parser for loading provider configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ChefResourcesError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ChefResourcesError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML configuration");

        let config: ProviderConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ChefResourcesError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        Ok(config)
    }

    /// Loads the file (if any) and applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<ProviderConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file, using environment only");
                ProviderConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `CHEF_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric override cannot be parsed.
    pub fn apply_env_overrides(
        config: &mut ProviderConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        let server = &mut config.server;

        if let Some(url) = lookup(ENV_SERVER_URL) {
            debug!("Overriding server.url from environment");
            server.url = Some(url);
        }

        if let Some(name) = lookup(ENV_CLIENT_NAME) {
            debug!("Overriding server.client_name from environment");
            server.client_name = Some(name);
        }

        if let Some(material) = lookup(ENV_KEY_MATERIAL) {
            debug!("Overriding server.key_material from environment");
            server.key_material = Some(material);
            server.key_file = None;
        }

        if let Some(file) = lookup(ENV_KEY_FILE) {
            debug!("Overriding server.key_file from environment");
            server.key_file = Some(PathBuf::from(file));
            server.key_material = None;
        }

        if let Some(flag) = lookup(ENV_ALLOW_UNVERIFIED_SSL) {
            server.allow_unverified_ssl = parse_bool(&flag).ok_or_else(|| {
                ConfigError::validation(
                    format!("{ENV_ALLOW_UNVERIFIED_SSL} must be true or false, got '{flag}'"),
                    "server.allow_unverified_ssl",
                )
            })?;
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            server.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::validation(
                    format!("{ENV_TIMEOUT_SECS} must be a number of seconds, got '{timeout}'"),
                    "server.timeout_secs",
                )
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ChefResourcesError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves defaults and produces connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is missing or no client name can be
    /// determined.
    pub fn resolve(config: &ProviderConfig) -> Result<ConnectionSettings> {
        let server = &config.server;

        let url = server
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting {
                name: String::from("server.url"),
                env_var: String::from(ENV_SERVER_URL),
            })?;

        let client_name = match &server.client_name {
            Some(name) => name.clone(),
            None => default_client_name().ok_or_else(|| ConfigError::MissingSetting {
                name: String::from("server.client_name"),
                env_var: String::from(ENV_CLIENT_NAME),
            })?,
        };

        let key = if let Some(material) = &server.key_material {
            KeySource::Material(material.clone())
        } else if let Some(file) = &server.key_file {
            KeySource::File(expand_home(file))
        } else {
            let home = dirs::home_dir().ok_or_else(|| ConfigError::MissingSetting {
                name: String::from("server.key_file"),
                env_var: String::from(ENV_KEY_FILE),
            })?;
            KeySource::File(home.join(".chef").join(format!("{client_name}.pem")))
        };

        Ok(ConnectionSettings {
            url,
            client_name,
            key,
            allow_unverified_ssl: server.allow_unverified_ssl,
            timeout_secs: server.timeout_secs,
        })
    }
}

impl ConnectionSettings {
    /// Reads the key and builds the request signer.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be read or the key is invalid.
    pub fn signer(&self) -> Result<RequestSigner> {
        let pem = match &self.key {
            KeySource::Material(material) => material.clone(),
            KeySource::File(path) => {
                debug!("Reading client key from: {}", path.display());
                std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::invalid_key(format!("cannot read {}: {e}", path.display()))
                })?
            }
        };

        Ok(RequestSigner::from_pem(&self.client_name, &pem)?)
    }

    /// Builds a Chef API client from these settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or URL is invalid.
    pub fn connect(&self) -> Result<ChefClient> {
        ChefClient::new(
            &self.url,
            self.signer()?,
            self.timeout_secs,
            self.allow_unverified_ssl,
        )
    }
}

/// Uses the machine hostname as client name, like `knife` does.
fn default_client_name() -> Option<String> {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|h| !h.is_empty())
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["chef-resources.yaml", "chef-resources.yml"];

/// Finds the configuration file in the start directory or its parents.
///
/// Returns `None` when there is none; the environment alone may suffice.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
server:
  url: https://chef.example.com/organizations/acme
  client_name: admin
  key_file: /etc/chef/admin.pem
  allow_unverified_ssl: true
  timeout_secs: 10
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("valid yaml");
        assert_eq!(
            config.server.url.as_deref(),
            Some("https://chef.example.com/organizations/acme")
        );
        assert_eq!(config.server.client_name.as_deref(), Some("admin"));
        assert!(config.server.allow_unverified_ssl);
        assert_eq!(config.server.timeout_secs, 10);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = ConfigParser::new().parse_yaml("{}", None).expect("valid yaml");
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.server.timeout_secs, 30);
    }

    #[test]
    fn test_parse_rejects_bad_yaml() {
        let result = ConfigParser::new().parse_yaml("server: [", None);
        assert!(matches!(
            result,
            Err(ChefResourcesError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ProviderConfig::default();
        config.server.key_file = Some(PathBuf::from("/tmp/a.pem"));

        ConfigParser::apply_env_overrides(
            &mut config,
            lookup(&[
                (ENV_SERVER_URL, "https://chef/organizations/x"),
                (ENV_KEY_MATERIAL, "PEM"),
                (ENV_ALLOW_UNVERIFIED_SSL, "yes"),
                (ENV_TIMEOUT_SECS, "5"),
            ]),
        )
        .expect("overrides");

        assert_eq!(config.server.url.as_deref(), Some("https://chef/organizations/x"));
        assert_eq!(config.server.key_material.as_deref(), Some("PEM"));
        assert!(config.server.key_file.is_none());
        assert!(config.server.allow_unverified_ssl);
        assert_eq!(config.server.timeout_secs, 5);
    }

    #[test]
    fn test_env_override_rejects_bad_values() {
        let mut config = ProviderConfig::default();
        assert!(
            ConfigParser::apply_env_overrides(&mut config, lookup(&[(ENV_TIMEOUT_SECS, "soon")]))
                .is_err()
        );
        assert!(
            ConfigParser::apply_env_overrides(
                &mut config,
                lookup(&[(ENV_ALLOW_UNVERIFIED_SSL, "maybe")])
            )
            .is_err()
        );
    }

    #[test]
    fn test_resolve_requires_url() {
        let err = ConfigParser::resolve(&ProviderConfig::default()).expect_err("no url");
        assert!(err.to_string().contains(ENV_SERVER_URL));
    }

    #[test]
    fn test_resolve_default_key_path() {
        let mut config = ProviderConfig::default();
        config.server.url = Some(String::from("https://chef/organizations/acme"));
        config.server.client_name = Some(String::from("admin"));

        let settings = ConfigParser::resolve(&config).expect("resolves");
        match settings.key {
            KeySource::File(path) => assert!(path.ends_with(".chef/admin.pem")),
            KeySource::Material(_) => panic!("expected key file"),
        }
    }

    #[test]
    fn test_resolve_prefers_material() {
        let mut config = ProviderConfig::default();
        config.server.url = Some(String::from("https://chef/organizations/acme"));
        config.server.client_name = Some(String::from("admin"));
        config.server.key_material = Some(String::from("PEM"));

        let settings = ConfigParser::resolve(&config).expect("resolves");
        assert_eq!(settings.key, KeySource::Material(String::from("PEM")));
    }

    #[test]
    fn test_signer_reports_unreadable_key() {
        let settings = ConnectionSettings {
            url: String::from("https://chef/organizations/acme"),
            client_name: String::from("admin"),
            key: KeySource::File(PathBuf::from("/nonexistent/admin.pem")),
            allow_unverified_ssl: false,
            timeout_secs: 30,
        };
        assert!(matches!(
            settings.signer(),
            Err(ChefResourcesError::Config(ConfigError::InvalidKey { .. }))
        ));
    }

    #[test]
    fn test_load_file_and_find() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        let path = dir.path().join("chef-resources.yaml");
        std::fs::write(&path, "server:\n  url: https://chef/organizations/acme\n").expect("write");

        let found = find_config_file(&nested).expect("found in parent");
        assert_eq!(found, path);

        let config = ConfigParser::new().load_file(&found).expect("load");
        assert_eq!(config.server.url.as_deref(), Some("https://chef/organizations/acme"));

        assert!(matches!(
            ConfigParser::new().load_file(dir.path().join("missing.yaml")),
            Err(ChefResourcesError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
