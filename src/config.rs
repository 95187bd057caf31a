use crate::shared::logging;
use crate::shared::security::{mask_secret, redact_url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_URL: &str = "MONGODB_URL";
pub const ENV_AUTH_DATABASE: &str = "MONGODB_AUTH_DATABASE";
pub const ENV_AUTH_USERNAME: &str = "MONGODB_AUTH_USERNAME";
pub const ENV_AUTH_PASSWORD: &str = "MONGODB_AUTH_PASSWORD";

/// Bound on connection establishment and server selection
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 240;

pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Connection settings of the provider block
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// The MongoDB url
    pub url: String,
    /// The MongoDB authentication database
    pub auth_database: String,
    /// The MongoDB login username
    pub auth_username: String,
    /// The MongoDB login password
    pub auth_password: String,
    /// Seconds allowed for connecting and selecting a server
    pub connect_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_database: String::new(),
            auth_username: String::new(),
            auth_password: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &redact_url(&self.url))
            .field("auth_database", &self.auth_database)
            .field("auth_username", &self.auth_username)
            .field("auth_password", &mask_secret(&self.auth_password))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Fill every unset field from its environment default
    pub fn apply_env_defaults(&mut self) {
        self.apply_defaults_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_defaults`](Self::apply_env_defaults) with an
    /// injectable lookup
    pub fn apply_defaults_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&mut String, &str); 4] = [
            (&mut self.url, ENV_URL),
            (&mut self.auth_database, ENV_AUTH_DATABASE),
            (&mut self.auth_username, ENV_AUTH_USERNAME),
            (&mut self.auth_password, ENV_AUTH_PASSWORD),
        ];
        for (field, key) in fields {
            if field.is_empty() {
                if let Some(value) = lookup(key) {
                    *field = value;
                }
            }
        }
    }

    /// Apply explicit overrides (command line flags)
    pub fn apply_overrides(&mut self, overrides: &ProviderOverrides) {
        if let Some(url) = &overrides.url {
            self.url = url.clone();
        }
        if let Some(database) = &overrides.auth_database {
            self.auth_database = database.clone();
        }
        if let Some(username) = &overrides.auth_username {
            self.auth_username = username.clone();
        }
    }
}

/// Values given on the command line; they beat the file and the environment
#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    pub url: Option<String>,
    pub auth_database: Option<String>,
    pub auth_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApplyConfig {
    /// How many resources are reconciled at once
    pub max_concurrent: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub apply: ApplyConfig,
}

/// `~/.tfmongo/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tfmongo").join("config.json"))
}

/// Load configuration from an explicit file
pub fn init_from_path(path: &str) -> anyhow::Result<Config> {
    let path = Path::new(path);
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
    })?;
    let config: Config = serde_json::from_str(&content).map_err(|e| {
        anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
    })?;
    logging::info(&format!("Loaded configuration from {}", path.display()));
    Ok(config)
}

/// Load `~/.tfmongo/config.json` when present, built-in defaults otherwise
pub fn init_default() -> anyhow::Result<Config> {
    match default_config_path() {
        Some(path) if path.exists() => init_from_path(&path.to_string_lossy()),
        _ => {
            logging::debug("No config file found, using default configuration");
            Ok(Config::default())
        }
    }
}
