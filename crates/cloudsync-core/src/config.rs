//! Configuration module for CloudSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! The credentials record lives in a separate JSON file, see [`Credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::path_mapper::VirtualRootNames;
use crate::ports::remote_storage::CredentialToken;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for CloudSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub roots: VirtualRootNames,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
    /// Location of the credentials record. `None` means
    /// `<sync.root>/credentials.json`.
    pub credentials_file: Option<PathBuf>,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding the three virtual roots. A leading `~` is expanded.
    pub root: PathBuf,
    /// Seconds between the completion of one cycle and the start of the next.
    pub cycle_delay_secs: u64,
    /// Minimum age (seconds) a local-only file must reach before a deletion
    /// pass may remove it.
    pub grace_window_secs: u64,
    /// Files whose name starts with this marker are editor lock files and
    /// are never uploaded or deleted.
    pub lock_file_prefix: String,
    /// Milliseconds a watched path must stay quiet before it is acted upon.
    pub debounce_ms: u64,
    /// Milliseconds between the two size readings of a file stability check.
    pub stability_check_ms: u64,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the storage service, without the `/api` suffix.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudsync")
            .join("config.yaml")
    }

    /// The synchronized directory with `~` expanded.
    pub fn sync_root(&self) -> PathBuf {
        expand_home(&self.sync.root)
    }

    /// Where the credentials record is read from.
    pub fn credentials_path(&self) -> PathBuf {
        match &self.credentials_file {
            Some(path) => expand_home(path),
            None => self.sync_root().join("credentials.json"),
        }
    }
}

impl SyncConfig {
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stability_check(&self) -> Duration {
        Duration::from_millis(self.stability_check_ms)
    }
}

/// Replaces a leading `~` component with the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("CloudSync"),
            cycle_delay_secs: 3,
            grace_window_secs: 60,
            lock_file_prefix: "~$".to_string(),
            debounce_ms: 2000,
            stability_check_ms: 100,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cloud.example.com".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.cycle_delay_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.cycle_delay_secs == 0 {
            errors.push(ValidationError {
                field: "sync.cycle_delay_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.lock_file_prefix.is_empty() {
            errors.push(ValidationError {
                field: "sync.lock_file_prefix".into(),
                message: "must not be empty".into(),
            });
        }

        // --- roots ---
        let names = [
            ("roots.personal", &self.roots.personal),
            ("roots.projects", &self.roots.projects),
            ("roots.shared", &self.roots.shared),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            } else if name.contains('/') || name.contains('\\') {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("'{name}' must be a single path segment"),
                });
            }
        }
        if self.roots.personal == self.roots.projects
            || self.roots.personal == self.roots.shared
            || self.roots.projects == self.roots.shared
        {
            errors.push(ValidationError {
                field: "roots".into(),
                message: "virtual root names must be distinct".into(),
            });
        }

        // --- remote ---
        if let Err(e) = url::Url::parse(&self.remote.base_url) {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("invalid URL '{}': {e}", self.remote.base_url),
            });
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/CloudSync"))
///     .cycle_delay_secs(10)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn cycle_delay_secs(mut self, seconds: u64) -> Self {
        self.config.sync.cycle_delay_secs = seconds;
        self
    }

    pub fn grace_window_secs(mut self, seconds: u64) -> Self {
        self.config.sync.grace_window_secs = seconds;
        self
    }

    pub fn lock_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.sync.lock_file_prefix = prefix.into();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.sync.debounce_ms = ms;
        self
    }

    pub fn stability_check_ms(mut self, ms: u64) -> Self {
        self.config.sync.stability_check_ms = ms;
        self
    }

    // --- roots ---

    pub fn roots(mut self, roots: VirtualRootNames) -> Self {
        self.config.roots = roots;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- credentials ---

    pub fn credentials_file(mut self, path: PathBuf) -> Self {
        self.config.credentials_file = Some(path);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Credentials record
// ---------------------------------------------------------------------------

/// The signed-in account, as written by the login flow
///
/// Loaded once at startup. The engine only reads the token and never writes
/// this record back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Display name of the account holder
    pub name: Option<String>,
    pub token: Option<CredentialToken>,
}

impl Credentials {
    /// Load the credentials record from a JSON file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let credentials: Credentials = serde_json::from_str(&content)?;
        Ok(credentials)
    }

    /// The token, if the record holds a non-empty one
    pub fn token(&self) -> Option<&CredentialToken> {
        self.token.as_ref().filter(|t| !t.expose().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
