//! planstream configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local config file name
const LOCAL_CONFIG: &str = ".planstream.yml";

/// Main planstream configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend endpoints and timeouts
    pub server: ServerConfig,

    /// Token lookup
    pub auth: AuthConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planstream.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planstream/planstream.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from config, read before logging is set up
    ///
    /// Errors are swallowed; `load` reports them once logging exists.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(LOCAL_CONFIG))
                .chain(Self::user_config_path())
                .collect(),
        };
        candidates
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(&p).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("planstream").join("planstream.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Token to authenticate with
    ///
    /// An explicit token wins; otherwise the `auth.token-env` variable is read.
    pub fn resolve_token(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(token) = explicit.filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        match std::env::var(&self.auth.token_env) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(eyre::eyre!(
                "Auth token not found. Pass --token or set the {} environment variable.",
                self.auth.token_env
            )),
        }
    }

    /// Token for REST calls, which may run unauthenticated
    pub fn optional_token(&self, explicit: Option<&str>) -> Option<String> {
        self.resolve_token(explicit).ok()
    }
}

/// Backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Streaming endpoint (ws:// or wss://)
    #[serde(rename = "ws-url")]
    pub ws_url: String,

    /// REST API base URL
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// WebSocket connect timeout in milliseconds (0 disables)
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// REST request timeout in milliseconds
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws/plan".to_string(),
            api_url: "http://localhost:8000/api".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Environment variable containing the auth token
    #[serde(rename = "token-env")]
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: "PLANSTREAM_TOKEN".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for per-session event logs
    #[serde(rename = "runs-dir")]
    pub runs_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/planstream/runs on Linux)
        let runs_dir = dirs::data_dir()
            .map(|d| d.join("planstream").join("runs"))
            .unwrap_or_else(|| PathBuf::from(".planstream/runs"))
            .to_string_lossy()
            .into_owned();

        Self { runs_dir }
    }
}

impl StorageConfig {
    /// Runs directory with `~/` expanded
    pub fn runs_path(&self) -> PathBuf {
        match self.runs_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.runs_dir)),
            None => PathBuf::from(&self.runs_dir),
        }
    }
}
