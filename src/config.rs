//! Configuration for the Courier relay.
//!
//! Settings are read from `.courier/courier.toml` and layered: file values
//! first, then environment variables, then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 3141
//! db_path = ".courier/jobs.db"
//! dev_mode = false
//!
//! [security]
//! require_signature = false
//!
//! [delivery]
//! max_attempts = 3
//! attempt_timeout_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::relay::delivery::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS};
use crate::relay::server::ServerConfig;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path to the job registry database (optional, defaults to
    /// `.courier/jobs.db`)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Bind on all interfaces and allow permissive CORS
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: None,
            dev_mode: false,
        }
    }
}

/// Inbound verification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Reject terminal events for jobs with no signing secret on file
    #[serde(default)]
    pub require_signature: bool,
}

/// Outbound delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySection {
    /// Total delivery attempts per webhook (initial + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-attempt HTTP timeout in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_attempt_timeout_secs() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT.as_secs()
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

/// The complete courier.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierToml {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,
    /// Inbound verification settings
    #[serde(default)]
    pub security: SecuritySection,
    /// Outbound delivery settings
    #[serde(default)]
    pub delivery: DeliverySection,
}

impl CourierToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse courier.toml")
    }

    /// Load configuration from the default location (.courier/courier.toml).
    /// Returns default configuration if file doesn't exist.
    pub fn load_or_default(courier_dir: &Path) -> Result<Self> {
        let config_path = courier_dir.join("courier.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize courier.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the listen port (env can override file).
    pub fn port(&self) -> u16 {
        if let Ok(env_val) = std::env::var("COURIER_PORT")
            && let Ok(port) = env_val.parse::<u16>()
        {
            return port;
        }
        self.server.port
    }

    /// Get the database path (file → env → default).
    pub fn db_path(&self) -> PathBuf {
        self.server
            .db_path
            .clone()
            .or_else(|| std::env::var("COURIER_DB_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(".courier/jobs.db"))
    }

    /// Get require_signature (env can override file).
    pub fn require_signature(&self) -> bool {
        if let Ok(env_val) = std::env::var("COURIER_REQUIRE_SIGNATURE") {
            return env_val != "false";
        }
        self.security.require_signature
    }

    /// Convert to a runtime [`ServerConfig`]. Zero attempt counts and
    /// timeouts are clamped up to 1.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port(),
            db_path: self.db_path(),
            dev_mode: self.server.dev_mode,
            require_signature: self.require_signature(),
            max_attempts: self.delivery.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(self.delivery.attempt_timeout_secs.max(1)),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.delivery.max_attempts == 0 {
            warnings.push(
                "delivery.max_attempts is 0: at least one attempt is always made".to_string(),
            );
        }
        if self.delivery.attempt_timeout_secs == 0 {
            warnings.push(
                "delivery.attempt_timeout_secs is 0: a 1 second minimum is applied".to_string(),
            );
        }

        warnings
    }
}
