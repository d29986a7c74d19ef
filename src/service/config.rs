//! Service configuration file support

use crate::logging::LogConfig;
use crate::service::{DEFAULT_IDENTITY, SERVICE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up next to the executable
pub const CONFIG_FILE_NAME: &str = "random-arts-bot.toml";

/// Service configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Account handle the bot runs as
    pub identity: String,

    /// Seconds between scheduled bot cycles
    pub cycle_interval_secs: u64,

    /// Seconds to wait for the bot to stop before giving up
    pub stop_timeout_secs: u64,

    /// Seconds the service manager should allow for startup
    pub start_wait_hint_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log file path (empty = console)
    pub log_file: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            cycle_interval_secs: 3600,
            stop_timeout_secs: 30,
            start_wait_hint_secs: 10,
            log_level: "info".to_string(),
            log_file: String::new(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load configuration from default locations
    ///
    /// Uses the first file found, or defaults when none exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_locations().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Candidate config file paths in search order
    ///
    /// 1. Same directory as executable: random-arts-bot.toml
    /// 2. %PROGRAMDATA%\RandomArtsBot\config.toml
    /// 3. User config dir: random-arts-bot/config.toml
    pub fn default_locations() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            paths.push(exe_dir.join(CONFIG_FILE_NAME));
        }

        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            paths.push(
                Path::new(&program_data)
                    .join(SERVICE_NAME)
                    .join("config.toml"),
            );
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("random-arts-bot").join("config.toml"));
        }

        paths
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Logger settings
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            file: if self.log_file.is_empty() {
                None
            } else {
                Some(PathBuf::from(&self.log_file))
            },
        }
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn start_wait_hint(&self) -> Duration {
        Duration::from_secs(self.start_wait_hint_secs)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Random Arts Bot Configuration

# Account handle the bot runs as (default: "@randomartsbot")
identity = "@randomartsbot"

# Seconds between scheduled bot cycles (default: 3600)
cycle_interval_secs = 3600

# Seconds to wait for the bot to stop on shutdown (default: 30)
stop_timeout_secs = 30

# Seconds the service manager should allow for startup (default: 10)
start_wait_hint_secs = 10

# Log level: trace, debug, info, warn, error (default: info)
log_level = "info"

# Log file path (empty = console)
# Example: log_file = "C:\\ProgramData\\RandomArtsBot\\bot.log"
log_file = ""
"#
        .to_string()
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading/writing config file
    #[error("Failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Error parsing TOML
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Error serializing config
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
}
