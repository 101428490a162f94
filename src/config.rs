// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EncoderProgram;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub cancellation: CancellationConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// ffmpeg binary, looked up in PATH unless absolute
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Program and arguments prefixed to every encoder invocation,
    /// e.g. ["nice", "-n", "10"]
    #[serde(default)]
    pub launcher: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    /// Profile used when none is given on the command line
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub delete_audio: bool,

    #[serde(default)]
    pub delete_source: bool,

    /// Scan directories recursively
    #[serde(default)]
    pub recurse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    /// Minimum gap between progress events for one file
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Bound on undelivered events; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationConfig {
    #[serde(default = "default_terminate_timeout_secs")]
    pub terminate_timeout_secs: u64,

    #[serde(default = "default_kill_timeout_secs")]
    pub kill_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupConfig {
    /// Files removed before and after each encode
    #[serde(default = "default_scratch_files")]
    pub scratch_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file; defaults to videoslim.log next to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_profile() -> String {
    "default".to_string()
}

fn default_throttle_ms() -> u64 {
    1000
}

fn default_terminate_timeout_secs() -> u64 {
    5
}

fn default_kill_timeout_secs() -> u64 {
    2
}

fn default_scratch_files() -> Vec<PathBuf> {
    vec![PathBuf::from("pre_temp.mp4")]
}

fn default_log_level() -> String {
    "debug".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            launcher: Vec::new(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            delete_audio: false,
            delete_source: false,
            recurse: false,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            channel_capacity: None,
        }
    }
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            terminate_timeout_secs: default_terminate_timeout_secs(),
            kill_timeout_secs: default_kill_timeout_secs(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            scratch_files: default_scratch_files(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl EncoderConfig {
    pub fn program(&self) -> EncoderProgram {
        EncoderProgram::new(self.ffmpeg_path.clone()).with_launcher(self.launcher.clone())
    }
}

impl ProgressConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl CancellationConfig {
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout_secs)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_secs(self.kill_timeout_secs)
    }
}

impl Config {
    /// Directory holding the config file, profiles and the log
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("videoslim"))
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Resolved log file location
    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.logging.file {
            Some(file) => Ok(file.clone()),
            None => Ok(Self::config_dir()?.join("videoslim.log")),
        }
    }

    /// Parse config from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            let config = Config::default();

            // Not fatal: the directory may be read-only
            if let Err(e) = config.save() {
                tracing::warn!("could not create default config file: {:#}", e);
            }

            Ok(config)
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            let config = Config::default();
            config.save()?;
        }
        Ok(())
    }
}
