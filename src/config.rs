//! Harness Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/harness.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `NVME_HARNESS_`, `__` separating
//!    nested keys
//! 4. Command-line flags, applied by the binary after loading
//!
//! # Example
//! ```no_run
//! use nvme_harness::config::HarnessConfig;
//!
//! let config = HarnessConfig::load()?;
//! config.validate()?;
//! println!("DUT: {:?}", config.pciaddr);
//! # Ok::<(), nvme_harness::error::HarnessError>(())
//! ```
//!
//! `NVME_HARNESS_LOG__LEVEL=debug` sets `log.level`;
//! `NVME_HARNESS_PCIADDR=02:00.0` sets the device address.

use crate::error::{HarnessError, HarnessResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_PATH: &str = "config/harness.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "NVME_HARNESS_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// PCI (BDF) address of the device under test. Never validated.
    #[serde(default)]
    pub pciaddr: String,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Parameters of the built-in fixtures
    #[serde(default)]
    pub fixtures: FixtureSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_format")]
    pub format: String,
}

/// Parameters of the built-in device fixtures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSettings {
    /// Namespace id opened by the namespace fixture
    #[serde(default = "default_namespace_id")]
    pub namespace_id: u32,
    /// Size in bytes of the session buffer
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Label of the session buffer
    #[serde(default = "default_buffer_label")]
    pub buffer_label: String,
}

// Default value functions
fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

fn default_namespace_id() -> u32 {
    1
}

fn default_buffer_size() -> usize {
    4096
}

fn default_buffer_label() -> String {
    "default buffer".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            namespace_id: default_namespace_id(),
            buffer_size: default_buffer_size(),
            buffer_label: default_buffer_label(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            pciaddr: String::new(),
            log: LogConfig::default(),
            fixtures: FixtureSettings::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from `config/harness.toml` and the environment.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> HarnessResult<Self> {
        Self::load_from(DEFAULT_PATH)
    }

    /// Load configuration from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> HarnessResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    /// The provider chain behind [`load_from`](Self::load_from).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(HarnessConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> HarnessResult<()> {
        let level = self.log.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(HarnessError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.log.format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(HarnessError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.log.format,
                VALID_FORMATS.join(", ")
            )));
        }

        if self.fixtures.namespace_id == 0 {
            return Err(HarnessError::Configuration(
                "fixtures.namespace_id must be non-zero".to_string(),
            ));
        }

        if self.fixtures.buffer_size == 0 {
            return Err(HarnessError::Configuration(
                "fixtures.buffer_size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Override the device address, keeping the loaded value when `None`.
    pub fn with_pciaddr(mut self, pciaddr: Option<String>) -> Self {
        if let Some(addr) = pciaddr {
            self.pciaddr = addr;
        }
        self
    }

    /// Override logging settings, keeping loaded values for `None`.
    pub fn with_log(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level {
            self.log.level = level;
        }
        if let Some(format) = format {
            self.log.format = format;
        }
        self
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> HarnessResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HarnessError::Configuration(format!("Cannot render config: {}", e)))
    }
}
