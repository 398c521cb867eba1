//! Configuration management for package check.
//!
//! Loads settings from /etc/pkgcheck/config.toml or uses defaults.

use crate::error::Result;
use crate::report::ReportStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/pkgcheck/config.toml";

/// Report rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Width of the test name column
    #[serde(default = "default_name_width")]
    pub name_width: usize,

    /// Level descriptions are truncated to this width
    #[serde(default = "default_description_width")]
    pub description_width: usize,

    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_name_width() -> usize {
    30
}

fn default_description_width() -> usize {
    40
}

fn default_color() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name_width: default_name_width(),
            description_width: default_description_width(),
            color: default_color(),
        }
    }
}

/// HTTP probe settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Retries while the app answers 502/503/504
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Sleep before retry n is n * this many seconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Test containers use self-signed certificates
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff(),
            request_timeout_secs: default_request_timeout(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgcheckConfig {
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub probe: ProbeConfig,
}

impl PkgcheckConfig {
    /// Load from an explicit path, else the system path, else defaults.
    ///
    /// An explicit path must exist; a missing system file is fine.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let system = Path::new(CONFIG_PATH);
        if system.exists() {
            return Self::load_file(system);
        }

        debug!("No config at {}, using defaults", CONFIG_PATH);
        Ok(Self::default())
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PkgcheckConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Report style, with color forced off when `no_color` is set.
    pub fn report_style(&self, no_color: bool) -> ReportStyle {
        ReportStyle {
            colored: self.report.color && !no_color,
            name_width: self.report.name_width,
            description_width: self.report.description_width,
        }
    }
}
