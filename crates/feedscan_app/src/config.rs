//! RON settings file for the scanner.
//!
//! Every field is optional; a missing file yields the built-in defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use feedscan_engine::{CaptureSettings, FetchSettings, ScanSettings};
use scan_logging::scan_info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Consecutive recaptures before giving up; `None` retries forever.
    pub max_reauth_attempts: Option<u32>,
    pub fetch: FetchConfig,
    pub capture: CaptureConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_reauth_attempts: ScanSettings::default().max_reauth_attempts,
            fetch: FetchConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            max_reauth_attempts: self.max_reauth_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
        }
    }
}

impl FetchConfig {
    pub fn settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub seed_url: String,
    pub api_path_pattern: String,
    pub settle_delay_secs: u64,
    pub scroll_delay_secs: u64,
    pub timeout_secs: u64,
    pub chrome_executable: Option<PathBuf>,
    pub user_agents: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let settings = CaptureSettings::default();
        Self {
            seed_url: settings.seed_url,
            api_path_pattern: settings.api_path_pattern,
            settle_delay_secs: settings.settle_delay.as_secs(),
            scroll_delay_secs: settings.scroll_delay.as_secs(),
            timeout_secs: settings.timeout.as_secs(),
            chrome_executable: settings.chrome_executable,
            user_agents: settings.user_agents,
        }
    }
}

impl CaptureConfig {
    pub fn settings(&self) -> CaptureSettings {
        CaptureSettings {
            seed_url: self.seed_url.clone(),
            api_path_pattern: self.api_path_pattern.clone(),
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            scroll_delay: Duration::from_secs(self.scroll_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            chrome_executable: self.chrome_executable.clone(),
            user_agents: self.user_agents.clone(),
        }
    }
}

/// Loads the settings file. A missing file is not an error; a malformed one is.
pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            scan_info!("No settings file at {:?}; using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read settings file {path:?}"));
        }
    };

    let config: AppConfig =
        ron::from_str(&content).with_context(|| format!("failed to parse settings file {path:?}"))?;
    scan_info!("Loaded settings from {:?}", path);
    Ok(config)
}
