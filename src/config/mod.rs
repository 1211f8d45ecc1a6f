use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::metering_p1::connection::ConnectionSettings;
use crate::metering_p1::telegrams;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "P1_CONFIG";

const CONFIG_PATHS: [&str; 2] = ["config/p1.yaml", "p1.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config found on {0}")]
    NotFound(String),
    #[error("Unable to read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("Unable to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("Both serial_port and host are set, only one transport can be used")]
    AmbiguousTransport,
}

fn dsmr22_default() -> bool { return false }
fn timeout_default() -> u64 { return 5 }
fn reconnect_interval_default() -> u64 { return 10 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct P1Config {
    /// Local device, discovered when neither this nor `host` is set
    #[serde(default)]
    pub serial_port: Option<String>,
    /// `hostname:port` of a raw serial relay
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default="dsmr22_default")]
    pub dsmr22: bool,
    #[serde(default="timeout_default")]
    pub timeout: u64,
    #[serde(default="reconnect_interval_default")]
    pub reconnect_interval: u64,
    /// Built-in sample telegram decoded once at start-up
    #[serde(default)]
    pub telegram: Option<String>,
}

impl Default for P1Config {
    fn default() -> Self {
        P1Config {
            serial_port: None,
            host: None,
            dsmr22: dsmr22_default(),
            timeout: timeout_default(),
            reconnect_interval: reconnect_interval_default(),
            telegram: None,
        }
    }
}

impl P1Config {
    pub fn from_yaml(path: &str, contents: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid config with all defaults
        if contents.trim().is_empty() {
            return Ok(P1Config::default());
        }

        let config: P1Config = serde_yml::from_str(contents)
            .map_err(|e| ConfigError::Parse { path: path.to_string(), reason: e.to_string() })?;

        if config.serial_port.is_some() && config.host.is_some() {
            return Err(ConfigError::AmbiguousTransport);
        }
        Ok(config)
    }

    pub fn to_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            address: self.host.clone().or_else(|| self.serial_port.clone()),
            legacy: self.dsmr22,
            timeout_secs: self.timeout,
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval.max(1))
    }

    /// The configured sample telegram, `None` with a warning when the name is unknown
    pub fn sample_telegram(&self) -> Option<&'static str> {
        let name = self.telegram.as_deref()?;
        let telegram = telegrams::by_name(name);
        if telegram.is_none() {
            let known: Vec<&str> = telegrams::all().iter().map(|(n, _)| *n).collect();
            warn!("Unknown sample telegram {}, known are {}", name, known.join(", "));
        }
        telegram
    }
}

pub struct ConfigHolder {
    pub config: P1Config,
    pub path: Option<PathBuf>,
}

impl ConfigHolder {
    /// Loads `$P1_CONFIG`, or the first of `config/p1.yaml` and `p1.yaml`.
    /// Without any of them the defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        for path in CONFIG_PATHS {
            let path = Path::new(path);
            if path.exists() {
                return Self::load_from(path);
            }
        }

        info!("No config on {}, using defaults", CONFIG_PATHS.join(" or "));
        Ok(ConfigHolder { config: P1Config::default(), path: None })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();

        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(display.clone()),
            _ => ConfigError::Read { path: display.clone(), source: e },
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ConfigError::Read { path: display.clone(), source: e })?;

        let config = P1Config::from_yaml(&display, &contents)?;
        info!("Loaded config from {}", display);
        Ok(ConfigHolder { config, path: Some(path.to_path_buf()) })
    }
}
