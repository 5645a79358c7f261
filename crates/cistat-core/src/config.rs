//! Configuration loading for cistat
//!
//! Settings are read once at startup from a flat YAML mapping:
//!
//! ```yaml
//! graphite: graphite.example.com
//! prefix: ci
//! teamcity: https://teamcity.example.com
//! username: stats
//! password: secret
//! pollsecs: 10
//! maxbuilds: 10
//! exclude:
//!   - Sandbox_.*
//!   - .*_Nightly
//! ```
//!
//! Unknown keys are ignored.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::filter::ExclusionFilter;
use crate::types::MetricNames;
use crate::{CistatError, Result};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";
/// Well-known Graphite plaintext port
pub const DEFAULT_GRAPHITE_PORT: u16 = 2003;
pub const DEFAULT_POLL_SECS: u64 = 10;
pub const DEFAULT_MAX_BUILDS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// On-disk shape of the config file
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    graphite: Option<String>,
    graphiteport: Option<u16>,
    prefix: Option<String>,
    teamcity: Option<String>,
    username: Option<String>,
    password: Option<String>,
    pollsecs: Option<u64>,
    maxbuilds: Option<usize>,
    timeoutsecs: Option<u64>,
    /// `exclude:` with no entries decodes as null
    exclude: Option<Vec<String>>,
}

/// Immutable settings, loaded once at startup
#[derive(Clone)]
pub struct Settings {
    /// Collector host
    pub graphite_server: String,
    pub graphite_port: u16,
    /// Metric path prefix; `None` emits unprefixed paths
    pub prefix: Option<String>,
    /// CI server base URL
    pub teamcity_server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub poll_interval: Duration,
    /// Upper bound on finished builds fetched per poll
    pub max_builds: usize,
    /// Applied to every CI request and collector connection
    pub timeout: Duration,
    pub exclude: ExclusionFilter,
}

impl Settings {
    /// Load settings from the file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let display_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        info!("Loading configuration from: {}", display_path.display());

        if !path.exists() {
            error!("Configuration file not found: {}", display_path.display());
            return Err(CistatError::ConfigNotFound(display_path));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse settings from YAML text, applying defaults
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Self::from_raw(RawConfig::default());
        }
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| CistatError::ConfigParse(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let graphite_server = required(raw.graphite, "graphite", "Graphite server must be specified")?;
        let teamcity_server = required(
            raw.teamcity,
            "teamcity",
            "Teamcity server URL must be specified",
        )?;

        let graphite_port = raw.graphiteport.unwrap_or(DEFAULT_GRAPHITE_PORT);
        if graphite_port == 0 {
            return Err(CistatError::InvalidSetting(
                "graphiteport must be a valid port".to_string(),
            ));
        }

        let poll_secs = match raw.pollsecs {
            Some(secs) => positive(secs, "pollsecs")?,
            None => {
                info!(
                    "Poll period not specified...defaulting to {}sec polling",
                    DEFAULT_POLL_SECS
                );
                DEFAULT_POLL_SECS
            }
        };

        let max_builds = match raw.maxbuilds {
            Some(max) => positive(max as u64, "maxbuilds")? as usize,
            None => {
                info!(
                    "Max build limit for period not specified...defaulting to {}",
                    DEFAULT_MAX_BUILDS
                );
                DEFAULT_MAX_BUILDS
            }
        };

        let timeout_secs = match raw.timeoutsecs {
            Some(secs) => positive(secs, "timeoutsecs")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let exclude = ExclusionFilter::new(raw.exclude.unwrap_or_default())?;

        Ok(Self {
            graphite_server,
            graphite_port,
            prefix: raw.prefix,
            teamcity_server,
            username: raw.username,
            password: raw.password,
            poll_interval: Duration::from_secs(poll_secs),
            max_builds,
            timeout: Duration::from_secs(timeout_secs),
            exclude,
        })
    }

    /// Collector address as `host:port`
    pub fn graphite_addr(&self) -> String {
        format!("{}:{}", self.graphite_server, self.graphite_port)
    }

    /// Basic auth credentials, when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    pub fn metric_names(&self) -> MetricNames {
        MetricNames::new(self.prefix.clone())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("graphite_server", &self.graphite_server)
            .field("graphite_port", &self.graphite_port)
            .field("prefix", &self.prefix)
            .field("teamcity_server", &self.teamcity_server)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("poll_interval", &self.poll_interval)
            .field("max_builds", &self.max_builds)
            .field("timeout", &self.timeout)
            .field("exclude", &self.exclude.len())
            .finish()
    }
}

fn required(value: Option<String>, key: &str, message: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => {
            error!("{}", message);
            Err(CistatError::MissingSetting(key.to_string()))
        }
    }
}

fn positive(value: u64, key: &str) -> Result<u64> {
    if value == 0 {
        return Err(CistatError::InvalidSetting(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(value)
}
