//! Session settings.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REMOTE_URL: &str = "https://pandarus.brightwaylca.org";

/// Settings for opening a [`SpatialContext`](crate::SpatialContext) and
/// talking to the remote geometry service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding registries, raw data and processed arrays.
    pub data_dir: PathBuf,

    /// Base URL of the remote geometry service.
    /// Default: https://pandarus.brightwaylca.org
    pub remote_url: String,

    /// Seconds between two polls of a remote job.
    /// Default: 10
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("regional-data"),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            poll_interval_secs: 10,
        }
    }
}

impl Settings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    /// Defaults overridden by `REGIONAL_LCIA_DIR`, `REGIONAL_LCIA_REMOTE`
    /// and `REGIONAL_LCIA_POLL_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        if let Ok(dir) = std::env::var("REGIONAL_LCIA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("REGIONAL_LCIA_REMOTE") {
            settings.remote_url = url;
        }
        if let Ok(secs) = std::env::var("REGIONAL_LCIA_POLL_SECS") {
            settings.poll_interval_secs = secs.trim().parse()
                .with_context(|| format!("Invalid REGIONAL_LCIA_POLL_SECS: {secs}"))?;
        }
        Ok(settings)
    }

    pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs) }

    /// Remote URL without a trailing slash.
    pub(crate) fn remote_base(&self) -> &str { self.remote_url.trim_end_matches('/') }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"data_dir": "/tmp/lcia"}"#).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/lcia"));
        assert_eq!(settings.remote_url, DEFAULT_REMOTE_URL);
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn remote_base_trims_slash() {
        let settings = Settings { remote_url: "http://localhost:5000/".into(), ..Settings::default() };
        assert_eq!(settings.remote_base(), "http://localhost:5000");
    }
}
