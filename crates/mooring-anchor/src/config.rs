//! # Anchoring Configuration
//!
//! Recognized options:
//!
//! | Key | Env override | Default |
//! |---|---|---|
//! | `anchor_delay_ms` | `MOORING_ANCHOR_DELAY_MS` | `0` |
//! | `anchor_on_request` | `MOORING_ANCHOR_ON_REQUEST` | `true` |
//! | `anchor_interval_ms` | `MOORING_ANCHOR_INTERVAL_MS` | unset |
//! | `chain_id` | `MOORING_CHAIN_ID` | `eip155:1` |
//!
//! Files are YAML (JSON is accepted as a YAML subset). Environment values
//! win over file values. A malformed value is an error; nothing falls back
//! to a default silently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chain identifier for synthetic ledger events.
pub const DEFAULT_CHAIN_ID: &str = "eip155:1";

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser error.
        source: serde_yaml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// What was expected.
        expected: &'static str,
    },
}

/// Anchoring engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnchorConfig {
    /// Finality latency before a completion notice fires.
    #[serde(rename = "anchor_delay_ms", with = "millis")]
    pub anchor_delay: Duration,
    /// `true`: anchor each request as it arrives. `false`: queue until `anchor()`.
    pub anchor_on_request: bool,
    /// Period of the background anchoring cycle in batched mode.
    #[serde(
        rename = "anchor_interval_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub anchor_interval: Option<Duration>,
    /// Chain identifier recorded in proofs.
    pub chain_id: String,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            anchor_delay: Duration::ZERO,
            anchor_on_request: true,
            anchor_interval: None,
            chain_id: DEFAULT_CHAIN_ID.to_string(),
        }
    }
}

impl AnchorConfig {
    /// Batched mode with the given completion delay.
    pub fn batched(anchor_delay: Duration) -> Self {
        Self {
            anchor_delay,
            anchor_on_request: false,
            ..Self::default()
        }
    }

    /// Immediate mode with the given completion delay.
    pub fn immediate(anchor_delay: Duration) -> Self {
        Self {
            anchor_delay,
            anchor_on_request: true,
            ..Self::default()
        }
    }

    /// Read a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, overlaid by `path` if given, overlaid by the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides looked up through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("MOORING_ANCHOR_DELAY_MS") {
            self.anchor_delay = Duration::from_millis(parse_millis("MOORING_ANCHOR_DELAY_MS", value)?);
        }
        if let Some(value) = lookup("MOORING_ANCHOR_ON_REQUEST") {
            self.anchor_on_request = parse_bool("MOORING_ANCHOR_ON_REQUEST", value)?;
        }
        if let Some(value) = lookup("MOORING_ANCHOR_INTERVAL_MS") {
            let ms = parse_millis("MOORING_ANCHOR_INTERVAL_MS", value)?;
            self.anchor_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(value) = lookup("MOORING_CHAIN_ID") {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidEnv {
                    var: "MOORING_CHAIN_ID",
                    value,
                    expected: "a non-empty chain identifier",
                });
            }
            self.chain_id = value;
        }
        Ok(self)
    }
}

fn parse_millis(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value,
        expected: "a non-negative integer number of milliseconds",
    })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value,
            expected: "true or false",
        }),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => super::millis::serialize(d, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}
