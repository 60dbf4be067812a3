//! Connection parameters and the configuration file.
//!
//! A [`TransportConfig`] describes how to reach one database. Anything left out falls back
//! to a local default, and every fallback is announced with a warning so a misconfigured
//! connection does not go unnoticed.
//!
//! The optional configuration file is JSON:
//!
//! ```json
//! {
//!     "warnings": true,
//!     "default_client": "websocket",
//!     "connections": {
//!         "default": { "host": "localhost", "port": 8000, "user": "root", "password": "root" },
//!         "analytics": { "host": "10.0.0.4", "transport": "http", "namespace": "prod" }
//!     }
//! }
//! ```
//!
//! It is read from the path in `TUNDRA_CONFIG`, or `tundra.json` in the working directory.
use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ConfigurationError, protocol::TransportKind};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_DATABASE: &str = "default";
/// Kept below the server's 1 MiB body limit on the resource endpoints.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1_000_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const CONFIG_ENV: &str = "TUNDRA_CONFIG";
pub const CONFIG_FILE: &str = "tundra.json";

const KNOWN_KEYS: [&str; 3] = ["warnings", "connections", "default_client"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub transport: Option<TransportKind>,
    /// Bodies larger than this are written through a query statement instead.
    pub max_payload_bytes: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl TransportConfig {
    /// Fill in every missing location field, warning about each one when `warn_missing`.
    pub fn apply_defaults(&mut self, warn_missing: bool) {
        let notice = |field: &str, value: &dyn std::fmt::Display| {
            if warn_missing {
                warn!("no {field} specified, using {value}");
            }
        };

        if self.host.is_none() {
            notice("host", &DEFAULT_HOST);
            self.host = Some(DEFAULT_HOST.to_string());
        }
        if self.port.is_none() {
            notice("port", &DEFAULT_PORT);
            self.port = Some(DEFAULT_PORT);
        }
        if self.namespace.is_none() {
            notice("namespace", &DEFAULT_NAMESPACE);
            self.namespace = Some(DEFAULT_NAMESPACE.to_string());
        }
        if self.database.is_none() {
            notice("database", &DEFAULT_DATABASE);
            self.database = Some(DEFAULT_DATABASE.to_string());
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.unwrap_or_default()
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Announce defaulted connection fields.
    pub warnings: bool,
    pub connections: HashMap<String, TransportConfig>,
    /// Transport used by connections that do not name one.
    pub default_client: TransportKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warnings: true,
            connections: HashMap::new(),
            default_client: TransportKind::default(),
        }
    }
}

impl Config {
    /// Configuration file location; `override_path` is the value of `TUNDRA_CONFIG`.
    pub fn locate(override_path: Option<OsString>) -> PathBuf {
        match override_path {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(CONFIG_FILE),
        }
    }

    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_from(&Self::locate(std::env::var_os(CONFIG_ENV)))
    }

    /// Load a configuration file. A missing file is an empty configuration; unknown
    /// top-level keys are dropped with a warning.
    pub fn load_from(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            debug!("no config file at {path:?}");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut raw: serde_json::Map<String, Value> =
            serde_json::from_str(&text).map_err(parse_error)?;

        let unknown = raw
            .keys()
            .filter(|k| !KNOWN_KEYS.contains(&k.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        if !unknown.is_empty() {
            warn!("ignoring unknown keys in {path:?}: {unknown:?}");
            for key in &unknown {
                raw.remove(key);
            }
        }

        serde_json::from_value(Value::Object(raw)).map_err(parse_error)
    }

    /// Parameters of a named connection, with defaults filled in.
    pub fn connection(&self, name: &str) -> Result<TransportConfig, ConfigurationError> {
        let config = self.connections.get(name).cloned().ok_or_else(|| {
            ConfigurationError::UnknownConnection {
                name: name.to_string(),
            }
        })?;
        Ok(self.complete(config))
    }

    /// Parameters used when nothing at all is configured.
    pub fn fallback(&self) -> TransportConfig {
        self.complete(TransportConfig::default())
    }

    fn complete(&self, mut config: TransportConfig) -> TransportConfig {
        config.transport.get_or_insert(self.default_client);
        config.apply_defaults(self.warnings);
        config
    }
}
