//! Named, shared connections.
//!
//! A [`Registry`] hands out connections by name, constructing each one from the
//! configuration the first time it is asked for and sharing it afterwards. Every name has
//! its own slot, locked while that connection is being established, so two threads asking
//! for the same name at once end up with one connection while other names stay available.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, info};

use crate::{Connection, Result, config::{Config, TransportConfig}};

pub const CURRENT: &str = "current";
pub const DEFAULT: &str = "default";

/// A connection shared between callers; calls on it are serialized by the lock.
pub type Shared = Arc<Mutex<Connection>>;

type Slot = Arc<Mutex<Option<Shared>>>;
type Connector = Box<dyn Fn(&TransportConfig) -> Result<Connection> + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Registry {
    config: Config,
    slots: Mutex<HashMap<String, Slot>>,
    current: Mutex<Option<Shared>>,
    connector: Connector,
}

impl Registry {
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Connection::connect)
    }

    /// A registry that establishes connections through `connector` instead of the network.
    pub fn with_connector<F>(config: Config, connector: F) -> Self
    where
        F: Fn(&TransportConfig) -> Result<Connection> + Send + Sync + 'static,
    {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            connector: Box::new(connector),
        }
    }

    /// A registry over the configuration file found through the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::load()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find or establish a connection.
    ///
    /// - `None` or `"current"`: the most recently established connection, falling back to
    ///   `"default"`.
    /// - `"default"`: the configured default connection, or local defaults when none is
    ///   configured.
    /// - any other name: that configured connection.
    pub fn resolve(&self, name: Option<&str>) -> Result<Shared> {
        match name {
            None | Some(CURRENT) => {
                if let Some(current) = self.current() {
                    return Ok(current);
                }
                self.resolve_default()
            }
            Some(DEFAULT) => self.resolve_default(),
            Some(name) => self.establish(name, || Ok(self.config.connection(name)?)),
        }
    }

    fn resolve_default(&self) -> Result<Shared> {
        self.establish(DEFAULT, || {
            if self.config.connections.contains_key(DEFAULT) {
                Ok(self.config.connection(DEFAULT)?)
            } else {
                debug!("no default connection configured, using local defaults");
                Ok(self.config.fallback())
            }
        })
    }

    fn slot(&self, name: &str) -> Slot {
        lock(&self.slots).entry(name.to_string()).or_default().clone()
    }

    fn establish<F>(&self, name: &str, settings: F) -> Result<Shared>
    where
        F: FnOnce() -> Result<TransportConfig>,
    {
        let slot = self.slot(name);
        let mut entry = lock(&slot);
        if let Some(shared) = entry.as_ref() {
            return Ok(shared.clone());
        }

        let config = settings()?;
        info!("establishing connection {name:?}");
        let shared = Arc::new(Mutex::new((self.connector)(&config)?));
        *entry = Some(shared.clone());
        *lock(&self.current) = Some(shared.clone());
        Ok(shared)
    }

    /// Store an already open connection under `name` and make it current.
    pub fn register(&self, name: &str, connection: Connection) -> Shared {
        let shared = Arc::new(Mutex::new(connection));
        *lock(&self.slot(name)) = Some(shared.clone());
        *lock(&self.current) = Some(shared.clone());
        shared
    }

    pub fn current(&self) -> Option<Shared> {
        lock(&self.current).clone()
    }
}
