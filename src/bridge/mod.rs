//! Dispatch bridge.
//!
//! The [`Bridge`] is the only surface the host process calls. It owns the
//! published registry snapshot, answers value and action requests by
//! contribution ID, produces the flat introspection listings and fans the
//! lifecycle hooks out to every loaded plugin.
//!
//! Readers clone the current `Arc<Registry>` and never hold the lock while
//! plugin code runs. Writers copy the snapshot, modify the copy and publish
//! it in one swap.

mod dispatch;
mod introspect;
mod lifecycle;
mod protocol;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

pub use protocol::{serve, Request, Response};

use crate::core::{BridgeSettings, ConfigTree};
use crate::plugin::{FactoryCatalog, HostHandle, LogLevel, PluginLoader, Registry};

/// The host-facing dispatch bridge.
pub struct Bridge {
    registry: RwLock<Arc<Registry>>,
    config: RwLock<Arc<ConfigTree>>,
    // Serializes loads, reloads and lifecycle fan-outs.
    writer: Mutex<Lifecycle>,
    loader: PluginLoader,
}

/// Lifecycle state of the published plugin generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Loaded,
    Running,
    Stopped,
}

impl Bridge {
    /// Create a bridge with an empty registry.
    pub fn new(loader: PluginLoader, config: ConfigTree) -> Self {
        Self {
            registry: RwLock::new(Arc::new(Registry::new())),
            config: RwLock::new(Arc::new(config)),
            writer: Mutex::new(Lifecycle::Loaded),
            loader,
        }
    }

    /// Create a bridge resolving type names against `catalog`.
    pub fn with_catalog(catalog: FactoryCatalog, host: HostHandle, config: ConfigTree) -> Self {
        Self::new(PluginLoader::new(Arc::new(catalog), host), config)
    }

    /// Create a bridge over the built-in catalog and load every configured
    /// plugin location.
    pub fn from_config(config: ConfigTree, host: HostHandle) -> Self {
        let bridge = Self::with_catalog(FactoryCatalog::with_builtins(), host, config);
        bridge.load_configured();
        bridge
    }

    /// Host services handle.
    pub fn host(&self) -> &HostHandle {
        self.loader.host()
    }

    /// The host catalog.
    pub fn catalog(&self) -> &Arc<FactoryCatalog> {
        self.loader.catalog()
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<ConfigTree> {
        Arc::clone(&self.config.read())
    }

    /// Current registry snapshot.
    pub fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read())
    }

    /// Replace the published registry, returning the previous one.
    fn publish(&self, registry: Registry) -> Arc<Registry> {
        std::mem::replace(&mut *self.registry.write(), Arc::new(registry))
    }

    /// Load the plugins at `location` and register their capabilities.
    ///
    /// Returns false if no plugin could be loaded; the published registry
    /// is then unchanged.
    pub fn load_plugin(&self, location: &str) -> bool {
        let _writer = self.writer.lock();
        let config = self.config();

        let mut next = Registry::clone(&self.snapshot());
        if !self.loader.load_into(&mut next, location, &config) {
            return false;
        }

        self.publish(next);
        true
    }

    /// Load every location listed in the configuration.
    ///
    /// Returns the number of locations that loaded at least one plugin.
    pub fn load_configured(&self) -> usize {
        let locations = BridgeSettings::from_tree(&self.config()).plugins;
        if locations.is_empty() {
            self.host().log(LogLevel::Warning, "No plugins defined in Bridge section");
            return 0;
        }

        locations
            .iter()
            .filter(|location| {
                let loaded = self.load_plugin(location);
                if !loaded {
                    self.host().debug_log(2, &format!("Nothing loaded from {location}"));
                }
                loaded
            })
            .count()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.snapshot();
        f.debug_struct("Bridge")
            .field("plugins", &registry.plugin_count())
            .field("capabilities", &registry.len())
            .field("built_at", &registry.built_at())
            .finish()
    }
}
