//! Lifecycle fan-out and reload.

use std::sync::Arc;

use super::{Bridge, Lifecycle};
use crate::core::{BridgeSettings, ConfigTree};
use crate::plugin::{error_chain, guarded, LogLevel, Registry};

impl Bridge {
    /// Call every plugin's init hook in registration order.
    ///
    /// A failing plugin is logged and skipped. Init hooks run once per
    /// plugin generation: calling `init` again while the plugins are running
    /// does nothing, and `init` after `shutdown` runs the hooks again.
    /// Always returns true.
    pub fn init(&self, config: &ConfigTree) -> bool {
        let mut state = self.writer.lock();
        if *state == Lifecycle::Running {
            self.host().debug_log(2, "Bridge already initialized");
            return true;
        }

        self.host().debug_log(2, "Bridge initialization started");
        init_all(self, &self.snapshot(), config);
        *state = Lifecycle::Running;
        self.host().debug_log(2, "Bridge initialization completed");
        true
    }

    /// Call every plugin's shutdown hook in registration order.
    ///
    /// Runs once per plugin generation, until the next `init` or `reload`.
    pub fn shutdown(&self) {
        let mut state = self.writer.lock();
        if *state == Lifecycle::Stopped {
            return;
        }

        self.host().debug_log(2, "Bridge shutdown initiated");
        shutdown_all(self, &self.snapshot());
        *state = Lifecycle::Stopped;
        self.host().debug_log(2, "Bridge shutdown completed");
    }

    /// Re-read the configuration and rebuild the registry from scratch.
    ///
    /// The new plugins are initialised before the new registry is
    /// published; the replaced plugins are shut down afterwards unless they
    /// already were. Returns the number of plugins in the new registry.
    pub fn reload(&self) -> usize {
        let mut state = self.writer.lock();

        let config = match self.config().reread() {
            Ok(config) => Arc::new(config),
            Err(e) => {
                self.host().log(
                    LogLevel::Warning,
                    &format!("Cannot re-read configuration, keeping the current one: {e:#}"),
                );
                self.config()
            }
        };

        let locations = BridgeSettings::from_tree(&config).plugins;
        if locations.is_empty() {
            self.host().log(LogLevel::Warning, "No plugins defined in Bridge section");
        }

        let mut next = Registry::new();
        for location in &locations {
            self.loader.load_into(&mut next, location, &config);
        }
        init_all(self, &next, &config);

        let plugin_count = next.plugin_count();
        let built_at = next.built_at();
        *self.config.write() = config;
        let previous = self.publish(next);
        if *state != Lifecycle::Stopped {
            shutdown_all(self, &previous);
        }
        *state = Lifecycle::Running;

        tracing::info!(
            plugins = plugin_count,
            locations = locations.len(),
            built_at = %built_at,
            "Plugin registry reloaded"
        );
        plugin_count
    }
}

fn init_all(bridge: &Bridge, registry: &Registry, config: &ConfigTree) {
    let host = bridge.host();
    for loaded in registry.plugins() {
        host.debug_log(5, &format!("Calling init for plugin {}", loaded.name()));
        if let Err(e) = guarded(|| loaded.plugin().init(config, host)) {
            host.log(
                LogLevel::Warning,
                &format!("Plugin {} initialization failed: {}", loaded.name(), error_chain(&e)),
            );
            host.debug_log(6, &format!("  {e:?}"));
        }
    }
}

fn shutdown_all(bridge: &Bridge, registry: &Registry) {
    let host = bridge.host();
    for loaded in registry.plugins() {
        host.debug_log(5, &format!("Calling shutdown for plugin {}", loaded.name()));
        if let Err(e) = guarded(|| loaded.plugin().shutdown()) {
            host.log(
                LogLevel::Warning,
                &format!("Plugin {} shutdown failed: {}", loaded.name(), error_chain(&e)),
            );
            host.debug_log(6, &format!("  {e:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::plugin::{
        DefaultAgentHost, FactoryCatalog, HostHandle, Plugin, PluginError, PluginResult,
    };

    struct Counting {
        name: &'static str,
        inits: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Plugin for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&self, _config: &ConfigTree, _host: &HostHandle) -> PluginResult<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PluginError::handler("init refused"));
            }
            Ok(())
        }

        fn shutdown(&self) -> PluginResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                panic!("shutdown exploded");
            }
            Ok(())
        }
    }

    fn bridge(inits: &Arc<AtomicUsize>, shutdowns: &Arc<AtomicUsize>) -> Bridge {
        let mut catalog = FactoryCatalog::new();
        for (type_name, name, fail) in [("t.Bad", "Bad", true), ("t.Good", "Good", false)] {
            let inits = Arc::clone(inits);
            let shutdowns = Arc::clone(shutdowns);
            catalog.register_fn(type_name, move |_| {
                Ok(Box::new(Counting {
                    name,
                    inits: Arc::clone(&inits),
                    shutdowns: Arc::clone(&shutdowns),
                    fail,
                }))
            });
        }

        let config = ConfigTree::from_toml("[Bridge]\nPlugin = [\"t.Bad\", \"t.Good\"]\n").unwrap();
        let bridge = Bridge::with_catalog(catalog, DefaultAgentHost::shared(0), config);
        assert_eq!(bridge.load_configured(), 2);
        bridge
    }

    #[test]
    fn test_init_isolates_failures() {
        let inits = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = bridge(&inits, &shutdowns);

        assert!(bridge.init(&ConfigTree::empty()));
        assert_eq!(inits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_isolates_panics_and_runs_once() {
        let inits = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = bridge(&inits, &shutdowns);

        bridge.shutdown();
        bridge.shutdown();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reload_swaps_registry() {
        let inits = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = bridge(&inits, &shutdowns);
        let before = bridge.snapshot();

        assert_eq!(bridge.reload(), 2);

        assert!(!Arc::ptr_eq(&before, &bridge.snapshot()));
        assert_eq!(inits.load(Ordering::SeqCst), 2);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_init_runs_once_per_generation() {
        let inits = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = bridge(&inits, &shutdowns);

        bridge.init(&ConfigTree::empty());
        bridge.init(&ConfigTree::empty());
        assert_eq!(inits.load(Ordering::SeqCst), 2);

        bridge.shutdown();
        bridge.init(&ConfigTree::empty());
        assert_eq!(inits.load(Ordering::SeqCst), 4);
    }

    /// Plugin recording which construction generation it belongs to.
    struct Generation {
        id: usize,
        stopped: Arc<Mutex<Vec<usize>>>,
    }

    impl Plugin for Generation {
        fn name(&self) -> &str {
            "Gen"
        }

        fn shutdown(&self) -> PluginResult<()> {
            self.stopped.lock().push(self.id);
            Ok(())
        }
    }

    fn generation_bridge(stopped: &Arc<Mutex<Vec<usize>>>) -> Bridge {
        let built = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::clone(stopped);
        let mut catalog = FactoryCatalog::new();
        catalog.register_fn("t.Gen", move |_| {
            Ok(Box::new(Generation {
                id: built.fetch_add(1, Ordering::SeqCst),
                stopped: Arc::clone(&stopped),
            }))
        });

        let config = ConfigTree::from_toml("[Bridge]\nPlugin = \"t.Gen\"\n").unwrap();
        let bridge = Bridge::with_catalog(catalog, DefaultAgentHost::shared(0), config);
        assert_eq!(bridge.load_configured(), 1);
        bridge
    }

    #[test]
    fn test_shutdown_after_reload_reaches_new_generation() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let bridge = generation_bridge(&stopped);

        bridge.init(&ConfigTree::empty());
        bridge.shutdown();
        assert_eq!(bridge.reload(), 1);
        bridge.shutdown();

        assert_eq!(*stopped.lock(), vec![0, 1]);
    }

    #[test]
    fn test_reload_of_running_generation_stops_it_once() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let bridge = generation_bridge(&stopped);

        bridge.init(&ConfigTree::empty());
        bridge.reload();
        bridge.reload();
        bridge.shutdown();
        bridge.shutdown();

        assert_eq!(*stopped.lock(), vec![0, 1, 2]);
    }
}
