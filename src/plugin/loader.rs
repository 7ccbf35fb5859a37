//! Plugin loading.
//!
//! A location is either a type name, resolved against the host catalog, or
//! the path of a `.pkg` archive whose manifest lists the type names to
//! construct. Every candidate is constructed and registered on its own; a
//! failing candidate is logged and skipped.

use std::path::Path;
use std::sync::Arc;

use super::{
    error_chain, ArchiveManifest, FactoryCatalog, HostHandle, LoadedPlugin, LogLevel, PluginError,
    PluginResult, Registry, ResolutionScope, ARCHIVE_EXTENSION, PLUGIN_API_VERSION,
};
use crate::core::ConfigTree;

/// Resolves plugin locations into registered plugins.
#[derive(Clone)]
pub struct PluginLoader {
    catalog: Arc<FactoryCatalog>,
    host: HostHandle,
}

impl PluginLoader {
    /// Create a loader resolving bare type names against `catalog`.
    pub fn new(catalog: Arc<FactoryCatalog>, host: HostHandle) -> Self {
        Self { catalog, host }
    }

    /// The host catalog.
    pub fn catalog(&self) -> &Arc<FactoryCatalog> {
        &self.catalog
    }

    /// The host services handle.
    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    /// Check if a location names an archive.
    pub fn is_archive(location: &str) -> bool {
        Path::new(location)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    }

    /// Load every plugin at `location` into `registry`.
    ///
    /// Returns true if at least one plugin was registered.
    pub fn load_into(&self, registry: &mut Registry, location: &str, config: &ConfigTree) -> bool {
        self.host.debug_log(2, &format!("Loading plugins from {location}"));

        let candidates = if Self::is_archive(location) {
            self.construct_from_archive(location, config)
        } else {
            self.construct_from_type(location, config)
        };

        let mut registered = 0usize;
        for loaded in candidates {
            let name = loaded.name().to_string();
            let type_name = loaded.type_name().to_string();

            match registry.register(loaded) {
                Ok(count) => {
                    registered += 1;
                    self.host.debug_log(
                        2,
                        &format!("Plugin {name} ({type_name}) loaded with {count} capabilities"),
                    );
                }
                Err(e) => self.warn_candidate(&type_name, location, &e),
            }
        }

        self.host.debug_log(
            6,
            &format!(
                "Registry after loading {location}: {} plugins, {} capabilities",
                registry.plugin_count(),
                registry.len()
            ),
        );

        registered > 0
    }

    fn construct_from_type(&self, type_name: &str, config: &ConfigTree) -> Vec<LoadedPlugin> {
        let scope = Arc::new(ResolutionScope::host(Arc::clone(&self.catalog)));

        match construct(&scope, type_name, config) {
            Ok(loaded) => {
                self.host.debug_log(3, &format!("Created plugin instance from type {type_name}"));
                vec![loaded]
            }
            Err(e) => {
                self.warn_candidate(type_name, type_name, &e);
                Vec::new()
            }
        }
    }

    fn construct_from_archive(&self, location: &str, config: &ConfigTree) -> Vec<LoadedPlugin> {
        let (manifest, scope) = match self.open_archive(Path::new(location)) {
            Ok(opened) => opened,
            Err(e) => {
                self.host.log(
                    LogLevel::Warning,
                    &format!("Error processing archive {location}: {}", error_chain(&e)),
                );
                return Vec::new();
            }
        };

        manifest
            .class_names()
            .iter()
            .filter_map(|type_name| match construct(&scope, type_name, config) {
                Ok(loaded) => Some(loaded),
                Err(e) => {
                    self.warn_candidate(type_name, location, &e);
                    None
                }
            })
            .collect()
    }

    fn open_archive(&self, path: &Path) -> PluginResult<(ArchiveManifest, Arc<ResolutionScope>)> {
        let manifest = ArchiveManifest::from_file(path)?;
        manifest.validate()?;

        if !manifest.is_compatible_with(PLUGIN_API_VERSION) {
            return Err(PluginError::IncompatibleVersion {
                name: path.display().to_string(),
                required: manifest.api_version.clone(),
                available: PLUGIN_API_VERSION.to_string(),
            });
        }

        let origin = path.display().to_string();
        let scope = match manifest.library_path(path) {
            Some(library) => self.open_library(&manifest, &origin, &library)?,
            None => ResolutionScope::layered(
                origin,
                FactoryCatalog::new(),
                Some(Arc::clone(&self.catalog)),
            ),
        };

        let local_types: Vec<_> = scope.local_types().collect();
        if !local_types.is_empty() {
            self.host.debug_log(
                3,
                &format!(
                    "Archive {} provides plugin types: {}",
                    scope.origin(),
                    local_types.join(", ")
                ),
            );
        }

        Ok((manifest, Arc::new(scope)))
    }

    #[cfg(feature = "native-plugins")]
    fn open_library(
        &self,
        manifest: &ArchiveManifest,
        origin: &str,
        library: &Path,
    ) -> PluginResult<ResolutionScope> {
        if manifest.checksum.is_some() {
            let bytes = std::fs::read(library)?;
            manifest.verify_checksum(&bytes)?;
        }

        let mut local = FactoryCatalog::new();
        let native = super::native::NativeLibrary::load(library, &mut local)?;

        Ok(ResolutionScope::with_library(origin, local, Some(Arc::clone(&self.catalog)), native))
    }

    #[cfg(not(feature = "native-plugins"))]
    fn open_library(
        &self,
        _manifest: &ArchiveManifest,
        origin: &str,
        library: &Path,
    ) -> PluginResult<ResolutionScope> {
        Err(PluginError::LoadError(format!(
            "Archive {origin} needs library {} but native plugin support is not enabled",
            library.display()
        )))
    }

    fn warn_candidate(&self, type_name: &str, location: &str, error: &PluginError) {
        let message = if type_name == location {
            format!("Failed to load plugin {type_name}: {}", error_chain(error))
        } else {
            format!("Failed to load plugin {type_name} from {location}: {}", error_chain(error))
        };
        self.host.log(LogLevel::Warning, &message);
        self.host.debug_log(6, &format!("{type_name}: {error:?}"));
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader").field("catalog", &self.catalog).finish()
    }
}

fn construct(
    scope: &Arc<ResolutionScope>,
    type_name: &str,
    config: &ConfigTree,
) -> PluginResult<LoadedPlugin> {
    let factory = scope.resolve(type_name)?;
    let plugin = factory.construct(config)?;
    LoadedPlugin::new(plugin, type_name, Arc::clone(scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{DefaultAgentHost, FnParameter, Parameter, Plugin, DataType};
    use tempfile::TempDir;

    struct Single(&'static str);

    impl Plugin for Single {
        fn name(&self) -> &str {
            self.0
        }

        fn parameters(&self) -> PluginResult<Vec<Arc<dyn Parameter>>> {
            Ok(vec![Arc::new(FnParameter::new("cpu", DataType::Float, |_| Ok("0.5".to_string())))])
        }
    }

    fn loader() -> PluginLoader {
        let mut catalog = FactoryCatalog::new();
        catalog.register_fn("pkg.A", |_| Ok(Box::new(Single("A"))));
        catalog.register_fn("pkg.B", |_| Err(PluginError::handler("refused")));
        PluginLoader::new(Arc::new(catalog), DefaultAgentHost::shared(0))
    }

    #[test]
    fn test_is_archive() {
        assert!(PluginLoader::is_archive("/opt/probes.pkg"));
        assert!(PluginLoader::is_archive("PROBES.PKG"));
        assert!(!PluginLoader::is_archive("org.example.Probes"));
        assert!(!PluginLoader::is_archive("/opt/probes.jar"));
    }

    #[test]
    fn test_load_type_name() {
        let mut registry = Registry::new();

        assert!(loader().load_into(&mut registry, "pkg.A", &ConfigTree::empty()));
        assert!(registry.parameter("A/cpu").is_some());
        assert_eq!(registry.plugin("A").unwrap().origin(), "host");
    }

    #[test]
    fn test_load_unknown_type() {
        let mut registry = Registry::new();

        assert!(!loader().load_into(&mut registry, "pkg.Missing", &ConfigTree::empty()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("probes.pkg");
        std::fs::write(&archive, "Plugin-Classname = \"pkg.A;pkg.B\"\n").unwrap();

        let mut registry = Registry::new();
        assert!(loader().load_into(&mut registry, archive.to_str().unwrap(), &ConfigTree::empty()));
        assert_eq!(registry.plugin_count(), 1);
        assert_eq!(registry.plugin("A").unwrap().origin(), archive.display().to_string());
    }

    #[test]
    fn test_load_missing_archive() {
        let mut registry = Registry::new();
        let config = ConfigTree::empty();
        assert!(!loader().load_into(&mut registry, "/nonexistent/probes.pkg", &config));
    }

    #[test]
    fn test_archive_with_incompatible_api() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("future.pkg");
        std::fs::write(&archive, "Plugin-Classname = \"pkg.A\"\nPlugin-Api-Version = \"2.0\"\n")
            .unwrap();

        let mut registry = Registry::new();
        let location = archive.to_str().unwrap();
        assert!(!loader().load_into(&mut registry, location, &ConfigTree::empty()));
        assert!(registry.is_empty());
    }

    #[cfg(not(feature = "native-plugins"))]
    #[test]
    fn test_library_archive_without_native_support() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("native.pkg");
        let manifest = "Plugin-Classname = \"pkg.A\"\nPlugin-Library = \"libnative.so\"\n";
        std::fs::write(&archive, manifest).unwrap();

        let mut registry = Registry::new();
        let location = archive.to_str().unwrap();
        assert!(!loader().load_into(&mut registry, location, &ConfigTree::empty()));
    }
}
