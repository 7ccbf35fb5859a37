//! Plugin factories and type resolution.
//!
//! Plugin types are resolved by name against a [`FactoryCatalog`]. The host
//! catalog holds the compiled-in types; every archive gets its own
//! [`ResolutionScope`] whose local catalog shadows the host catalog.

use std::sync::Arc;

use indexmap::IndexMap;

use super::manifest::api_compatible;
use super::{guarded, Plugin, PluginError, PluginResult, PLUGIN_API_VERSION};
use crate::core::ConfigTree;

/// Constructor shared by every instance of a plugin type.
pub type PluginConstructor = dyn Fn(&ConfigTree) -> PluginResult<Box<dyn Plugin>> + Send + Sync;

/// Named constructor for one plugin type.
#[derive(Clone)]
pub struct PluginFactory {
    type_name: String,
    api_version: String,
    construct: Arc<PluginConstructor>,
}

impl PluginFactory {
    /// Create a factory built against the current API version.
    pub fn new(
        type_name: impl Into<String>,
        construct: impl Fn(&ConfigTree) -> PluginResult<Box<dyn Plugin>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            api_version: PLUGIN_API_VERSION.to_string(),
            construct: Arc::new(construct),
        }
    }

    /// Set the API version the factory was built against.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Fully-qualified type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// API version the factory was built against.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Check if this factory can be used by a host providing `host_api_version`.
    pub fn is_compatible_with(&self, host_api_version: &str) -> bool {
        api_compatible(&self.api_version, host_api_version)
    }

    /// Construct a plugin instance from the agent configuration.
    pub fn construct(&self, config: &ConfigTree) -> PluginResult<Box<dyn Plugin>> {
        if !self.is_compatible_with(PLUGIN_API_VERSION) {
            return Err(PluginError::IncompatibleVersion {
                name: self.type_name.clone(),
                required: self.api_version.clone(),
                available: PLUGIN_API_VERSION.to_string(),
            });
        }

        guarded(|| (self.construct)(config)).map_err(|source| PluginError::Construction {
            type_name: self.type_name.clone(),
            source: Box::new(source),
        })
    }
}

impl std::fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginFactory")
            .field("type_name", &self.type_name)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Mapping from type name to plugin factory.
#[derive(Debug, Clone, Default)]
pub struct FactoryCatalog {
    factories: IndexMap<String, PluginFactory>,
}

impl FactoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the compiled-in plugin types.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        crate::builtin::register(&mut catalog);
        catalog
    }

    /// Register a factory, returning the one it replaced.
    pub fn register(&mut self, factory: PluginFactory) -> Option<PluginFactory> {
        self.factories.insert(factory.type_name.clone(), factory)
    }

    /// Register a constructor under `type_name`.
    pub fn register_fn(
        &mut self,
        type_name: impl Into<String>,
        construct: impl Fn(&ConfigTree) -> PluginResult<Box<dyn Plugin>> + Send + Sync + 'static,
    ) -> Option<PluginFactory> {
        self.register(PluginFactory::new(type_name, construct))
    }

    /// Get a factory by type name.
    pub fn get(&self, type_name: &str) -> Option<&PluginFactory> {
        self.factories.get(type_name)
    }

    /// Check if a type name is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered type names, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Type resolution scope of one plugin location.
///
/// Lookups try the scope's local catalog first, then the parent catalog.
/// Plugins keep their scope alive, and with it any shared library their
/// code lives in.
pub struct ResolutionScope {
    origin: String,
    local: FactoryCatalog,
    parent: Option<Arc<FactoryCatalog>>,
    // Declared last: dropped after the factories that point into it.
    #[cfg(feature = "native-plugins")]
    library: Option<super::native::NativeLibrary>,
}

impl ResolutionScope {
    /// Scope resolving directly against the host catalog.
    pub fn host(catalog: Arc<FactoryCatalog>) -> Self {
        Self::layered("host", FactoryCatalog::new(), Some(catalog))
    }

    /// Scope with a local catalog layered over `parent`.
    pub fn layered(
        origin: impl Into<String>,
        local: FactoryCatalog,
        parent: Option<Arc<FactoryCatalog>>,
    ) -> Self {
        Self {
            origin: origin.into(),
            local,
            parent,
            #[cfg(feature = "native-plugins")]
            library: None,
        }
    }

    /// Scope whose local catalog was filled by a shared library.
    #[cfg(feature = "native-plugins")]
    pub fn with_library(
        origin: impl Into<String>,
        local: FactoryCatalog,
        parent: Option<Arc<FactoryCatalog>>,
        library: super::native::NativeLibrary,
    ) -> Self {
        let mut scope = Self::layered(origin, local, parent);
        scope.library = Some(library);
        scope
    }

    /// Where this scope came from: `host` or an archive path.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Resolve a type name.
    pub fn resolve(&self, type_name: &str) -> PluginResult<&PluginFactory> {
        self.local
            .get(type_name)
            .or_else(|| self.parent.as_deref().and_then(|parent| parent.get(type_name)))
            .ok_or_else(|| PluginError::UnknownType(type_name.to_string()))
    }

    /// Types provided by the scope itself, without the parent.
    pub fn local_types(&self) -> impl Iterator<Item = &str> {
        self.local.type_names()
    }
}

impl std::fmt::Debug for ResolutionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionScope")
            .field("origin", &self.origin)
            .field("local", &self.local.len())
            .finish()
    }
}

/// Export the registration entry point of a plugin library.
///
/// ```ignore
/// agentbridge::export_plugins! {
///     "probes.Cpu" => |config| Ok(Box::new(CpuPlugin::new(config)?)),
/// }
/// ```
///
/// The library must be built with the same compiler as the agent.
#[macro_export]
macro_rules! export_plugins {
    ($($type_name:expr => $construct:expr),+ $(,)?) => {
        #[allow(unsafe_code)]
        #[no_mangle]
        pub fn agentbridge_register(catalog: &mut $crate::plugin::FactoryCatalog) {
            $(catalog.register_fn($type_name, $construct);)+
        }
    };
}
