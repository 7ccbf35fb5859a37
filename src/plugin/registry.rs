//! Capability registry.
//!
//! One ordered map holds every capability item of every loaded plugin,
//! keyed by kind and contribution ID. A registry is built by the load phase
//! and then published read-only; reloading builds a new one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::{
    guarded, CapabilityItem, CapabilityKind, ContributionId, DataType, Plugin, PluginResult,
    ResolutionScope, TableColumn,
};

/// A constructed plugin and the scope its type was resolved in.
pub struct LoadedPlugin {
    name: String,
    type_name: String,
    plugin: Box<dyn Plugin>,
    scope: Arc<ResolutionScope>,
}

impl LoadedPlugin {
    /// Wrap a constructed plugin. Reads its name under guard.
    pub fn new(
        plugin: Box<dyn Plugin>,
        type_name: impl Into<String>,
        scope: Arc<ResolutionScope>,
    ) -> PluginResult<Self> {
        let name = guarded(|| Ok(plugin.name().to_string()))?;
        Ok(Self { name, type_name: type_name.into(), plugin, scope })
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type name the plugin was constructed from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Location the plugin was loaded from.
    pub fn origin(&self) -> &str {
        self.scope.origin()
    }

    /// Plugin version, read under guard.
    pub fn version(&self) -> String {
        guarded(|| Ok(self.plugin.version().to_string())).unwrap_or_default()
    }

    /// The plugin itself.
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("origin", &self.origin())
            .finish()
    }
}

/// A registered capability item with its metadata captured at registration.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Contribution ID.
    pub id: ContributionId,
    /// The item.
    pub item: CapabilityItem,
    /// Item name.
    pub name: String,
    /// Item description.
    pub description: String,
    /// Declared type, for parameters and push parameters.
    pub data_type: Option<DataType>,
    /// Column definitions, for tables.
    pub columns: Vec<TableColumn>,
    // Keeps the contributing plugin's code loaded while the item is reachable.
    owner: Arc<LoadedPlugin>,
}

impl RegistryEntry {
    /// Kind of the entry.
    pub fn kind(&self) -> CapabilityKind {
        self.item.kind()
    }

    /// Plugin that contributed the entry.
    pub fn owner(&self) -> &LoadedPlugin {
        &self.owner
    }
}

/// Registry of every capability contributed by the loaded plugins.
#[derive(Debug, Clone)]
pub struct Registry {
    // Entries before plugins: items are released before their plugins.
    entries: IndexMap<(CapabilityKind, ContributionId), RegistryEntry>,
    plugins: Vec<Arc<LoadedPlugin>>,
    built_at: DateTime<Utc>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { entries: IndexMap::new(), plugins: Vec::new(), built_at: Utc::now() }
    }

    /// Register every capability of a plugin.
    ///
    /// All five kinds are enumerated before anything is inserted; if one
    /// enumeration fails the registry is left unchanged. Entries sharing an
    /// ID with an existing entry replace it. Plugin names need not be unique;
    /// every registered plugin keeps its place in the lifecycle order.
    pub fn register(&mut self, loaded: LoadedPlugin) -> PluginResult<usize> {
        let loaded = Arc::new(loaded);
        let staged = stage_items(&loaded)?;
        let count = staged.len();

        for entry in staged {
            self.entries.insert((entry.kind(), entry.id.clone()), entry);
        }
        self.plugins.push(loaded);

        Ok(count)
    }

    /// Look up an entry.
    pub fn get(&self, kind: CapabilityKind, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(&(kind, ContributionId::from(id)))
    }

    /// Look up an action.
    pub fn action(&self, id: &str) -> Option<&RegistryEntry> {
        self.get(CapabilityKind::Action, id)
    }

    /// Look up a parameter.
    pub fn parameter(&self, id: &str) -> Option<&RegistryEntry> {
        self.get(CapabilityKind::Parameter, id)
    }

    /// Look up a list parameter.
    pub fn list(&self, id: &str) -> Option<&RegistryEntry> {
        self.get(CapabilityKind::List, id)
    }

    /// Look up a push parameter.
    pub fn push_parameter(&self, id: &str) -> Option<&RegistryEntry> {
        self.get(CapabilityKind::Push, id)
    }

    /// Look up a table parameter.
    pub fn table(&self, id: &str) -> Option<&RegistryEntry> {
        self.get(CapabilityKind::Table, id)
    }

    /// Entries of one kind, in first-registration order.
    pub fn iter_kind(&self, kind: CapabilityKind) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values().filter(move |entry| entry.kind() == kind)
    }

    /// Number of entries of one kind.
    pub fn count(&self, kind: CapabilityKind) -> usize {
        self.iter_kind(kind).count()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered plugins, in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.plugins.iter().map(Arc::as_ref)
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Look up the most recently registered plugin with `name`.
    pub fn plugin(&self, name: &str) -> Option<&LoadedPlugin> {
        self.plugins.iter().rev().find(|p| p.name() == name).map(Arc::as_ref)
    }

    /// When the registry was created.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

fn stage_items(loaded: &Arc<LoadedPlugin>) -> PluginResult<Vec<RegistryEntry>> {
    let plugin = loaded.plugin();

    let items = guarded(|| {
        let mut items = Vec::new();
        items.extend(plugin.actions()?.into_iter().map(CapabilityItem::Action));
        items.extend(plugin.parameters()?.into_iter().map(CapabilityItem::Parameter));
        items.extend(plugin.list_parameters()?.into_iter().map(CapabilityItem::List));
        items.extend(plugin.push_parameters()?.into_iter().map(CapabilityItem::Push));
        items.extend(plugin.table_parameters()?.into_iter().map(CapabilityItem::Table));
        Ok(items)
    })?;

    items
        .into_iter()
        .map(|item| {
            guarded(|| {
                Ok(RegistryEntry {
                    id: ContributionId::new(loaded.name(), item.name()),
                    name: item.name().to_string(),
                    description: item.description().to_string(),
                    data_type: item.data_type(),
                    columns: item.columns().to_vec(),
                    item,
                    owner: Arc::clone(loaded),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{
        Action, FactoryCatalog, FnAction, FnParameter, FnTable, Parameter, PluginError, PushItem,
        PushParameter, TableParameter,
    };

    struct Probe {
        name: &'static str,
        value: &'static str,
        fail_tables: bool,
    }

    impl Plugin for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn actions(&self) -> PluginResult<Vec<Arc<dyn Action>>> {
            Ok(vec![Arc::new(FnAction::new("reset", |_, _| Ok(true)))])
        }

        fn parameters(&self) -> PluginResult<Vec<Arc<dyn Parameter>>> {
            let value = self.value;
            Ok(vec![Arc::new(
                FnParameter::new("free", DataType::UInt64, move |_| Ok(value.to_string()))
                    .with_description("Free space"),
            )])
        }

        fn push_parameters(&self) -> PluginResult<Vec<Arc<dyn PushParameter>>> {
            Ok(vec![Arc::new(PushItem::new("events", DataType::Counter32))])
        }

        fn table_parameters(&self) -> PluginResult<Vec<Arc<dyn TableParameter>>> {
            if self.fail_tables {
                return Err(PluginError::handler("table enumeration failed"));
            }
            Ok(vec![Arc::new(FnTable::new(
                "disks",
                vec![TableColumn::new("name", DataType::String).instance()],
                |_| Ok(Vec::new()),
            ))])
        }
    }

    fn loaded(name: &'static str, value: &'static str, fail_tables: bool) -> LoadedPlugin {
        let scope = Arc::new(ResolutionScope::host(Arc::new(FactoryCatalog::new())));
        let probe = Probe { name, value, fail_tables };
        LoadedPlugin::new(Box::new(probe), "test.Probe", scope).unwrap()
    }

    fn value_of(registry: &Registry, id: &str) -> String {
        match &registry.parameter(id).unwrap().item {
            CapabilityItem::Parameter(p) => p.value(id).unwrap(),
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn test_register_all_kinds() {
        let mut registry = Registry::new();
        let count = registry.register(loaded("X", "1", false)).unwrap();

        assert_eq!(count, 4);
        assert!(registry.action("X/reset").is_some());
        assert!(registry.push_parameter("X/events").is_some());
        assert!(registry.table("X/disks").is_some());
        assert_eq!(registry.count(CapabilityKind::List), 0);

        let entry = registry.parameter("X/free").unwrap();
        assert_eq!(entry.name, "free");
        assert_eq!(entry.description, "Free space");
        assert_eq!(entry.data_type, Some(DataType::UInt64));
        assert_eq!(entry.owner().name(), "X");
        assert!(registry.built_at() <= Utc::now());
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut registry = Registry::new();
        registry.register(loaded("X", "1", false)).unwrap();

        assert!(registry.parameter("X/reset").is_none());
        assert!(registry.action("X/free").is_none());
    }

    #[test]
    fn test_failed_enumeration_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        registry.register(loaded("X", "1", false)).unwrap();

        let err = registry.register(loaded("Y", "2", true)).unwrap_err();
        assert!(matches!(err, PluginError::Handler(_)));

        assert!(registry.parameter("Y/free").is_none());
        assert!(registry.action("Y/reset").is_none());
        assert_eq!(registry.plugin_count(), 1);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = Registry::new();
        registry.register(loaded("X", "first", false)).unwrap();
        registry.register(loaded("X", "second", false)).unwrap();

        assert_eq!(registry.count(CapabilityKind::Parameter), 1);
        assert_eq!(value_of(&registry, "X/free"), "second");
        assert_eq!(registry.plugin_count(), 2);
    }

    #[test]
    fn test_iteration_order() {
        let mut registry = Registry::new();
        registry.register(loaded("B", "1", false)).unwrap();
        registry.register(loaded("A", "1", false)).unwrap();

        let ids: Vec<_> =
            registry.iter_kind(CapabilityKind::Parameter).map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["B/free", "A/free"]);

        let names: Vec<_> = registry.plugins().map(LoadedPlugin::name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_loaded_plugin_metadata() {
        let plugin = loaded("X", "1", false);

        assert_eq!(plugin.type_name(), "test.Probe");
        assert_eq!(plugin.origin(), "host");
        assert_eq!(plugin.version(), "0.0.0");
    }
}
