//! Capability items contributed by plugins.
//!
//! Every item has a name and a description plus a kind-specific accessor.
//! Plugin authors either implement the traits directly or use the
//! closure-backed items (`FnParameter`, `FnList`, ...) with builder methods.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{CapabilityKind, DataType, PluginResult};

/// Common contract of all capability items.
pub trait Contribution: Send + Sync {
    /// Item name, unique within its plugin and kind.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }
}

/// Executable action.
pub trait Action: Contribution {
    /// Execute the action. `action` is the name the host used to invoke it.
    fn execute(&self, action: &str, args: &[String]) -> PluginResult<bool>;
}

/// Scalar parameter.
pub trait Parameter: Contribution {
    /// Declared value type.
    fn data_type(&self) -> DataType;

    /// Get the value for the full parameter name, e.g. `Disk.Free(/var)`.
    fn value(&self, param: &str) -> PluginResult<String>;
}

/// List parameter.
pub trait ListParameter: Contribution {
    /// Get the values for the full parameter name.
    fn values(&self, param: &str) -> PluginResult<Vec<String>>;
}

/// Push parameter. Values are submitted through the host, not pulled.
pub trait PushParameter: Contribution {
    /// Declared value type.
    fn data_type(&self) -> DataType;
}

/// Table parameter.
pub trait TableParameter: Contribution {
    /// Column definitions, in row order.
    fn columns(&self) -> &[TableColumn];

    /// Get the rows for the full parameter name.
    fn rows(&self, param: &str) -> PluginResult<Vec<Vec<String>>>;
}

/// Column definition of a table parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Value type.
    pub data_type: DataType,
    /// Whether the column is part of the row instance key.
    pub instance: bool,
}

impl TableColumn {
    /// Create a column whose display name equals its name.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self { display_name: name.clone(), name, data_type, instance: false }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Mark the column as an instance column.
    pub fn instance(mut self) -> Self {
        self.instance = true;
        self
    }
}

/// A capability item of any kind.
#[derive(Clone)]
pub enum CapabilityItem {
    /// Action.
    Action(Arc<dyn Action>),
    /// Scalar parameter.
    Parameter(Arc<dyn Parameter>),
    /// List parameter.
    List(Arc<dyn ListParameter>),
    /// Push parameter.
    Push(Arc<dyn PushParameter>),
    /// Table parameter.
    Table(Arc<dyn TableParameter>),
}

impl CapabilityItem {
    /// Kind of this item.
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Action(_) => CapabilityKind::Action,
            Self::Parameter(_) => CapabilityKind::Parameter,
            Self::List(_) => CapabilityKind::List,
            Self::Push(_) => CapabilityKind::Push,
            Self::Table(_) => CapabilityKind::Table,
        }
    }

    /// Item name.
    pub fn name(&self) -> &str {
        match self {
            Self::Action(item) => item.name(),
            Self::Parameter(item) => item.name(),
            Self::List(item) => item.name(),
            Self::Push(item) => item.name(),
            Self::Table(item) => item.name(),
        }
    }

    /// Item description.
    pub fn description(&self) -> &str {
        match self {
            Self::Action(item) => item.description(),
            Self::Parameter(item) => item.description(),
            Self::List(item) => item.description(),
            Self::Push(item) => item.description(),
            Self::Table(item) => item.description(),
        }
    }

    /// Declared value type, for parameters and push parameters.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Parameter(item) => Some(item.data_type()),
            Self::Push(item) => Some(item.data_type()),
            _ => None,
        }
    }

    /// Column definitions, for tables.
    pub fn columns(&self) -> &[TableColumn] {
        match self {
            Self::Table(item) => item.columns(),
            _ => &[],
        }
    }
}

impl std::fmt::Debug for CapabilityItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityItem")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

type ValueFn = dyn Fn(&str) -> PluginResult<String> + Send + Sync;
type ValuesFn = dyn Fn(&str) -> PluginResult<Vec<String>> + Send + Sync;
type RowsFn = dyn Fn(&str) -> PluginResult<Vec<Vec<String>>> + Send + Sync;
type ExecuteFn = dyn Fn(&str, &[String]) -> PluginResult<bool> + Send + Sync;

/// Parameter backed by a closure.
pub struct FnParameter {
    name: String,
    description: String,
    data_type: DataType,
    handler: Box<ValueFn>,
}

impl FnParameter {
    /// Create a new parameter.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        handler: impl Fn(&str) -> PluginResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data_type,
            handler: Box::new(handler),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Contribution for FnParameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Parameter for FnParameter {
    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn value(&self, param: &str) -> PluginResult<String> {
        (self.handler)(param)
    }
}

/// List parameter backed by a closure.
pub struct FnList {
    name: String,
    description: String,
    handler: Box<ValuesFn>,
}

impl FnList {
    /// Create a new list parameter.
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&str) -> PluginResult<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), description: String::new(), handler: Box::new(handler) }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Contribution for FnList {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl ListParameter for FnList {
    fn values(&self, param: &str) -> PluginResult<Vec<String>> {
        (self.handler)(param)
    }
}

/// Table parameter backed by a closure.
pub struct FnTable {
    name: String,
    description: String,
    columns: Vec<TableColumn>,
    handler: Box<RowsFn>,
}

impl FnTable {
    /// Create a new table parameter.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<TableColumn>,
        handler: impl Fn(&str) -> PluginResult<Vec<Vec<String>>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), description: String::new(), columns, handler: Box::new(handler) }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Contribution for FnTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl TableParameter for FnTable {
    fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    fn rows(&self, param: &str) -> PluginResult<Vec<Vec<String>>> {
        (self.handler)(param)
    }
}

/// Action backed by a closure.
pub struct FnAction {
    name: String,
    description: String,
    handler: Box<ExecuteFn>,
}

impl FnAction {
    /// Create a new action.
    pub fn new(
        name: impl Into<String>,
        handler: impl Fn(&str, &[String]) -> PluginResult<bool> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), description: String::new(), handler: Box::new(handler) }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Contribution for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Action for FnAction {
    fn execute(&self, action: &str, args: &[String]) -> PluginResult<bool> {
        (self.handler)(action, args)
    }
}

/// Declared push parameter.
#[derive(Debug, Clone)]
pub struct PushItem {
    name: String,
    description: String,
    data_type: DataType,
}

impl PushItem {
    /// Declare a push parameter.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), description: String::new(), data_type }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Contribution for PushItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl PushParameter for PushItem {
    fn data_type(&self) -> DataType {
        self.data_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginError;

    #[test]
    fn test_fn_parameter() {
        let param = FnParameter::new("Disk.Free(*)", DataType::UInt64, |p| Ok(format!("{p}=42")))
            .with_description("Free disk space");

        assert_eq!(param.name(), "Disk.Free(*)");
        assert_eq!(param.description(), "Free disk space");
        assert_eq!(param.data_type(), DataType::UInt64);
        assert_eq!(param.value("Disk.Free(/)").unwrap(), "Disk.Free(/)=42");
    }

    #[test]
    fn test_fn_list_error() {
        let list = FnList::new("Net.Interfaces", |_| Err(PluginError::handler("no netlink")));

        assert!(matches!(list.values("Net.Interfaces"), Err(PluginError::Handler(_))));
        assert_eq!(list.description(), "");
    }

    #[test]
    fn test_table_column_builder() {
        let column = TableColumn::new("IFNAME", DataType::String)
            .with_display_name("Interface")
            .instance();

        assert_eq!(column.name, "IFNAME");
        assert_eq!(column.display_name, "Interface");
        assert!(column.instance);

        let plain = TableColumn::new("RX", DataType::Counter64);
        assert_eq!(plain.display_name, "RX");
        assert!(!plain.instance);
    }

    #[test]
    fn test_capability_item_accessors() {
        let table: Arc<dyn TableParameter> = Arc::new(FnTable::new(
            "Net.Stats",
            vec![TableColumn::new("IFNAME", DataType::String).instance()],
            |_| Ok(vec![vec!["eth0".to_string()]]),
        ));
        let item = CapabilityItem::Table(table);

        assert_eq!(item.kind(), CapabilityKind::Table);
        assert_eq!(item.name(), "Net.Stats");
        assert_eq!(item.data_type(), None);
        assert_eq!(item.columns().len(), 1);

        let push = CapabilityItem::Push(Arc::new(PushItem::new("Queue.Depth", DataType::Int)));
        assert_eq!(push.data_type(), Some(DataType::Int));
        assert!(push.columns().is_empty());
    }

    #[test]
    fn test_fn_action() {
        let action = FnAction::new("Service.Restart", |name, args| {
            Ok(name == "Service.Restart" && args.len() == 1)
        });

        assert!(action.execute("Service.Restart", &["nginx".to_string()]).unwrap());
        assert!(!action.execute("Service.Restart", &[]).unwrap());
    }
}
