//! Core bridge types.

use serde::{Deserialize, Serialize};

/// Kind of capability a plugin can contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// Executable action.
    Action,
    /// Scalar parameter pulled by the host.
    Parameter,
    /// List parameter pulled by the host.
    List,
    /// Push parameter, values arrive out-of-band.
    Push,
    /// Table parameter pulled by the host.
    Table,
}

impl CapabilityKind {
    /// All kinds in introspection order.
    pub const ALL: [Self; 5] = [Self::Action, Self::Parameter, Self::List, Self::Push, Self::Table];

    /// Get the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Action => "Action",
            Self::Parameter => "Parameter",
            Self::List => "List",
            Self::Push => "Push Parameter",
            Self::Table => "Table",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Value type tag declared by parameters, push parameters and table columns.
///
/// The numeric codes are part of the host boundary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Free-form string.
    #[default]
    String,
    /// Floating point number.
    Float,
    /// No value.
    Null,
    /// 32-bit counter.
    Counter32,
    /// 64-bit counter.
    Counter64,
}

impl DataType {
    /// Boundary code for this type.
    pub fn code(self) -> i32 {
        match self {
            Self::Int => 0,
            Self::UInt => 1,
            Self::Int64 => 2,
            Self::UInt64 => 3,
            Self::String => 4,
            Self::Float => 5,
            Self::Null => 6,
            Self::Counter32 => 7,
            Self::Counter64 => 8,
        }
    }

}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::String => "string",
            Self::Float => "float",
            Self::Null => "null",
            Self::Counter32 => "counter32",
            Self::Counter64 => "counter64",
        };
        f.write_str(name)
    }
}

/// Registry lookup key: `pluginName/capabilityName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionId(String);

impl ContributionId {
    /// Build the ID of a capability contributed by a plugin.
    pub fn new(plugin_name: &str, capability_name: &str) -> Self {
        Self(format!("{plugin_name}/{capability_name}"))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the contributing plugin.
    pub fn plugin_name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(plugin, _)| plugin)
    }
}

impl From<&str> for ContributionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ContributionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ContributionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plugin API version provided by the host.
pub const PLUGIN_API_VERSION: &str = "1.0";

/// Archive file extension.
pub const ARCHIVE_EXTENSION: &str = "pkg";

/// Manifest attribute listing the plugin types of an archive.
pub const CLASSNAME_ATTRIBUTE: &str = "Plugin-Classname";

/// Manifest attribute naming the archive's shared library.
pub const LIBRARY_ATTRIBUTE: &str = "Plugin-Library";

/// Manifest attribute holding the library checksum.
pub const CHECKSUM_ATTRIBUTE: &str = "Plugin-Checksum";

/// Manifest attribute holding the API version the archive was built against.
pub const API_VERSION_ATTRIBUTE: &str = "Plugin-Api-Version";

/// Symbol exported by plugin libraries to register their factories.
pub const REGISTER_SYMBOL: &str = "agentbridge_register";

/// Request completed successfully.
pub const SYSINFO_RC_SUCCESS: u32 = 0;

/// Requested metric is not provided by this process.
pub const SYSINFO_RC_UNSUPPORTED: u32 = 1;

/// Metric handler failed.
pub const SYSINFO_RC_ERROR: u32 = 2;

/// Metric exists but the requested instance does not.
pub const SYSINFO_RC_NO_SUCH_INSTANCE: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_kind_display() {
        assert_eq!(CapabilityKind::Action.display_name(), "Action");
        assert_eq!(CapabilityKind::Push.display_name(), "Push Parameter");
        assert_eq!(CapabilityKind::Table.to_string(), "Table");
    }

    #[test]
    fn test_data_type_codes() {
        assert_eq!(DataType::Int.code(), 0);
        assert_eq!(DataType::String.code(), 4);
        assert_eq!(DataType::Counter64.code(), 8);
    }

    #[test]
    fn test_data_type_default() {
        assert_eq!(DataType::default(), DataType::String);
    }

    #[test]
    fn test_contribution_id() {
        let id = ContributionId::new("Jmx", "Heap.Used(*)");

        assert_eq!(id.as_str(), "Jmx/Heap.Used(*)");
        assert_eq!(id.plugin_name(), "Jmx");
    }

    #[test]
    fn test_contribution_id_without_separator() {
        let id = ContributionId::from("orphan");

        assert_eq!(id.plugin_name(), "orphan");
    }
}
