//! Plugin system for the agent bridge.
//!
//! Plugins contribute capability items of five kinds (actions, parameters,
//! list parameters, push parameters and table parameters). They are
//! constructed from the agent configuration by named factories and merged
//! into a [`Registry`] keyed by contribution ID (`pluginName/itemName`).
//!
//! # Locations
//!
//! Each configured location is either a type name resolved in the host
//! [`FactoryCatalog`] or the path of a `.pkg` archive:
//!
//! ```toml
//! [Bridge]
//! Plugin = ["builtin.AgentInfo", "/opt/agent/plugins/probes.pkg"]
//! ```

mod capability;
mod catalog;
mod error;
mod host;
mod loader;
mod manifest;
#[cfg(feature = "native-plugins")]
mod native;
mod registry;
mod runtime;
mod types;

pub use capability::{
    Action, CapabilityItem, Contribution, FnAction, FnList, FnParameter, FnTable, ListParameter,
    Parameter, PushItem, PushParameter, TableColumn, TableParameter,
};
pub use catalog::{FactoryCatalog, PluginConstructor, PluginFactory, ResolutionScope};
pub use error::{PluginError, PluginResult};
pub use host::{parameter_arg, AgentHost, DefaultAgentHost, HostHandle, LogLevel, Trap};
pub use loader::PluginLoader;
pub use manifest::{sha256_hex, ArchiveManifest};
#[cfg(feature = "native-plugins")]
pub use native::NativeLibrary;
pub use registry::{LoadedPlugin, Registry, RegistryEntry};
pub use runtime::{error_chain, guarded, Plugin};
pub use types::{
    CapabilityKind, ContributionId, DataType, API_VERSION_ATTRIBUTE, ARCHIVE_EXTENSION,
    CHECKSUM_ATTRIBUTE, CLASSNAME_ATTRIBUTE, LIBRARY_ATTRIBUTE, PLUGIN_API_VERSION,
    REGISTER_SYMBOL, SYSINFO_RC_ERROR, SYSINFO_RC_NO_SUCH_INSTANCE, SYSINFO_RC_SUCCESS,
    SYSINFO_RC_UNSUPPORTED,
};
