//! # Agentbridge
//!
//! Plugin capability registry and dispatch bridge for monitoring agents.
//!
//! Agentbridge loads metric-collection plugins named in the agent
//! configuration, merges their capabilities into one registry and answers
//! host requests for parameter values, lists, tables and actions by
//! contribution ID.
//!
//! ## Features
//!
//! - **Five capability kinds**: actions, parameters, list, push and table parameters
//! - **Archives**: `.pkg` manifests listing plugin types, optionally backed by a shared library
//! - **Fault isolation**: a failing or panicking plugin never takes the agent down
//! - **Atomic reload**: a new registry is built and swapped in as a whole
//!
//! ## Quick Start
//!
//! ```bash
//! # Show every capability of the configured plugins
//! agentbridge --config agent.toml list
//!
//! # Serve host requests over stdio
//! agentbridge --config agent.toml serve
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod bridge;
pub mod builtin;
pub mod core;
pub mod plugin;

// Re-export commonly used types
pub use bridge::{serve, Bridge, Request, Response};
pub use core::{BridgeSettings, ConfigEntry, ConfigTree};
pub use plugin::{
    AgentHost, CapabilityItem, CapabilityKind, ContributionId, DataType, DefaultAgentHost,
    FactoryCatalog, HostHandle, LogLevel, Plugin, PluginError, PluginLoader, PluginResult,
    Registry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "agentbridge";
