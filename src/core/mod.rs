//! Core types shared by the bridge and its plugins.
//!
//! This module holds the agent configuration tree consumed by plugin
//! factories, lifecycle hooks and the loader.

mod config;

pub use config::{
    BridgeSettings, ConfigEntry, ConfigTree, CONFIG_ENV_VAR, DEBUG_LEVEL_PATH, LOG_LEVEL_PATH,
    PLUGIN_PATH,
};
