//! Plugins compiled into the agent.

mod agent_info;

pub use agent_info::{AgentInfoPlugin, AGENT_INFO_TYPE};

use crate::plugin::FactoryCatalog;

/// Register every built-in plugin type.
pub fn register(catalog: &mut FactoryCatalog) {
    catalog.register_fn(AGENT_INFO_TYPE, |config| Ok(Box::new(AgentInfoPlugin::new(config))));
}
