//! Agent self-information plugin.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::core::{BridgeSettings, ConfigTree};
use crate::plugin::{
    Action, ContributionId, DataType, FnAction, FnList, FnParameter, FnTable, HostHandle,
    ListParameter, LogLevel, Parameter, Plugin, PluginLoader, PluginResult, PushItem,
    PushParameter, TableColumn, TableParameter,
};

/// Type name of the agent information plugin.
pub const AGENT_INFO_TYPE: &str = "builtin.AgentInfo";

const PLUGIN_NAME: &str = "Agent";
const HEARTBEAT: &str = "Heartbeat";

/// Reports the bridge version, uptime and configuration.
pub struct AgentInfoPlugin {
    started: Instant,
    config_paths: Vec<String>,
    locations: Vec<String>,
    host: Arc<RwLock<Option<HostHandle>>>,
}

impl AgentInfoPlugin {
    /// Create the plugin from the agent configuration.
    pub fn new(config: &ConfigTree) -> Self {
        Self {
            started: Instant::now(),
            config_paths: config.paths(),
            locations: BridgeSettings::from_tree(config).plugins,
            host: Arc::new(RwLock::new(None)),
        }
    }
}

impl Plugin for AgentInfoPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn version(&self) -> &str {
        crate::VERSION
    }

    fn init(&self, _config: &ConfigTree, host: &HostHandle) -> PluginResult<()> {
        *self.host.write() = Some(Arc::clone(host));

        let heartbeat = ContributionId::new(PLUGIN_NAME, HEARTBEAT);
        host.push_parameter_data(heartbeat.as_str(), "1");
        Ok(())
    }

    fn shutdown(&self) -> PluginResult<()> {
        self.host.write().take();
        Ok(())
    }

    fn actions(&self) -> PluginResult<Vec<Arc<dyn Action>>> {
        let host = Arc::clone(&self.host);
        let echo = FnAction::new("Echo", move |name, args| {
            if let Some(host) = host.read().as_ref() {
                host.log(LogLevel::Info, &format!("{name}: {}", args.join(" ")));
            }
            Ok(true)
        })
        .with_description("Write the action arguments to the agent log");

        Ok(vec![Arc::new(echo)])
    }

    fn parameters(&self) -> PluginResult<Vec<Arc<dyn Parameter>>> {
        let started = self.started;

        Ok(vec![
            Arc::new(
                FnParameter::new("Version", DataType::String, |_| Ok(crate::VERSION.to_string()))
                    .with_description("Bridge version"),
            ),
            Arc::new(
                FnParameter::new("Uptime", DataType::UInt64, move |_| {
                    Ok(started.elapsed().as_secs().to_string())
                })
                .with_description("Seconds since the plugin was loaded"),
            ),
        ])
    }

    fn list_parameters(&self) -> PluginResult<Vec<Arc<dyn ListParameter>>> {
        let paths = self.config_paths.clone();
        let list = FnList::new("ConfigPaths", move |_| Ok(paths.clone()))
            .with_description("Configuration entries visible to plugins");

        Ok(vec![Arc::new(list)])
    }

    fn push_parameters(&self) -> PluginResult<Vec<Arc<dyn PushParameter>>> {
        let heartbeat = PushItem::new(HEARTBEAT, DataType::Int)
            .with_description("Set to 1 when the bridge starts");
        Ok(vec![Arc::new(heartbeat)])
    }

    fn table_parameters(&self) -> PluginResult<Vec<Arc<dyn TableParameter>>> {
        let locations = self.locations.clone();
        let table = FnTable::new(
            "Plugins",
            vec![
                TableColumn::new("LOCATION", DataType::String)
                    .with_display_name("Location")
                    .instance(),
                TableColumn::new("KIND", DataType::String).with_display_name("Kind"),
            ],
            move |_| {
                Ok(locations
                    .iter()
                    .map(|location| {
                        let kind =
                            if PluginLoader::is_archive(location) { "archive" } else { "type" };
                        vec![location.clone(), kind.to_string()]
                    })
                    .collect())
            },
        )
        .with_description("Configured plugin locations");

        Ok(vec![Arc::new(table)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::DefaultAgentHost;

    const CONFIG: &str = r#"
[Bridge]
Plugin = ["builtin.AgentInfo", "/opt/agent/probes.pkg"]
"#;

    fn plugin() -> AgentInfoPlugin {
        AgentInfoPlugin::new(&ConfigTree::from_toml(CONFIG).unwrap())
    }

    #[test]
    fn test_parameters() {
        let params = plugin().parameters().unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].value("Agent.Version").unwrap(), crate::VERSION);
        assert!(params[1].value("Agent.Uptime").unwrap().parse::<u64>().is_ok());
    }

    #[test]
    fn test_config_paths() {
        let lists = plugin().list_parameters().unwrap();
        assert_eq!(lists[0].values("Agent.ConfigPaths").unwrap(), vec!["/Bridge/Plugin"]);
    }

    #[test]
    fn test_plugins_table() {
        let tables = plugin().table_parameters().unwrap();
        let rows = tables[0].rows("Agent.Plugins").unwrap();

        assert_eq!(tables[0].columns().len(), 2);
        assert!(tables[0].columns()[0].instance);
        assert_eq!(
            rows,
            vec![
                vec!["builtin.AgentInfo".to_string(), "type".to_string()],
                vec!["/opt/agent/probes.pkg".to_string(), "archive".to_string()],
            ]
        );
    }

    #[test]
    fn test_init_pushes_heartbeat() {
        let plugin = plugin();
        let host = DefaultAgentHost::shared(0);
        let handle: HostHandle = host.clone();

        plugin.init(&ConfigTree::empty(), &handle).unwrap();
        assert_eq!(host.pushed_value("Agent/Heartbeat"), Some("1".to_string()));

        let echo = &plugin.actions().unwrap()[0];
        assert!(echo.execute("Agent.Echo", &["hello".to_string()]).unwrap());

        plugin.shutdown().unwrap();
        assert!(echo.execute("Agent.Echo", &[]).unwrap());
    }
}
