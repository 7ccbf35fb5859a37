//! Configuration management for the bridge.
//!
//! The agent configuration is a TOML document queried by `/`-separated
//! paths. Section and key names match case-insensitively, and every path
//! yields zero or more string values.

use std::path::{Path, PathBuf};

/// Config path listing plugin locations.
pub const PLUGIN_PATH: &str = "/Bridge/Plugin";

/// Config path holding the maximum debug level.
pub const DEBUG_LEVEL_PATH: &str = "/Bridge/DebugLevel";

/// Config path holding the tracing filter level.
pub const LOG_LEVEL_PATH: &str = "/Logging/Level";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AGENTBRIDGE_CONFIG";

/// Local config file name.
const LOCAL_CONFIG_FILE: &str = "agentbridge.toml";

/// Hierarchical agent configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: toml::Table,
    source: Option<PathBuf>,
}

/// Values found at one config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    path: String,
    values: Vec<String>,
}

impl ConfigEntry {
    /// Path this entry was read from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All values of the entry.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of values.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Get a value by index.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

impl ConfigTree {
    /// Create an empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let root: toml::Table = toml::from_str(content)?;
        Ok(Self { root, source: None })
    }

    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. the explicit path, if given
    /// 2. the file named by `AGENTBRIDGE_CONFIG`
    /// 3. `agentbridge.toml` in current directory
    /// 4. `~/.config/agentbridge/config.toml`
    /// 5. Falls back to an empty tree
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load_from_file(Path::new(&path));
            }
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::empty())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config file {}: {e}", path.display()))?;
        let mut tree = Self::from_toml(&content)?;
        tree.source = Some(path.to_path_buf());
        Ok(tree)
    }

    /// Re-read the file this configuration was loaded from.
    ///
    /// Trees without a backing file are returned unchanged.
    pub fn reread(&self) -> anyhow::Result<Self> {
        match &self.source {
            Some(path) => Self::load_from_file(path),
            None => Ok(self.clone()),
        }
    }

    /// File this configuration was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("agentbridge"))
    }

    /// Look up the values stored at `path`.
    ///
    /// Scalars yield one value, arrays yield one value per scalar element.
    /// Sections are not entries.
    pub fn entry(&self, path: &str) -> Option<ConfigEntry> {
        let values = match self.lookup(path)? {
            toml::Value::Table(_) => return None,
            toml::Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
            scalar => vec![scalar_to_string(scalar)?],
        };

        Some(ConfigEntry { path: path.to_string(), values })
    }

    /// First value stored at `path`.
    pub fn value(&self, path: &str) -> Option<String> {
        self.entry(path).and_then(|e| e.values.into_iter().next())
    }

    /// First value stored at `path`, or `default`.
    pub fn value_or(&self, path: &str, default: &str) -> String {
        self.value(path).unwrap_or_else(|| default.to_string())
    }

    /// Boolean value at `path`; accepts `true/yes/on/1` and `false/no/off/0`.
    pub fn bool_value(&self, path: &str, default: bool) -> bool {
        match self.value(path).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "yes" | "on" | "1") => true,
            Some(v) if matches!(v.as_str(), "false" | "no" | "off" | "0") => false,
            _ => default,
        }
    }

    /// Unsigned integer value at `path`, or `default` if absent or malformed.
    pub fn u32_value(&self, path: &str, default: u32) -> u32 {
        self.value(path).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    }

    /// The section at `path` as its own tree.
    pub fn sub_tree(&self, path: &str) -> Option<Self> {
        match self.lookup(path)? {
            toml::Value::Table(table) => {
                Some(Self { root: table.clone(), source: self.source.clone() })
            }
            _ => None,
        }
    }

    /// Paths of every value entry, keys sorted within each section.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(&self.root, "", &mut paths);
        paths
    }

    fn lookup(&self, path: &str) -> Option<&toml::Value> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = find_key(&self.root, first)?;

        for segment in segments {
            match current {
                toml::Value::Table(table) => current = find_key(table, segment)?,
                _ => return None,
            }
        }

        Some(current)
    }
}

fn find_key<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    table.get(key).or_else(|| {
        table.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
    })
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn collect_paths(table: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = format!("{prefix}/{key}");
        match value {
            toml::Value::Table(child) => collect_paths(child, &path, out),
            _ => out.push(path),
        }
    }
}

/// Typed view of the bridge section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Plugin locations, type names or archive paths.
    pub plugins: Vec<String>,

    /// Maximum debug level written to the log (0-9).
    pub debug_level: u8,

    /// Tracing filter level for the binary.
    pub log_level: String,
}

impl BridgeSettings {
    /// Read the bridge settings from a configuration tree.
    pub fn from_tree(tree: &ConfigTree) -> Self {
        let plugins = tree
            .entry(PLUGIN_PATH)
            .map(|entry| {
                entry
                    .values()
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| {
                        shellexpand::full(v).map_or_else(|_| v.to_string(), |s| s.into_owned())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let debug_level = tree.u32_value(DEBUG_LEVEL_PATH, 0).min(9) as u8;
        let log_level = tree.value_or(LOG_LEVEL_PATH, "warn");

        Self { plugins, debug_level, log_level }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self { plugins: Vec::new(), debug_level: 0, log_level: "warn".to_string() }
    }
}
