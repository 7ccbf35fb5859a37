//! Agentbridge - plugin capability bridge for monitoring agents.
//!
//! Loads the plugins named in the agent configuration and answers host
//! requests, either one-shot from the command line or as a long-running
//! stdio server.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agentbridge::plugin::{DefaultAgentHost, RegistryEntry};
use agentbridge::{serve, Bridge, BridgeSettings, CapabilityKind, ConfigTree, FactoryCatalog};

/// Plugin capability bridge for monitoring agents
#[derive(Parser)]
#[command(name = "agentbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Agent configuration file
    #[arg(short, long, global = true, env = "AGENTBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every capability of the configured plugins
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only show capabilities contributed by this plugin
        #[arg(short, long)]
        plugin: Option<String>,
    },

    /// Get a parameter value
    Get {
        /// Full metric text, e.g. Disk.Free(/var)
        metric: String,

        /// Contribution ID (plugin/parameter)
        #[arg(long)]
        id: String,
    },

    /// Get list parameter values
    Values {
        /// Full metric text
        metric: String,

        /// Contribution ID (plugin/list)
        #[arg(long)]
        id: String,
    },

    /// Get table parameter rows
    Table {
        /// Full metric text
        metric: String,

        /// Contribution ID (plugin/table)
        #[arg(long)]
        id: String,
    },

    /// Execute an action
    Action {
        /// Action name as invoked by the host
        name: String,

        /// Action arguments
        args: Vec<String>,

        /// Contribution ID (plugin/action)
        #[arg(long)]
        id: String,
    },

    /// Serve host requests as JSON lines over stdin/stdout
    Serve,

    /// List the plugin types compiled into this binary
    Types,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigTree::load(cli.config.as_deref())?;
    let settings = BridgeSettings::from_tree(&config);

    // Setup logging; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    if let Some(path) = config.source() {
        tracing::debug!(config = %path.display(), "Configuration loaded");
    }

    match cli.command {
        Commands::List { format, plugin } => {
            cmd_list(config, settings, &format, plugin.as_deref())?;
        }
        Commands::Get { metric, id } => cmd_get(config, settings, &metric, &id)?,
        Commands::Values { metric, id } => cmd_values(config, settings, &metric, &id)?,
        Commands::Table { metric, id } => cmd_table(config, settings, &metric, &id)?,
        Commands::Action { name, args, id } => cmd_action(config, settings, &name, &args, &id)?,
        Commands::Serve => cmd_serve(config, settings)?,
        Commands::Types => cmd_types(),
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Load and initialise the configured plugins.
fn start_bridge(config: ConfigTree, settings: &BridgeSettings) -> Bridge {
    let host = DefaultAgentHost::shared(settings.debug_level);
    let bridge = Bridge::from_config(config, host);
    bridge.init(&bridge.config());
    bridge
}

/// Key of a capability kind in `list --format json` output.
fn json_key(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Action => "actions",
        CapabilityKind::Parameter => "parameters",
        CapabilityKind::List => "lists",
        CapabilityKind::Push => "push_parameters",
        CapabilityKind::Table => "tables",
    }
}

/// List every registered capability, optionally only those of one plugin.
fn cmd_list(
    config: ConfigTree,
    settings: BridgeSettings,
    format: &str,
    plugin: Option<&str>,
) -> Result<()> {
    let bridge = start_bridge(config, &settings);
    let registry = bridge.snapshot();
    let selected = |entry: &&RegistryEntry| plugin.is_none_or(|p| entry.id.plugin_name() == p);

    match format {
        "json" => {
            let mut json = serde_json::Map::new();
            for kind in CapabilityKind::ALL {
                let entries: Vec<_> = registry
                    .iter_kind(kind)
                    .filter(selected)
                    .map(|entry| {
                        let columns: Vec<_> = entry.columns.iter().map(|c| &c.name).collect();
                        serde_json::json!({
                            "id": entry.id,
                            "description": entry.description,
                            "type": entry.data_type.map(|t| t.code()),
                            "columns": columns,
                        })
                    })
                    .collect();
                json.insert(json_key(kind).to_string(), entries.into());
            }
            json.insert("built_at".to_string(), registry.built_at().to_rfc3339().into());
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            for kind in CapabilityKind::ALL {
                let entries: Vec<_> = registry.iter_kind(kind).filter(selected).collect();
                if entries.is_empty() {
                    continue;
                }

                println!("{}s:", kind.display_name());
                for entry in entries {
                    let mut line = format!("  {}", entry.id);
                    if let Some(data_type) = entry.data_type {
                        line.push_str(&format!(" ({data_type})"));
                    }
                    if !entry.columns.is_empty() {
                        let columns: Vec<_> = entry
                            .columns
                            .iter()
                            .map(|c| {
                                if c.instance {
                                    format!("{}*", c.name)
                                } else {
                                    c.name.clone()
                                }
                            })
                            .collect();
                        line.push_str(&format!(" [{}]", columns.join(", ")));
                    }
                    if !entry.description.is_empty() {
                        line.push_str(&format!(" - {}", entry.description));
                    }
                    println!("{line}");
                }
            }
            println!(
                "\nTotal: {} capabilities from {} plugins",
                registry.len(),
                registry.plugin_count()
            );
            println!("Registry built at {}", registry.built_at().format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    bridge.shutdown();
    Ok(())
}

/// Print a parameter value.
fn cmd_get(config: ConfigTree, settings: BridgeSettings, metric: &str, id: &str) -> Result<()> {
    let bridge = start_bridge(config, &settings);
    let result = bridge.parameter_handler(metric, id);
    bridge.shutdown();

    match result? {
        Some(value) => println!("{value}"),
        None => anyhow::bail!("Unknown parameter id '{id}'"),
    }
    Ok(())
}

/// Print list parameter values, one per line.
fn cmd_values(config: ConfigTree, settings: BridgeSettings, metric: &str, id: &str) -> Result<()> {
    let bridge = start_bridge(config, &settings);
    let result = bridge.list_handler(metric, id);
    bridge.shutdown();

    match result? {
        Some(values) => values.iter().for_each(|value| println!("{value}")),
        None => anyhow::bail!("Unknown list id '{id}'"),
    }
    Ok(())
}

/// Print table rows, tab-separated.
fn cmd_table(config: ConfigTree, settings: BridgeSettings, metric: &str, id: &str) -> Result<()> {
    let bridge = start_bridge(config, &settings);
    let result = bridge.table_handler(metric, id);
    let header: Option<Vec<String>> = bridge
        .snapshot()
        .table(id)
        .map(|entry| entry.columns.iter().map(|c| c.display_name.clone()).collect());
    bridge.shutdown();

    match (result?, header) {
        (Some(rows), Some(header)) => {
            println!("{}", header.join("\t"));
            for row in rows {
                println!("{}", row.join("\t"));
            }
        }
        _ => anyhow::bail!("Unknown table id '{id}'"),
    }
    Ok(())
}

/// Execute an action.
fn cmd_action(
    config: ConfigTree,
    settings: BridgeSettings,
    name: &str,
    args: &[String],
    id: &str,
) -> Result<()> {
    let bridge = start_bridge(config, &settings);
    let executed = bridge.action_handler(name, args, id);
    bridge.shutdown();

    if !executed {
        anyhow::bail!("Action '{name}' ({id}) failed");
    }
    println!("ok");
    Ok(())
}

/// Serve host requests until EOF, a shutdown request or Ctrl-C.
fn cmd_serve(config: ConfigTree, settings: BridgeSettings) -> Result<()> {
    let bridge = Arc::new(start_bridge(config, &settings));

    let interrupted = Arc::clone(&bridge);
    ctrlc::set_handler(move || {
        tracing::info!("Interrupted, shutting down");
        interrupted.shutdown();
        std::process::exit(0);
    })?;

    serve(&bridge, io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

/// List the compiled-in plugin types.
fn cmd_types() {
    for type_name in FactoryCatalog::with_builtins().type_names() {
        println!("{type_name}");
    }
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "agentbridge", &mut io::stdout());
}
