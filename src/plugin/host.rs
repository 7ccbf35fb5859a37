//! Host services for plugins.
//!
//! This module defines the interface the agent offers to plugins and to the
//! bridge itself: leveled logging, numeric debug logging, out-of-band push
//! data and trap submission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Log level for agent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Error level.
    Error,
    /// Warning level.
    Warning,
    /// Info level.
    Info,
}

impl LogLevel {
    /// Convert to the agent's numeric level.
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Error => 0x0001,
            Self::Warning => 0x0002,
            Self::Info => 0x0004,
        }
    }

    /// Convert from the agent's numeric level.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Error),
            0x0002 => Some(Self::Warning),
            0x0004 => Some(Self::Info),
            _ => None,
        }
    }
}

/// A trap submitted by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trap {
    /// Event code.
    pub event: u32,
    /// Event name.
    pub name: String,
    /// Event arguments.
    pub args: Vec<String>,
}

/// Host interface.
///
/// Implementations must not block: every failure path of the bridge writes
/// through this trait.
pub trait AgentHost: Send + Sync {
    /// Log a message.
    fn log(&self, level: LogLevel, message: &str);

    /// Log a debug message at a numeric verbosity level (1-9).
    fn debug_log(&self, level: u8, message: &str);

    /// Submit a value for a push parameter.
    fn push_parameter_data(&self, name: &str, value: &str) -> bool;

    /// Submit a trap.
    fn send_trap(&self, event: u32, name: &str, args: &[String]);
}

/// Shared handle to the host.
pub type HostHandle = Arc<dyn AgentHost>;

/// Default host: writes to `tracing` and keeps the latest pushed values.
pub struct DefaultAgentHost {
    debug_level: AtomicU8,
    pushed: Mutex<HashMap<String, String>>,
    traps: Mutex<Vec<Trap>>,
}

impl DefaultAgentHost {
    /// Create a new host writing debug messages up to `debug_level`.
    pub fn new(debug_level: u8) -> Self {
        Self {
            debug_level: AtomicU8::new(debug_level),
            pushed: Mutex::new(HashMap::new()),
            traps: Mutex::new(Vec::new()),
        }
    }

    /// Create a shared handle.
    pub fn shared(debug_level: u8) -> Arc<Self> {
        Arc::new(Self::new(debug_level))
    }

    /// Current maximum debug level.
    pub fn debug_level(&self) -> u8 {
        self.debug_level.load(Ordering::Relaxed)
    }

    /// Change the maximum debug level.
    pub fn set_debug_level(&self, level: u8) {
        self.debug_level.store(level, Ordering::Relaxed);
    }

    /// Latest value pushed for `name`.
    pub fn pushed_value(&self, name: &str) -> Option<String> {
        self.pushed.lock().get(name).cloned()
    }

    /// Take the traps submitted so far.
    pub fn take_traps(&self) -> Vec<Trap> {
        std::mem::take(&mut *self.traps.lock())
    }
}

impl Default for DefaultAgentHost {
    fn default() -> Self {
        Self::new(0)
    }
}

impl AgentHost for DefaultAgentHost {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
        }
    }

    fn debug_log(&self, level: u8, message: &str) {
        if level > self.debug_level() {
            return;
        }

        if level >= 7 {
            tracing::trace!(debug_level = level, "{}", message);
        } else {
            tracing::debug!(debug_level = level, "{}", message);
        }
    }

    fn push_parameter_data(&self, name: &str, value: &str) -> bool {
        tracing::debug!(parameter = name, value = value, "Push data received");
        self.pushed.lock().insert(name.to_string(), value.to_string());
        true
    }

    fn send_trap(&self, event: u32, name: &str, args: &[String]) {
        tracing::info!(event = event, name = name, args = ?args, "Trap submitted");
        self.traps.lock().push(Trap { event, name: name.to_string(), args: args.to_vec() });
    }
}

/// Extract an argument from a full parameter name.
///
/// For `Process.Count(sshd, 2)` index 1 is `sshd`. Indexes are 1-based.
/// Returns an empty string when the argument is missing and `None` when
/// the parameter text is malformed. Double quotes protect commas and
/// brackets; `""` inside quotes is a literal quote.
pub fn parameter_arg(param: &str, index: usize) -> Option<String> {
    if index == 0 {
        return None;
    }

    let Some(open) = param.find('(') else {
        return Some(String::new());
    };

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut closed = false;
    let mut chars = param[open + 1..].chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push_str("\"\"");
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes && depth == 0 => args.push(std::mem::take(&mut current)),
            '(' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_quotes && depth == 0 => {
                closed = true;
                break;
            }
            ')' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            _ => current.push(c),
        }
    }

    if !closed {
        return None;
    }
    args.push(current);

    Some(args.get(index - 1).map(|raw| unquote(raw.trim())).unwrap_or_default())
}

fn unquote(arg: &str) -> String {
    if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        arg[1..arg.len() - 1].replace("\"\"", "\"")
    } else {
        arg.to_string()
    }
}
