//! Plugin contract and fault isolation.
//!
//! Every call from the bridge into plugin code goes through [`guarded`], so a
//! panicking plugin surfaces as a [`PluginError::Panicked`] value instead of
//! unwinding into the host.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::{
    Action, HostHandle, ListParameter, Parameter, PluginError, PluginResult, PushParameter,
    TableParameter,
};
use crate::core::ConfigTree;

/// A loaded metric-collection extension.
///
/// Plugins are constructed once from the agent configuration and are
/// read-only afterwards; use interior mutability for state set up in `init`.
pub trait Plugin: Send + Sync {
    /// Plugin name. Used as the namespace of every contribution ID.
    fn name(&self) -> &str;

    /// Plugin version.
    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Called once after loading, in registration order.
    fn init(&self, _config: &ConfigTree, _host: &HostHandle) -> PluginResult<()> {
        Ok(())
    }

    /// Called at agent shutdown.
    fn shutdown(&self) -> PluginResult<()> {
        Ok(())
    }

    /// Actions provided by this plugin.
    fn actions(&self) -> PluginResult<Vec<Arc<dyn Action>>> {
        Ok(Vec::new())
    }

    /// Parameters provided by this plugin.
    fn parameters(&self) -> PluginResult<Vec<Arc<dyn Parameter>>> {
        Ok(Vec::new())
    }

    /// List parameters provided by this plugin.
    fn list_parameters(&self) -> PluginResult<Vec<Arc<dyn ListParameter>>> {
        Ok(Vec::new())
    }

    /// Push parameters provided by this plugin.
    fn push_parameters(&self) -> PluginResult<Vec<Arc<dyn PushParameter>>> {
        Ok(Vec::new())
    }

    /// Table parameters provided by this plugin.
    fn table_parameters(&self) -> PluginResult<Vec<Arc<dyn TableParameter>>> {
        Ok(Vec::new())
    }
}

/// Run plugin code, turning a panic into an error.
pub fn guarded<T>(f: impl FnOnce() -> PluginResult<T>) -> PluginResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Render an error with its source chain on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalPlugin;

    impl Plugin for MinimalPlugin {
        fn name(&self) -> &str {
            "Minimal"
        }
    }

    #[test]
    fn test_default_hooks() {
        let plugin = MinimalPlugin;
        let host: HostHandle = Arc::new(crate::plugin::DefaultAgentHost::default());

        assert_eq!(plugin.version(), "0.0.0");
        assert!(plugin.init(&ConfigTree::empty(), &host).is_ok());
        assert!(plugin.shutdown().is_ok());
        assert!(plugin.actions().unwrap().is_empty());
        assert!(plugin.parameters().unwrap().is_empty());
        assert!(plugin.list_parameters().unwrap().is_empty());
        assert!(plugin.push_parameters().unwrap().is_empty());
        assert!(plugin.table_parameters().unwrap().is_empty());
    }

    #[test]
    fn test_guarded_passes_results_through() {
        assert_eq!(guarded(|| Ok(7)).unwrap(), 7);

        let err = guarded::<()>(|| Err(PluginError::handler("bad"))).unwrap_err();
        assert!(matches!(err, PluginError::Handler(ref m) if m == "bad"));
    }

    #[test]
    fn test_guarded_catches_panics() {
        let err = guarded::<()>(|| panic!("collector exploded")).unwrap_err();
        assert!(matches!(err, PluginError::Panicked(ref m) if m == "collector exploded"));

        let code = 42;
        let err = guarded::<()>(|| panic!("code {code}")).unwrap_err();
        assert!(matches!(err, PluginError::Panicked(ref m) if m == "code 42"));
    }

    #[test]
    fn test_error_chain() {
        let err = PluginError::Construction {
            type_name: "pkg.B".to_string(),
            source: Box::new(PluginError::handler("refused")),
        };

        assert_eq!(
            error_chain(&err),
            "Failed to construct plugin 'pkg.B': caused by: Handler failed: refused"
        );
    }
}
