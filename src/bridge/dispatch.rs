//! Value and action request dispatch.
//!
//! Value handlers (parameter, list, table) log a failing item and hand the
//! same error back to the caller. The action handler logs and reports
//! `false`. Unknown IDs are not errors and are not logged.

use super::Bridge;
use crate::plugin::{
    error_chain, guarded, CapabilityItem, CapabilityKind, PluginError, PluginResult,
};

impl Bridge {
    /// Get a parameter value.
    ///
    /// `param` is the full metric text as received by the host, `id` the
    /// contribution ID the host mapped it to.
    pub fn parameter_handler(&self, param: &str, id: &str) -> PluginResult<Option<String>> {
        self.value_request("parameter", CapabilityKind::Parameter, id, |item| match item {
            CapabilityItem::Parameter(parameter) => parameter.value(param),
            other => Err(mismatch(other)),
        })
    }

    /// Get list parameter values.
    pub fn list_handler(&self, param: &str, id: &str) -> PluginResult<Option<Vec<String>>> {
        self.value_request("list", CapabilityKind::List, id, |item| match item {
            CapabilityItem::List(list) => list.values(param),
            other => Err(mismatch(other)),
        })
    }

    /// Get table parameter rows.
    pub fn table_handler(&self, param: &str, id: &str) -> PluginResult<Option<Vec<Vec<String>>>> {
        let rows = self.value_request("table", CapabilityKind::Table, id, |item| match item {
            CapabilityItem::Table(table) => table.rows(param),
            other => Err(mismatch(other)),
        })?;

        if let Some(ref rows) = rows {
            self.host().debug_log(
                7,
                &format!("table handler (param={param}, id={id}) returning {} rows", rows.len()),
            );
        }

        Ok(rows)
    }

    /// Execute an action. Returns false if the action is unknown or failed.
    pub fn action_handler(&self, name: &str, args: &[String], id: &str) -> bool {
        let registry = self.snapshot();
        let Some(entry) = registry.action(id) else {
            return false;
        };

        let result = guarded(|| match &entry.item {
            CapabilityItem::Action(action) => action.execute(name, args),
            other => Err(mismatch(other)),
        });

        match result {
            Ok(executed) => executed,
            Err(e) => {
                self.log_failure("action", &e);
                false
            }
        }
    }

    fn value_request<T>(
        &self,
        handler: &str,
        kind: CapabilityKind,
        id: &str,
        call: impl FnOnce(&CapabilityItem) -> PluginResult<T>,
    ) -> PluginResult<Option<T>> {
        let registry = self.snapshot();
        let Some(entry) = registry.get(kind, id) else {
            return Ok(None);
        };

        match guarded(|| call(&entry.item)) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.log_failure(handler, &e);
                Err(e)
            }
        }
    }

    fn log_failure(&self, handler: &str, error: &PluginError) {
        self.host()
            .debug_log(6, &format!("Exception in {handler} handler: {}", error_chain(error)));
        self.host().debug_log(6, &format!("  {error:?}"));
    }
}

fn mismatch(item: &CapabilityItem) -> PluginError {
    PluginError::Unsupported(format!("{} '{}' cannot serve this request", item.kind(), item.name()))
}
