//! Line-oriented JSON protocol for driving the bridge from a host process.
//!
//! Each input line is one [`Request`]; each request produces exactly one
//! [`Response`] line. Example session:
//!
//! ```text
//! > {"op":"parameter","param":"Agent.Version","id":"Agent/Version"}
//! < {"rc":0,"value":"0.3.0"}
//! > {"op":"shutdown"}
//! < {"rc":0}
//! ```

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Bridge;
use crate::plugin::{
    PluginError, PluginResult, SYSINFO_RC_ERROR, SYSINFO_RC_SUCCESS, SYSINFO_RC_UNSUPPORTED,
};

/// A host request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Get a parameter value.
    Parameter { param: String, id: String },
    /// Get list parameter values.
    List { param: String, id: String },
    /// Get table parameter rows.
    Table { param: String, id: String },
    /// Execute an action.
    Action {
        name: String,
        #[serde(default)]
        args: Vec<String>,
        id: String,
    },
    /// List actions.
    Actions,
    /// List parameters.
    Parameters,
    /// List list parameters.
    Lists,
    /// List push parameters.
    PushParameters,
    /// List tables.
    Tables,
    /// Submit a push parameter value.
    Push { name: String, value: String },
    /// Rebuild the registry from the configuration.
    Reload,
    /// Run the shutdown fan-out and stop serving.
    Shutdown,
}

/// Reply to a host request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Agent result code.
    pub rc: u32,
    /// Result value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response carrying `value`.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self { rc: SYSINFO_RC_SUCCESS, value: Some(value.into()), error: None }
    }

    /// Successful response without a value.
    pub fn done() -> Self {
        Self { rc: SYSINFO_RC_SUCCESS, value: None, error: None }
    }

    /// Failed response.
    pub fn failed(rc: u32, error: impl Into<String>) -> Self {
        Self { rc, value: None, error: Some(error.into()) }
    }

    fn from_lookup<T: Into<Value>>(id: &str, result: PluginResult<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::ok(value),
            Ok(None) => Self::failed(SYSINFO_RC_UNSUPPORTED, format!("Unknown id: {id}")),
            Err(e) => Self::from_error(&e),
        }
    }

    fn from_error(error: &PluginError) -> Self {
        Self::failed(error.result_code(), crate::plugin::error_chain(error))
    }
}

impl Bridge {
    /// Answer one request.
    pub fn handle_request(&self, request: Request) -> Response {
        match request {
            Request::Parameter { param, id } => {
                Response::from_lookup(&id, self.parameter_handler(&param, &id))
            }
            Request::List { param, id } => {
                Response::from_lookup(&id, self.list_handler(&param, &id))
            }
            Request::Table { param, id } => {
                Response::from_lookup(&id, self.table_handler(&param, &id))
            }
            Request::Action { name, args, id } => {
                Response::ok(self.action_handler(&name, &args, &id))
            }
            Request::Actions => Response::ok(self.get_actions()),
            Request::Parameters => Response::ok(self.get_parameters()),
            Request::Lists => Response::ok(self.get_lists()),
            Request::PushParameters => Response::ok(self.get_push_parameters()),
            Request::Tables => Response::ok(self.get_tables()),
            Request::Push { name, value } => {
                if self.host().push_parameter_data(&name, &value) {
                    Response::done()
                } else {
                    Response::failed(SYSINFO_RC_ERROR, format!("Push rejected for {name}"))
                }
            }
            Request::Reload => Response::ok(self.reload()),
            Request::Shutdown => {
                self.shutdown();
                Response::done()
            }
        }
    }
}

/// Serve requests from `input` until EOF or a shutdown request.
///
/// The shutdown fan-out runs before returning, including when reading a
/// request or writing a response fails.
pub fn serve(bridge: &Bridge, input: impl BufRead, output: impl Write) -> std::io::Result<()> {
    let result = serve_lines(bridge, input, output);
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Request stream failed");
    }
    bridge.shutdown();
    result
}

fn serve_lines(
    bridge: &Bridge,
    input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (response, stop) = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                tracing::debug!(request = ?request, "Serving request");
                let stop = request == Request::Shutdown;
                (bridge.handle_request(request), stop)
            }
            Err(e) => (Response::failed(SYSINFO_RC_ERROR, format!("Invalid request: {e}")), false),
        };

        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;

        if stop {
            break;
        }
    }

    Ok(())
}
