//! DAP message shapes the relay inspects or synthesizes.
//!
//! Relayed messages stay as raw JSON; only the routing fields are read
//! from them. Messages the relay produces itself are built from the typed
//! structs below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DapError;

/// Sequence number used on messages the relay originates.
pub const RELAY_SEQ: i64 = 0;

/// The fixed reply to every `initialize` request, advertising what the
/// remote runtime supports once it is attached.
pub const INITIALIZE_RESPONSE: &str = r#"{
    "seq": 0,
    "type": "response",
    "request_seq": 1,
    "success": true,
    "command": "initialize",
    "message": "",
    "body": {
        "supportsCompletionsRequest": true,
        "supportsConditionalBreakpoints": true,
        "supportsConfigurationDoneRequest": true,
        "supportsDebuggerProperties": true,
        "supportsDelayedStackTraceLoading": true,
        "supportsEvaluateForHovers": true,
        "supportsExceptionInfoRequest": true,
        "supportsExceptionOptions": true,
        "supportsFunctionBreakpoints": true,
        "supportsHitConditionalBreakpoints": true,
        "supportsLogPoints": true,
        "supportsModulesRequest": true,
        "supportsSetExpression": true,
        "supportsSetVariable": true,
        "supportsValueFormattingOptions": true,
        "supportsTerminateDebuggee": true,
        "supportsGotoTargetsRequest": true,
        "supportsClipboardContext": true,
        "supportsStepInTargetsRequest": true,
        "exceptionBreakpointFilters": [
            {
                "filter": "raised",
                "label": "Raised Exceptions",
                "default": false,
                "description": "Break whenever any exception is raised."
            },
            {
                "filter": "uncaught",
                "label": "Uncaught Exceptions",
                "default": true,
                "description": "Break when the process is exiting due to unhandled exception."
            },
            {
                "filter": "userUnhandled",
                "label": "User Uncaught Exceptions",
                "default": false,
                "description": "Break when exception escapes into library code."
            }
        ]
    }
}"#;

/// A DAP response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number.
    pub seq: i64,
    /// Always "response".
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sequence number of the corresponding request.
    pub request_seq: i64,
    /// Whether the request was successful.
    pub success: bool,
    /// The command this response is for.
    pub command: String,
    /// Error message if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body (command-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A DAP event message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number.
    pub seq: i64,
    /// Always "event".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The event type.
    pub event: String,
    /// Event body (event-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Body of an `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEventBody {
    /// "console", "stdout", "stderr", ...
    pub category: String,
    /// The text to show.
    pub output: String,
}

/// The routing fields of a relayed message. Absent or mistyped fields
/// read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub seq: Option<i64>,
    pub request_seq: Option<i64>,
    pub command: Option<String>,
}

impl Envelope {
    /// Extract the routing fields from a decoded message.
    pub fn of(value: &Value) -> Self {
        Self {
            seq: value.get("seq").and_then(Value::as_i64),
            request_seq: value.get("request_seq").and_then(Value::as_i64),
            command: value
                .get("command")
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }

    /// The command name, or `""` when there is none.
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("")
    }
}

/// The canonical initialize response, compacted, answering `request_seq`.
pub fn initialize_response(request_seq: i64) -> Result<String, DapError> {
    let mut response: Response = serde_json::from_str(INITIALIZE_RESPONSE)?;
    response.request_seq = request_seq;
    Ok(serde_json::to_string(&response)?)
}

/// A failed response to `command`.
pub fn error_response(request_seq: i64, command: &str, message: &str) -> Result<String, DapError> {
    let response = Response {
        seq: RELAY_SEQ,
        message_type: "response".into(),
        request_seq,
        success: false,
        command: command.into(),
        message: Some(message.into()),
        body: None,
    };
    Ok(serde_json::to_string(&response)?)
}

/// An `output` event carrying `text` in the given category.
pub fn output_event(category: &str, text: &str) -> Result<String, DapError> {
    let body = OutputEventBody {
        category: category.into(),
        output: text.into(),
    };
    let event = Event {
        seq: RELAY_SEQ,
        message_type: "event".into(),
        event: "output".into(),
        body: Some(serde_json::to_value(body)?),
    };
    Ok(serde_json::to_string(&event)?)
}
