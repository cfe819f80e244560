//! Routing decisions for messages in both directions.

use std::sync::Arc;

use serde_json::Value;

use crate::attach::AttachConfig;
use crate::error::DapError;
use crate::protocol::{error_response, initialize_response, Envelope};
use crate::session::Session;

/// Inspects each message and decides whether it is answered locally,
/// rewritten, forwarded, or dropped.
#[derive(Clone)]
pub struct Router {
    session: Arc<Session>,
}

impl Router {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Handle one message from the debugger.
    pub fn on_client_message(&self, raw: &str) -> Result<(), DapError> {
        let mut message: Value = serde_json::from_str(raw)?;
        let envelope = Envelope::of(&message);
        tracing::debug!(seq = ?envelope.seq, command = envelope.command(), "client message");

        match envelope.command() {
            "initialize" => {
                // Without a seq there is nothing a remote response could
                // reference, so nothing is recorded.
                if let Some(seq) = envelope.seq {
                    self.session.processed().record(seq);
                }
                let response = initialize_response(envelope.seq.unwrap_or_default())?;
                self.session.client().send(&response)?;
                self.session.outbound().put(raw);
            }
            "attach" => {
                let seq = envelope.seq.unwrap_or_default();
                let config = match AttachConfig::from_request(&message) {
                    Ok(config) => config,
                    Err(err) => {
                        self.session
                            .client()
                            .send(&error_response(seq, "attach", &err.detail)?)?;
                        self.session.report_attach_error(&err);
                        return Ok(());
                    }
                };
                message["arguments"] = config.remote_arguments();
                self.session.spawn_attach(config);
                self.session.outbound().put(serde_json::to_string(&message)?);
            }
            _ => self.session.outbound().put(raw),
        }
        Ok(())
    }

    /// Handle one message from the remote runtime.
    pub fn on_remote_message(&self, raw: &str) -> Result<(), DapError> {
        let message: Value = serde_json::from_str(raw)?;
        let envelope = Envelope::of(&message);

        if envelope.command() == "configurationDone" {
            return self.session.client().send(raw);
        }
        if let Some(request_seq) = envelope.request_seq {
            if self.session.processed().contains(request_seq) {
                tracing::info!(
                    request_seq,
                    command = envelope.command(),
                    "suppressing remote response to a locally answered request"
                );
                return Ok(());
            }
        }
        self.session.client().send(raw)
    }
}
