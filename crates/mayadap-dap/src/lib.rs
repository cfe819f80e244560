//! mayadap-dap — Debug Adapter Protocol relay between a debugger and a
//! debugpy server running inside a host application.
//!
//! The debugger talks to this crate over a framed byte stream. Requests
//! are answered locally (`initialize`), rewritten and used to bootstrap
//! the remote runtime (`attach`), or forwarded unchanged. Traffic from the
//! remote runtime flows back the same way, minus duplicate responses to
//! requests that were already answered.

pub mod attach;
pub mod channel;
pub mod error;
pub mod launcher;
pub mod protocol;
pub mod queue;
pub mod remote;
pub mod router;
pub mod session;
pub mod transport;

// Re-export key types for convenience.
pub use attach::AttachConfig;
pub use channel::{DebuggerChannel, DebuggerSender};
pub use error::{AttachError, AttachErrorKind, DapError};
pub use launcher::AttachLauncher;
pub use queue::{outbound_queue, OutboundQueue, OutboundReceiver};
pub use router::Router;
pub use session::{run_session, Session, SessionState};
