//! Relay error types.

use thiserror::Error;

/// Errors raised while relaying messages between the debugger and the
/// remote runtime.
#[derive(Debug, Error)]
pub enum DapError {
    /// Socket or pipe I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream did not contain a well-formed framed message.
    #[error("framing error: {0}")]
    Framing(String),

    /// A framed payload was not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The named channel has already shut down.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    /// Attaching to the remote runtime failed.
    #[error(transparent)]
    Attach(#[from] AttachError),
}

/// Broad category of an [`AttachError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachErrorKind {
    /// A value required to build the attach code or the connection target
    /// is absent or malformed.
    MissingValue,
    /// The host's module search path does not include the adapter module,
    /// so the control endpoint will never be started.
    HostNotConfigured,
    /// The host's control endpoint refused the connection or the write.
    ControlUnreachable,
    /// The remote debug socket could not be opened.
    RemoteUnreachable,
    /// A bounded connect attempt ran out of time.
    Timeout,
    /// The session already has (or is opening) a remote connection.
    AlreadyAttached,
}

impl AttachErrorKind {
    fn label(self) -> &'static str {
        match self {
            AttachErrorKind::MissingValue => "missing value",
            AttachErrorKind::HostNotConfigured => "host not configured",
            AttachErrorKind::ControlUnreachable => "control endpoint unreachable",
            AttachErrorKind::RemoteUnreachable => "remote runtime unreachable",
            AttachErrorKind::Timeout => "connect timed out",
            AttachErrorKind::AlreadyAttached => "already attached",
        }
    }

    /// Whether the failure points at a host that is not running or not
    /// set up to accept the attach code.
    pub fn needs_host_setup(self) -> bool {
        matches!(
            self,
            AttachErrorKind::HostNotConfigured
                | AttachErrorKind::ControlUnreachable
                | AttachErrorKind::Timeout
        )
    }
}

/// Failure of the attach sequence, carried to the session boundary where it
/// becomes a diagnostic for the debugger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attach failed ({}): {detail}", .kind.label())]
pub struct AttachError {
    /// What went wrong.
    pub kind: AttachErrorKind,
    /// Context for the log and the diagnostic.
    pub detail: String,
}

impl AttachError {
    /// Build an error of the given kind.
    pub fn new(kind: AttachErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for [`AttachErrorKind::MissingValue`].
    pub fn missing(detail: impl Into<String>) -> Self {
        Self::new(AttachErrorKind::MissingValue, detail)
    }
}
