//! Attach configuration: what the relay needs from an `attach` request,
//! the arguments it forwards to the remote runtime, and the code it asks
//! the host to run.

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AttachError;

/// Python run inside the host to start the debug server. Placeholders are
/// `{name}`; every one must be supplied when rendering.
pub const ATTACH_TEMPLATE: &str = r#"import sys
_debugpy_path = {debugpy_path}
if _debugpy_path not in sys.path:
    sys.path.insert(0, _debugpy_path)
import debugpy
debugpy.configure(python={interpreter})
try:
    debugpy.listen(({hostname}, {port}))
except RuntimeError as exc:
    print("debugpy already listening: " + str(exc))
"#;

const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachRequestArguments {
    program: String,
    #[serde(default)]
    interpreter: Option<String>,
    #[serde(default)]
    python_path: Option<String>,
    debugpy: DebugConnection,
}

#[derive(Debug, Deserialize)]
struct DebugConnection {
    host: String,
    port: PortValue,
}

/// Ports arrive as numbers or numeric strings depending on the client.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn to_port(&self) -> Result<u16, AttachError> {
        let port = match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Text(s) => s.trim().parse::<u16>().ok(),
        };
        port.filter(|p| *p != 0).ok_or_else(|| {
            AttachError::missing(format!("arguments.debugpy.port is not a valid port: {self:?}"))
        })
    }
}

/// The parts of an `attach` request used to reach the remote runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachConfig {
    /// Directory of the program being debugged.
    pub program_dir: String,
    /// Host the remote debug server will listen on.
    pub host: String,
    /// Port the remote debug server will listen on.
    pub port: u16,
    /// Interpreter named by the request (`interpreter`, else `pythonPath`).
    pub interpreter: Option<String>,
}

impl AttachConfig {
    /// Extract the attach configuration from a full `attach` request.
    pub fn from_request(request: &Value) -> Result<Self, AttachError> {
        let arguments = request
            .get("arguments")
            .cloned()
            .ok_or_else(|| AttachError::missing("attach request has no arguments"))?;
        let args: AttachRequestArguments = serde_json::from_value(arguments)
            .map_err(|e| AttachError::missing(format!("attach arguments: {e}")))?;

        let host = args.debugpy.host.trim().to_string();
        if host.is_empty() {
            return Err(AttachError::missing("arguments.debugpy.host is empty"));
        }

        Ok(Self {
            program_dir: program_dir(&args.program),
            host,
            port: args.debugpy.port.to_port()?,
            interpreter: args
                .interpreter
                .or(args.python_path)
                .filter(|i| !i.trim().is_empty()),
        })
    }

    /// Where the remote runtime's debug socket will be.
    pub fn target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// The `arguments` object forwarded to the remote runtime in place of
    /// the client's. Nothing else from the original arguments survives.
    pub fn remote_arguments(&self) -> Value {
        json!({
            "dir": self.program_dir,
            "host": self.host,
            "port": self.port,
            "pathMappings": [{
                "localRoot": self.program_dir,
                "remoteRoot": self.program_dir,
            }],
            "justMyCode": false,
        })
    }
}

/// Directory part of `program`, treating both `/` and `\` as separators
/// so paths from a Windows editor resolve on any host.
pub fn program_dir(program: &str) -> String {
    let is_sep = |c: char| c == '/' || c == '\\';
    let Some(idx) = program.rfind(is_sep) else {
        return String::new();
    };
    let head = &program[..=idx];
    let trimmed = head.trim_end_matches(is_sep);
    if trimmed.is_empty() {
        // Root only, e.g. "/" or "\\".
        return head.to_string();
    }
    if is_drive(trimmed) {
        // Keep "C:\" rather than the drive-relative "C:".
        return head[..trimmed.len() + 1].to_string();
    }
    trimmed.to_string()
}

fn is_drive(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Quote `s` as a Python string literal.
pub fn python_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A source template with named `{placeholder}` substitution points.
#[derive(Debug, Clone, Copy)]
pub struct CodeTemplate {
    source: &'static str,
}

impl CodeTemplate {
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Result<Vec<String>, AttachError> {
        let re = placeholder_regex()?;
        let mut names: Vec<String> = Vec::new();
        for cap in re.captures_iter(self.source) {
            let name = &cap[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Substitute every placeholder. Fails before producing any output if
    /// a placeholder has no value.
    pub fn render(&self, values: &[(&str, String)]) -> Result<String, AttachError> {
        let missing: Vec<String> = self
            .placeholders()?
            .into_iter()
            .filter(|name| !values.iter().any(|(key, _)| *key == name.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(AttachError::missing(format!(
                "attach template values not provided: {}",
                missing.join(", ")
            )));
        }

        let re = placeholder_regex()?;
        let rendered = re.replace_all(self.source, |cap: &regex::Captures<'_>| {
            values
                .iter()
                .find(|(key, _)| *key == &cap[1])
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

fn placeholder_regex() -> Result<Regex, AttachError> {
    Regex::new(PLACEHOLDER_PATTERN)
        .map_err(|e| AttachError::missing(format!("placeholder pattern: {e}")))
}

/// The address the remote debug server binds to. `localhost` is pinned to
/// the IPv4 loopback so the server and the relay agree on the family.
pub fn listen_host(host: &str) -> &str {
    if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        host
    }
}

/// Render [`ATTACH_TEMPLATE`] for `config`.
pub fn render_attach_code(
    config: &AttachConfig,
    debugpy_path: &str,
    interpreter: &str,
) -> Result<String, AttachError> {
    CodeTemplate::new(ATTACH_TEMPLATE).render(&[
        ("debugpy_path", python_literal(debugpy_path)),
        ("interpreter", python_literal(interpreter)),
        ("hostname", python_literal(listen_host(&config.host))),
        ("port", config.port.to_string()),
    ])
}
