use std::path::PathBuf;
use std::time::Duration;

use mayadap_platform::PlatformPaths;
use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose; includes every relayed message body.
    Trace,
    /// Relayed messages and routing decisions.
    Debug,
    /// Lifecycle events (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The level name as used in `tracing` filter directives.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// The one-shot control endpoint inside the host application that
/// executes the attach code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Host the control server listens on.
    #[serde(default = "default_control_host")]
    pub host: String,
    /// Port the control server listens on.
    #[serde(default = "default_control_port")]
    pub port: u16,
}

fn default_control_host() -> String {
    "localhost".to_string()
}

fn default_control_port() -> u16 {
    8890
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: default_control_host(),
            port: default_control_port(),
        }
    }
}

/// Connection policy for the control endpoint and the remote debug socket.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Upper bound on each connect attempt. Unset means wait indefinitely.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl RemoteConfig {
    /// The connect timeout as a [`Duration`], if one is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Settings describing the host application and its embedded runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory containing the `debugpy` package, inserted into the
    /// remote `sys.path`. Defaults to `<data_dir>/python`.
    #[serde(default)]
    pub debugpy_path: Option<PathBuf>,
    /// Interpreter used when the attach request does not name one.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Display name of the host application.
    #[serde(default = "default_host_app")]
    pub host_app: String,
    /// Module directory the host must load on startup. Defaults to
    /// `<data_dir>/resources/module`.
    #[serde(default)]
    pub module_path: Option<PathBuf>,
    /// Environment variable the host reads its module search path from.
    #[serde(default = "default_module_path_var")]
    pub module_path_var: String,
}

fn default_host_app() -> String {
    "Maya".to_string()
}

fn default_module_path_var() -> String {
    "MAYA_MODULE_PATH".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debugpy_path: None,
            interpreter: None,
            host_app: default_host_app(),
            module_path: None,
            module_path_var: default_module_path_var(),
        }
    }
}

impl RuntimeConfig {
    /// Fill in path defaults that depend on the platform data directory.
    pub fn resolve_paths(&mut self, paths: &dyn PlatformPaths) {
        if self.debugpy_path.is_none() {
            self.debugpy_path = Some(paths.data_dir().join("python"));
        }
        if self.module_path.is_none() {
            self.module_path = Some(paths.data_dir().join("resources").join("module"));
        }
    }
}

/// Logging configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file.
    pub file: Option<PathBuf>,
}

/// Top-level adapter configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control endpoint settings.
    #[serde(default)]
    pub control: ControlConfig,
    /// Connection policy.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Host runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}
