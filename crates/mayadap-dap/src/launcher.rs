//! Bootstraps the remote debug server through the host's control endpoint.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mayadap_config::Config;
use mayadap_platform::path_list_separator;
use tokio::io::AsyncWriteExt;

use crate::attach::{listen_host, render_attach_code, AttachConfig};
use crate::error::{AttachError, AttachErrorKind};
use crate::remote;
use crate::session::Session;

/// The host's control server reads a single buffer of this size.
pub const CONTROL_READ_LIMIT: usize = 1024;

/// Interpreters looked up on `PATH` when neither the request nor the
/// config names one, in order of preference.
const INTERPRETER_NAMES: [&str; 2] = ["python3", "python"];

/// Everything needed to start the remote runtime, resolved from config.
#[derive(Debug, Clone)]
pub struct AttachLauncher {
    control_host: String,
    control_port: u16,
    timeout: Option<Duration>,
    debugpy_path: Option<String>,
    interpreter: Option<String>,
    host_app: String,
    module_path: Option<String>,
    module_path_var: String,
}

fn display(path: Option<&Path>) -> Option<String> {
    path.map(|p| p.display().to_string())
}

impl AttachLauncher {
    pub fn from_config(config: &Config) -> Self {
        Self {
            control_host: config.control.host.clone(),
            control_port: config.control.port,
            timeout: config.remote.connect_timeout(),
            debugpy_path: display(config.runtime.debugpy_path.as_deref()),
            interpreter: config.runtime.interpreter.clone(),
            host_app: config.runtime.host_app.clone(),
            module_path: display(config.runtime.module_path.as_deref()),
            module_path_var: config.runtime.module_path_var.clone(),
        }
    }

    /// The interpreter named by the request, else the configured one,
    /// else the first of `python3`/`python` found on `PATH`.
    pub fn resolve_interpreter(&self, config: &AttachConfig) -> Result<String, AttachError> {
        self.resolve_interpreter_in(config, std::env::var_os("PATH"))
    }

    fn resolve_interpreter_in(
        &self,
        config: &AttachConfig,
        search_path: Option<OsString>,
    ) -> Result<String, AttachError> {
        if let Some(interpreter) = config.interpreter.clone().or_else(|| self.interpreter.clone()) {
            return Ok(interpreter);
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let found = INTERPRETER_NAMES
            .iter()
            .find_map(|name| which::which_in(name, search_path.as_ref(), &cwd).ok())
            .ok_or_else(|| {
                AttachError::missing(
                    "no interpreter: set arguments.interpreter or runtime.interpreter, \
                     or put python3 on PATH",
                )
            })?;
        tracing::info!(interpreter = %found.display(), "using interpreter found on PATH");
        Ok(found.display().to_string())
    }

    /// Fail when the host's module search path, as seen from this process,
    /// does not list the adapter module.
    pub fn check_host_setup(&self) -> Result<(), AttachError> {
        self.check_host_setup_with(std::env::var_os(&self.module_path_var).as_deref())
    }

    fn check_host_setup_with(&self, value: Option<&OsStr>) -> Result<(), AttachError> {
        let Some(module_path) = self.module_path.as_deref() else {
            tracing::debug!("no module path configured; skipping host setup check");
            return Ok(());
        };
        let var = &self.module_path_var;
        let Some(value) = value else {
            return Err(AttachError::new(
                AttachErrorKind::HostNotConfigured,
                format!("{var} is not set"),
            ));
        };
        if std::env::split_paths(value).any(|entry| entry == Path::new(module_path)) {
            Ok(())
        } else {
            Err(AttachError::new(
                AttachErrorKind::HostNotConfigured,
                format!("{var} does not contain {module_path}"),
            ))
        }
    }

    /// Render the code that starts the remote debug server.
    pub fn attach_code(&self, config: &AttachConfig) -> Result<String, AttachError> {
        let debugpy_path = self
            .debugpy_path
            .as_deref()
            .ok_or_else(|| AttachError::missing("runtime.debugpy_path is not set"))?;
        let interpreter = self.resolve_interpreter(config)?;
        let code = render_attach_code(config, debugpy_path, &interpreter)?;
        if code.len() > CONTROL_READ_LIMIT {
            tracing::warn!(
                bytes = code.len(),
                limit = CONTROL_READ_LIMIT,
                "attach code exceeds what the control endpoint reads at once"
            );
        }
        Ok(code)
    }

    /// Deliver the attach code, then connect to the remote debug socket
    /// and hand it to `session`.
    pub async fn attach(
        &self,
        session: &Arc<Session>,
        config: &AttachConfig,
    ) -> Result<(), AttachError> {
        self.check_host_setup()?;
        let code = self.attach_code(config)?;
        deliver_code(&self.control_host, self.control_port, &code, self.timeout).await?;

        let (host, port) = config.target();
        let stream = remote::connect(listen_host(host), port, self.timeout).await?;
        session.open_remote(stream)
    }

    /// The text shown to the user for `err`.
    pub fn remediation(&self, err: &AttachError) -> String {
        if !err.kind.needs_host_setup() {
            return err.to_string();
        }
        let app = &self.host_app;
        let module_path = self.module_path.as_deref().unwrap_or("<module path>");
        if err.kind == AttachErrorKind::HostNotConfigured {
            return format!(
                "The {var} environment variable was not found or is incomplete. \
                 Please create or modify it to contain\n\n  {module_path}{sep}\n\n\
                 then restart both {app} and the editor.\n\n({err})",
                var = self.module_path_var,
                sep = path_list_separator(),
            );
        }
        format!(
            "Could not connect to {app}.\n\n\
             Please ensure {app} is running. If this is your first time using the \
             debug adapter, ensure the {var} environment variable is set correctly \
             (ie contains {module_path}{sep}), then restart {app} and try again.\n\n\
             ({err})",
            var = self.module_path_var,
            sep = path_list_separator(),
        )
    }
}

/// Send `code` to the control endpoint: connect, write, close.
pub async fn deliver_code(
    host: &str,
    port: u16,
    code: &str,
    timeout: Option<Duration>,
) -> Result<(), AttachError> {
    let unreachable = |e: std::io::Error| {
        AttachError::new(
            AttachErrorKind::ControlUnreachable,
            format!("{host}:{port}: {e}"),
        )
    };

    let mut stream =
        remote::connect_tcp(host, port, timeout, AttachErrorKind::ControlUnreachable).await?;
    stream.write_all(code.as_bytes()).await.map_err(unreachable)?;
    stream.shutdown().await.map_err(unreachable)?;
    tracing::info!(host, port, bytes = code.len(), "attach code delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn launcher() -> AttachLauncher {
        let mut config = Config::default();
        config.runtime.debugpy_path = Some("/opt/mayadap/python".into());
        config.runtime.module_path = Some("/opt/mayadap/resources/module".into());
        AttachLauncher::from_config(&config)
    }

    fn attach_config(interpreter: Option<&str>) -> AttachConfig {
        AttachConfig {
            program_dir: "/a/b".into(),
            host: "localhost".into(),
            port: 7005,
            interpreter: interpreter.map(str::to_owned),
        }
    }

    #[test]
    fn launcher_interpreter_from_request_wins() {
        let mut l = launcher();
        l.interpreter = Some("/fallback/python".into());
        let got = l.resolve_interpreter(&attach_config(Some("/req/python"))).unwrap();
        assert_eq!(got, "/req/python");
        let got = l.resolve_interpreter(&attach_config(None)).unwrap();
        assert_eq!(got, "/fallback/python");
    }

    #[test]
    fn launcher_no_interpreter_anywhere_is_missing_value() {
        let empty = tempfile::TempDir::new().unwrap();
        let err = launcher()
            .resolve_interpreter_in(&attach_config(None), Some(empty.path().into()))
            .unwrap_err();
        assert_eq!(err.kind, AttachErrorKind::MissingValue);
    }

    #[cfg(unix)]
    fn fake_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn launcher_interpreter_falls_back_to_path_lookup() {
        let dir = tempfile::TempDir::new().unwrap();
        let python = fake_executable(dir.path(), "python");
        let got = launcher()
            .resolve_interpreter_in(&attach_config(None), Some(dir.path().into()))
            .unwrap();
        assert_eq!(PathBuf::from(got), python);

        let python3 = fake_executable(dir.path(), "python3");
        let got = launcher()
            .resolve_interpreter_in(&attach_config(None), Some(dir.path().into()))
            .unwrap();
        assert_eq!(PathBuf::from(got), python3);
    }

    #[test]
    fn launcher_host_setup_missing_variable() {
        let err = launcher().check_host_setup_with(None).unwrap_err();
        assert_eq!(err.kind, AttachErrorKind::HostNotConfigured);
        assert!(err.kind.needs_host_setup());
        assert!(err.detail.contains("MAYA_MODULE_PATH"));
    }

    #[test]
    fn launcher_host_setup_variable_without_module() {
        let value = std::env::join_paths(["/opt/other/module", "/usr/share/maya"]).unwrap();
        let err = launcher().check_host_setup_with(Some(value.as_os_str())).unwrap_err();
        assert_eq!(err.kind, AttachErrorKind::HostNotConfigured);
        let text = launcher().remediation(&err);
        assert!(text.contains("MAYA_MODULE_PATH"));
    }

    #[test]
    fn launcher_host_setup_accepts_listed_module() {
        let value =
            std::env::join_paths(["/opt/other/module", "/opt/mayadap/resources/module/"]).unwrap();
        launcher().check_host_setup_with(Some(value.as_os_str())).unwrap();
    }

    #[test]
    fn launcher_host_setup_skipped_without_module_path() {
        let mut l = launcher();
        l.module_path = None;
        l.check_host_setup_with(None).unwrap();
    }

    #[test]
    fn launcher_attach_code_contains_target() {
        let code = launcher()
            .attach_code(&attach_config(Some("/usr/bin/python3")))
            .unwrap();
        assert!(code.contains("/opt/mayadap/python"));
        assert!(code.contains("7005"));
        assert!(code.len() <= CONTROL_READ_LIMIT);
    }

    #[test]
    fn launcher_attach_code_needs_debugpy_path() {
        let mut l = launcher();
        l.debugpy_path = None;
        let err = l.attach_code(&attach_config(Some("python"))).unwrap_err();
        assert_eq!(err.kind, AttachErrorKind::MissingValue);
    }

    #[test]
    fn launcher_remediation_names_setup() {
        let err = AttachError::new(AttachErrorKind::ControlUnreachable, "refused");
        let text = launcher().remediation(&err);
        assert!(text.starts_with("Could not connect to Maya."));
        assert!(text.contains("MAYA_MODULE_PATH"));
        let expected = format!("/opt/mayadap/resources/module{}", path_list_separator());
        assert!(text.contains(&expected));
    }

    #[test]
    fn launcher_remediation_plain_for_other_errors() {
        let err = AttachError::missing("arguments.debugpy.port is 0");
        let text = launcher().remediation(&err);
        assert!(text.contains("arguments.debugpy.port is 0"));
        assert!(!text.contains("MAYA_MODULE_PATH"));
    }

    #[tokio::test]
    async fn deliver_code_writes_whole_payload_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut got = String::new();
            sock.read_to_string(&mut got).await.unwrap();
            got
        });

        deliver_code("127.0.0.1", port, "print('hi')", None).await.unwrap();
        assert_eq!(server.await.unwrap(), "print('hi')");
    }

    #[tokio::test]
    async fn deliver_code_refused_is_control_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = deliver_code("127.0.0.1", port, "x", Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AttachErrorKind::ControlUnreachable);
    }
}
