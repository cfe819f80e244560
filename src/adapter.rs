use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mayadap_config::{load_config, load_from_path, Config};
use mayadap_dap::run_session;
use mayadap_platform::logging::{default_log_file_path, open_log_file};
use mayadap_platform::{DefaultPaths, PlatformPaths};

/// Load configuration, start logging, and relay one debug session over
/// stdin/stdout until either side disconnects.
pub(crate) fn run_adapter(config_path: Option<PathBuf>) -> Result<()> {
    let paths = DefaultPaths::new().context("failed to detect platform paths")?;

    // An explicit config file must load; the default location falls back
    // to built-in settings so a broken file never blocks debugging.
    let (mut config, load_error) = match config_path.as_deref() {
        Some(path) => {
            let config = load_from_path(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?;
            (config, None)
        }
        None => {
            let project_dir = std::env::current_dir().ok();
            match load_config(&paths.config_dir(), project_dir.as_deref()) {
                Ok(config) => (config, None),
                Err(e) => (Config::default(), Some(e)),
            }
        }
    };
    config.runtime.resolve_paths(&paths);

    init_logging(&config, &paths);
    info!(version = env!("CARGO_PKG_VERSION"), "mayadap starting");
    if let Some(e) = load_error {
        warn!(error = %e, "config load failed, using defaults");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = runtime.block_on(run_session(tokio::io::stdin(), tokio::io::stdout(), &config));
    // The stdin reader sits on a blocking thread that may never return.
    runtime.shutdown_background();

    result.context("debug session failed")?;
    info!("mayadap exiting");
    Ok(())
}

/// Install the tracing subscriber. Logs go to the configured file and
/// never to stdout, which carries the protocol stream.
fn init_logging(config: &Config, paths: &dyn PlatformPaths) {
    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(|| default_log_file_path(paths));

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log.level.as_str()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(env_filter);

    match open_log_file(&log_path) {
        Ok(file) => builder.with_writer(std::sync::Mutex::new(file)).init(),
        Err(e) => {
            builder.with_writer(std::io::stderr).init();
            warn!(path = %log_path.display(), error = %e, "cannot open log file; logging to stderr");
        }
    }
}
