use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# mayadap configuration
# Uncomment and edit settings below to override defaults.

# [control]
# host = "localhost"
# port = 8890

# [remote]
# connect_timeout_secs = 30

# [runtime]
# debugpy_path = "/path/to/site-packages"
# interpreter = "/usr/bin/python3"
# host_app = "Maya"
# module_path = "/path/to/resources/module"
# module_path_var = "MAYA_MODULE_PATH"

# [log]
# level = "info"
# file = "/tmp/mayadap.log"
"#;

/// Load and merge configuration.
///
/// 1. Reads `config_dir/config.toml`, creating it with commented-out
///    defaults when missing.
/// 2. Optionally reads `.mayadap/config.toml`, searching upward from
///    `project_dir`.
/// 3. Merges `Config::default() <- global <- project` and validates.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or
/// validation failure.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }

    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!(path = %global_path.display(), "created default config");
    }

    let mut config = Config::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        config = merge_configs(&config, &global_content)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!(path = %project_path.display(), "merging project config");
        let project_content = std::fs::read_to_string(&project_path)?;
        config = merge_configs(&config, &project_content)?;
    }

    check(config)
}

/// Load a single config file given explicitly on the command line.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when `path` does not exist, otherwise
/// the same errors as [`load_from_str`].
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    check(merge_configs(&Config::default(), &content)?)
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    check(config)
}

fn check(config: Config) -> Result<Config, ConfigError> {
    validate(&config).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })?;
    Ok(config)
}

/// Walk from `start` upward looking for `.mayadap/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(".mayadap").join("config.toml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}
