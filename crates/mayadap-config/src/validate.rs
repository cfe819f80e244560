use crate::config::Config;
use crate::error::ConfigError;

/// Validate a [`Config`], returning every violation found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.control.host.trim().is_empty() {
        errors.push(invalid("control.host", "must not be empty".to_string()));
    }

    if config.control.port == 0 {
        errors.push(invalid("control.port", "must not be 0".to_string()));
    }

    if let Some(secs) = config.remote.connect_timeout_secs {
        if secs == 0 {
            errors.push(invalid(
                "remote.connect_timeout_secs",
                "must be \u{2265} 1 when set; omit it to wait indefinitely".to_string(),
            ));
        }
    }

    if config.runtime.host_app.trim().is_empty() {
        errors.push(invalid("runtime.host_app", "must not be empty".to_string()));
    }

    let var = &config.runtime.module_path_var;
    if var.is_empty() || var.contains(['=', '\0']) {
        errors.push(invalid(
            "runtime.module_path_var",
            format!("not a valid environment variable name: {var:?}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message,
    }
}
