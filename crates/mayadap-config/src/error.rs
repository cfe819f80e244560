use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading, parsing,
/// or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The specified config file was not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to create the default config file.
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A config value failed validation.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// The dotted field path (e.g. `control.port`).
        field: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// An I/O error occurred while reading or writing config files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_contains_path() {
        let err = ConfigError::NotFound(PathBuf::from("/tmp/missing.toml"));
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.toml"));
        assert!(msg.contains("config file not found"));
    }

    #[test]
    fn parse_display_contains_details() {
        let err = ConfigError::Parse("expected `=`".into());
        assert_eq!(err.to_string(), "TOML parse error: expected `=`");
    }

    #[test]
    fn validation_display_contains_field_and_message() {
        let err = ConfigError::Validation {
            field: "control.port".into(),
            message: "must not be 0".into(),
        };
        assert_eq!(
            err.to_string(),
            "validation error: control.port: must not be 0"
        );
    }

    #[test]
    fn io_error_display_contains_inner() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = ConfigError::from(inner);
        assert!(err.to_string().contains("file missing"));
    }
}
