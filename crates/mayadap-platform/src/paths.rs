use std::path::PathBuf;

use crate::error::PlatformError;

/// Standard directory locations used by the adapter.
pub trait PlatformPaths: Send + Sync {
    /// Returns the configuration directory (`~/.config/mayadap`).
    fn config_dir(&self) -> PathBuf;
    /// Returns the data directory (`~/.local/share/mayadap`).
    fn data_dir(&self) -> PathBuf;
    /// Returns the log directory (`<data_dir>/logs`).
    fn log_dir(&self) -> PathBuf;
}

/// Default implementation of [`PlatformPaths`] rooted at the user's home
/// directory.
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// Creates a new `DefaultPaths` instance, resolving the home directory.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .ok_or_else(|| PlatformError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Creates a `DefaultPaths` rooted at an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("mayadap")
    }

    fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("mayadap")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Separator used between entries of a search-path environment variable.
pub fn path_list_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}
