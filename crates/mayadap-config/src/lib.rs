pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{Config, ControlConfig, LogConfig, LogLevel, RemoteConfig, RuntimeConfig};
pub use error::ConfigError;
pub use load::{load_config, load_from_path, load_from_str};
