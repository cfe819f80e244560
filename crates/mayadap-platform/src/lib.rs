//! mayadap-platform — filesystem locations and logging helpers.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::PlatformError;
pub use paths::{path_list_separator, DefaultPaths, PlatformPaths};
