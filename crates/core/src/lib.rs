pub mod config;
pub mod error;
pub mod paths;

pub use config::{BrowserConfig, Config, TimingConfig, WaitMode};
pub use error::{Error, Result};
pub use paths::Paths;
