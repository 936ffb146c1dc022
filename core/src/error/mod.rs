#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;

pub use error::{CliError, ConfigError, ScoreError};
pub use executor::StoreError;
