mod load;
mod types;

pub use load::{
    apply_env_overrides, get_data_dir, load_default, load_from, ENV_CONCURRENCY,
    ENV_DEADLINE_SECS, ENV_OUTPUT_DIR,
};
pub use types::{AppConfig, CaptureConfig, CollectorConfig, LoggingConfig, OutputConfig};
