use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

pub const ENV_CONCURRENCY: &str = "WIFIDIAG_CONCURRENCY";
pub const ENV_DEADLINE_SECS: &str = "WIFIDIAG_DEADLINE_SECS";
pub const ENV_OUTPUT_DIR: &str = "WIFIDIAG_OUTPUT_DIR";

const LOCAL_CONFIG: &str = "wifidiag.toml";

/// Per-user data directory: ~/.wifidiag
pub fn get_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wifidiag"))
}

/// Load configuration from the first source that exists.
///
/// Priority: `explicit` path, `~/.wifidiag/config.toml`, `./wifidiag.toml`,
/// built-in defaults. Environment overrides are applied on top and the
/// result is validated.
pub fn load_default(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut cfg = match explicit {
        Some(path) => load_from(path)?,
        None => {
            let user_config = get_data_dir().map(|d| d.join("config.toml"));
            match user_config.filter(|p| p.exists()) {
                Some(path) => load_from(&path)?,
                None if Path::new(LOCAL_CONFIG).exists() => load_from(Path::new(LOCAL_CONFIG))?,
                None => {
                    tracing::debug!("no config file found, using built-in defaults");
                    AppConfig::default()
                }
            }
        }
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    expand_paths(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), tasks = cfg.tasks.len(), "config loaded");
    Ok(cfg)
}

/// Apply `WIFIDIAG_*` overrides read through `lookup`. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_CONCURRENCY) {
        let n = v.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
            field: ENV_CONCURRENCY,
            value: v.clone(),
        })?;
        cfg.collector.concurrency = Some(n);
    }
    if let Some(v) = get(ENV_DEADLINE_SECS) {
        let secs = v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            field: ENV_DEADLINE_SECS,
            value: v.clone(),
        })?;
        cfg.collector.global_deadline_secs = secs;
    }
    if let Some(v) = get(ENV_OUTPUT_DIR) {
        cfg.output.folder = v;
    }
    Ok(())
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

fn expand_paths(cfg: &mut AppConfig) {
    cfg.output.folder = expand(&cfg.output.folder);
    if let Some(dir) = cfg.logging.directory.as_mut() {
        *dir = expand(dir);
    }
}
