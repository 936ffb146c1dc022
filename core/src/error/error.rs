use thiserror::Error;

/// Raised while building the registry or loading configuration.
///
/// This is the only error class that aborts a run before collection starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("task '{task}' has unknown kind '{kind}'")]
    UnknownKind { task: String, kind: String },

    #[error("task '{task}' has unknown category '{category}'")]
    UnknownCategory { task: String, category: String },

    #[error("task '{task}' has unknown parser '{parser}'")]
    UnknownParser { task: String, parser: String },

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("task '{0}' has an empty command template")]
    EmptyCommand(String),

    #[error("task name must not be empty")]
    EmptyName,

    #[error("task '{task}' has invalid fact expression '{pattern}': {source}")]
    InvalidPattern {
        task: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid scoring policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid config value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A registry/scorer mismatch. Reaching this is a programming error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("category '{category}' references task '{task}' absent from the result store")]
    MissingResult { category: String, task: String },

    #[error("result '{0}' has no entry in the score table")]
    UnscoredResult(String),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("scoring failed: {0}")]
    Score(#[from] ScoreError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
