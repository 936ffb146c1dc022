use thiserror::Error;

/// Insert-only violations of the result store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("result for task '{0}' already recorded")]
    DuplicateResult(String),
}
