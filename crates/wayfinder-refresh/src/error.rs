//! Refresh cycle error types.

use thiserror::Error;

use wayfinder_registry::RegistryError;
use wayfinder_state::StateError;

pub type RefreshResult<T> = Result<T, RefreshError>;

/// Why a refresh cycle did not replace the cache.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("registry unreachable: {0}")]
    Network(String),

    #[error("unreadable registry response: {0}")]
    Parse(String),

    #[error("cache store error: {0}")]
    Storage(#[from] StateError),

    /// Nothing qualified while the current snapshot still has gateways.
    #[error("no gateway qualified; keeping the previous {previous} gateways")]
    PolicyUnsatisfiable { previous: usize },
}

impl From<RegistryError> for RefreshError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Network(msg) => RefreshError::Network(msg),
            RegistryError::Parse(msg) => RefreshError::Parse(msg),
        }
    }
}
