//! Registry reader error types.

use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry could not be reached or answered with an error status.
    #[error("registry unreachable: {0}")]
    Network(String),

    /// The response as a whole could not be read as an entry set.
    #[error("unreadable registry response: {0}")]
    Parse(String),
}

impl From<wayfinder_net::NetError> for RegistryError {
    fn from(e: wayfinder_net::NetError) -> Self {
        RegistryError::Network(e.to_string())
    }
}
