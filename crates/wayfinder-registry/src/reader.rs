//! Registry reader — one query per call, no internal retry.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use wayfinder_core::{BoxFuture, GatewayRecord};
use wayfinder_net::HttpClient;

use crate::error::{RegistryError, RegistryResult};
use crate::parse::parse_entries;

/// The decentralized registry collaborator: returns the raw entry set.
pub trait RegistrySource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, RegistryResult<Vec<u8>>>;
}

/// Reads the registry from an HTTP endpoint.
pub struct HttpRegistrySource {
    client: HttpClient,
    url: String,
    timeout: Duration,
}

impl HttpRegistrySource {
    pub fn new(client: HttpClient, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

impl RegistrySource for HttpRegistrySource {
    fn fetch(&self) -> BoxFuture<'_, RegistryResult<Vec<u8>>> {
        Box::pin(async move {
            let resp = self.client.get(&self.url, self.timeout).await?;
            if !resp.is_success() {
                return Err(RegistryError::Network(format!(
                    "{} returned status {}",
                    self.url, resp.status
                )));
            }
            debug!(url = %self.url, bytes = resp.body.len(), "registry response received");
            Ok(resp.body.to_vec())
        })
    }
}

/// Validated candidates from one registry query.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub candidates: Vec<GatewayRecord>,
    /// Hex SHA-256 of the raw response.
    pub source_hash: String,
}

/// Turns the registry collaborator's raw response into typed candidates.
#[derive(Clone)]
pub struct RegistryReader {
    source: Arc<dyn RegistrySource>,
}

impl RegistryReader {
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        Self { source }
    }

    /// Fetch and validate the current candidate set.
    pub async fn fetch_candidates(&self) -> RegistryResult<RegistrySnapshot> {
        let raw = self.source.fetch().await?;
        let source_hash = hex::encode(Sha256::digest(&raw));
        let candidates = parse_entries(&raw)?;

        info!(
            candidates = candidates.len(),
            source_hash = %&source_hash[..12],
            "registry candidates fetched"
        );
        Ok(RegistrySnapshot {
            candidates,
            source_hash,
        })
    }
}
