//! Probe transport — one health request against one gateway.

use std::time::Duration;

use tracing::debug;

use wayfinder_core::{BoxFuture, FailureKind, GatewayId};
use wayfinder_net::{HttpClient, NetError};

/// The network transport collaborator used by the prober.
///
/// Returns the observed latency on a healthy answer, or why the gateway
/// does not count as healthy.
pub trait ProbeTransport: Send + Sync {
    fn probe<'a>(
        &'a self,
        gateway: &'a GatewayId,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Duration, FailureKind>>;
}

/// Probes `GET {gateway}{path}`; any 2xx counts as healthy.
pub struct HttpProbeTransport {
    client: HttpClient,
    path: String,
}

impl HttpProbeTransport {
    pub fn new(client: HttpClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

impl ProbeTransport for HttpProbeTransport {
    fn probe<'a>(
        &'a self,
        gateway: &'a GatewayId,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Duration, FailureKind>> {
        Box::pin(async move {
            let url = format!("{}{}", gateway.base_url(), self.path);
            match self.client.get(&url, timeout).await {
                Ok(resp) if resp.is_success() => Ok(resp.elapsed),
                Ok(resp) => {
                    debug!(status = resp.status, %url, "health probe non-2xx");
                    Err(FailureKind::BadStatus(resp.status))
                }
                Err(NetError::Timeout(_)) => {
                    debug!(%url, "health probe timed out");
                    Err(FailureKind::Timeout)
                }
                Err(e) => {
                    debug!(error = %e, %url, "health probe failed");
                    Err(FailureKind::Network)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wayfinder_core::Protocol;

    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        port
    }

    fn transport() -> HttpProbeTransport {
        HttpProbeTransport::new(HttpClient::new().unwrap(), "/ar-io/healthcheck")
    }

    #[tokio::test]
    async fn healthy_gateway_reports_latency() {
        let port = serve_once("HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok").await;
        let id = GatewayId::new("127.0.0.1", port, Protocol::Http);

        let latency = transport().probe(&id, Duration::from_secs(2)).await.unwrap();
        assert!(latency < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn error_status_is_bad_status() {
        let port = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let id = GatewayId::new("127.0.0.1", port, Protocol::Http);

        let err = transport().probe(&id, Duration::from_secs(2)).await.unwrap_err();
        assert_eq!(err, FailureKind::BadStatus(500));
    }

    #[tokio::test]
    async fn closed_port_is_network_failure() {
        let id = GatewayId::new("127.0.0.1", 1, Protocol::Http);
        let err = transport()
            .probe(&id, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert_eq!(err, FailureKind::Network);
    }
}
