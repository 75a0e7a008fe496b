//! HTTP GET over a fresh TCP (or TLS) connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{NetError, NetResult};

/// Upper bound on a buffered response body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// A buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Time from connect start until the response head arrived.
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP/1.1 client. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    tls: Arc<rustls::ClientConfig>,
    user_agent: String,
}

impl HttpClient {
    /// Client that verifies servers against the Mozilla root store.
    pub fn new() -> NetResult<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| NetError::Tls(format!("tls protocol version error: {e}")))?
        .with_root_certificates(root_store)
        .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self::with_tls_config(Arc::new(config)))
    }

    /// Client using a pre-built `rustls` configuration.
    pub fn with_tls_config(tls: Arc<rustls::ClientConfig>) -> Self {
        Self {
            tls,
            user_agent: concat!("wayfinder/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Issue a `GET` and buffer the body, all within `timeout`.
    pub async fn get(&self, url: &str, timeout: Duration) -> NetResult<HttpResponse> {
        let target = Target::parse(url)?;
        match tokio::time::timeout(timeout, self.fetch(&target)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, ?timeout, "request timed out");
                Err(NetError::Timeout(timeout))
            }
        }
    }

    async fn fetch(&self, target: &Target) -> NetResult<HttpResponse> {
        let started = Instant::now();
        let stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|e| NetError::Connect(format!("{}:{}: {e}", target.host, target.port)))?;

        if target.tls {
            let server_name = ServerName::try_from(target.host.clone())
                .map_err(|e| NetError::Tls(format!("invalid server name {}: {e}", target.host)))?;
            let stream = TlsConnector::from(self.tls.clone())
                .connect(server_name, stream)
                .await
                .map_err(|e| NetError::Tls(e.to_string()))?;
            self.send(stream, target, started).await
        } else {
            self.send(stream, target, started).await
        }
    }

    async fn send<S>(&self, io: S, target: &Target, started: Instant) -> NetResult<HttpResponse>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
            .await
            .map_err(|e| NetError::Http(format!("handshake failed: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(target.path_and_query.as_str())
            .header("host", target.authority.as_str())
            .header("user-agent", self.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(|e| NetError::Http(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| NetError::Http(e.to_string()))?;
        let elapsed = started.elapsed();
        let status = resp.status().as_u16();

        let body = Limited::new(resp.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| NetError::Body(e.to_string()))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            body,
            elapsed,
        })
    }
}

/// Connection parameters extracted from a URL.
#[derive(Debug, PartialEq)]
struct Target {
    host: String,
    port: u16,
    tls: bool,
    authority: String,
    path_and_query: String,
}

impl Target {
    fn parse(url: &str) -> NetResult<Self> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e| NetError::InvalidUrl(format!("{url}: {e}")))?;
        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(NetError::InvalidUrl(format!("{url}: expected http or https"))),
        };
        let authority = uri
            .authority()
            .ok_or_else(|| NetError::InvalidUrl(format!("{url}: missing host")))?;
        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        let port = authority.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .filter(|pq| !pq.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
            authority: authority.as_str().to_string(),
            path_and_query,
        })
    }
}
