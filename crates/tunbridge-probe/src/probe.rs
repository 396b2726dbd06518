//! Delay Probe
//!
//! Measures HTTP round-trip latency through an engine instance. Every byte
//! goes through [`EngineHandle::dial`], never through the host network stack.
//!
//! One probe is one attempt:
//! - a fresh connection (no pooling, `Connection: close`)
//! - TLS handshake bounded by `tls_handshake_timeout_ms`
//! - the whole exchange bounded by `request_timeout_ms`
//! - latency = time from dial until response headers are in
//!
//! Only `200` and `204` count as success. Retrying is the caller's business.

use crate::error::{DelayResult, ProbeError};
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::header::{CONNECTION, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::debug;
use tunbridge_engine::{Destination, EngineError, EngineHandle};
use url::{Host, Url};

/// Low-cost endpoint that answers `204 No Content`
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com/generate_204";

/// Probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// URL used when the caller passes an empty one
    pub default_url: String,
    /// TLS handshake budget (milliseconds)
    pub tls_handshake_timeout_ms: u64,
    /// Whole-request budget (milliseconds)
    pub request_timeout_ms: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_PROBE_URL.to_string(),
            tls_handshake_timeout_ms: 6_000,
            request_timeout_ms: 12_000,
            user_agent: format!("tunbridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProbeConfig {
    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_handshake_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parsed probe URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProbeTarget {
    host: String,
    port: u16,
    /// Value for the `Host` header
    authority: String,
    /// Origin-form request target
    path: String,
    tls: bool,
}

impl ProbeTarget {
    fn parse(raw: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(raw).map_err(|e| ProbeError::InvalidUrl(format!("{raw}: {e}")))?;

        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(ProbeError::InvalidUrl(format!("unsupported scheme: {other}"))),
        };

        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(ProbeError::InvalidUrl(format!("{raw}: no host"))),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| ProbeError::InvalidUrl(format!("{raw}: no port")))?;

        let host_str = url.host_str().unwrap_or_default();
        let authority = match url.port() {
            Some(explicit) => format!("{host_str}:{explicit}"),
            None => host_str.to_string(),
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            authority,
            path,
            tls,
        })
    }
}

/// Aborts the hyper connection task when the probe returns, whatever the path
struct ConnectionDriver(JoinHandle<()>);

impl Drop for ConnectionDriver {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// HTTP latency probe
#[derive(Clone)]
pub struct DelayProbe {
    config: ProbeConfig,
    tls: TlsConnector,
}

impl DelayProbe {
    /// Create a probe trusting the bundled web PKI roots
    pub fn new(config: ProbeConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let mut tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Self::with_tls_config(config, Arc::new(tls_config))
    }

    /// Create a probe with a caller supplied TLS configuration
    pub fn with_tls_config(config: ProbeConfig, tls_config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            tls: TlsConnector::from(tls_config),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ProbeConfig::default())
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// URL actually probed for a caller input
    pub fn resolve_url<'a>(&'a self, url: &'a str) -> &'a str {
        if url.trim().is_empty() {
            &self.config.default_url
        } else {
            url
        }
    }

    /// Measure one round trip through `handle`
    pub async fn measure(&self, handle: &EngineHandle, url: &str) -> DelayResult {
        let url = self.resolve_url(url);
        let target = ProbeTarget::parse(url)?;

        if !handle.is_running() {
            return Err(ProbeError::Engine(EngineError::NotRunning));
        }

        let budget = self.config.request_timeout();
        let started = Instant::now();

        let status = match tokio::time::timeout(budget, self.round_trip(handle, &target)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!("Probe {} timed out after {:?}", url, budget);
                return Err(ProbeError::Timeout(budget));
            }
        };
        let elapsed = started.elapsed();

        debug!("Probe {} -> {} in {:?}", url, status, elapsed);

        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            Ok(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        } else {
            Err(ProbeError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            })
        }
    }

    async fn round_trip(
        &self,
        handle: &EngineHandle,
        target: &ProbeTarget,
    ) -> Result<StatusCode, ProbeError> {
        let destination = Destination::tcp(target.host.clone(), target.port);
        let stream = handle
            .dial(&destination)
            .await
            .map_err(|e| ProbeError::Dial(e.to_string()))?;

        if !target.tls {
            return self.send(stream, target).await;
        }

        let server_name = ServerName::try_from(target.host.clone())
            .map_err(|_| ProbeError::Tls(format!("invalid server name: {}", target.host)))?;

        let handshake_budget = self.config.tls_handshake_timeout();
        let handshake = self.tls.connect(server_name, stream);
        let tls_stream = tokio::time::timeout(handshake_budget, handshake)
            .await
            .map_err(|_| ProbeError::Timeout(handshake_budget))?
            .map_err(|e| ProbeError::Tls(e.to_string()))?;

        self.send(tls_stream, target).await
    }

    async fn send<S>(&self, stream: S, target: &ProbeTarget) -> Result<StatusCode, ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ProbeError::Http(e.to_string()))?;

        let _driver = ConnectionDriver(tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Probe connection closed: {}", e);
            }
        }));

        let request = Request::builder()
            .method(Method::GET)
            .uri(target.path.as_str())
            .header(HOST, target.authority.as_str())
            .header(USER_AGENT, self.config.user_agent.as_str())
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Http(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| ProbeError::Http(e.to_string()))?;

        // Body is never read; dropping it releases the connection
        Ok(response.status())
    }
}
