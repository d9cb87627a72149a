//! HTTP access to individual replicas.
//!
//! Requests are addressed to the logical service hostname with DNS for that
//! name pinned to the replica IP. SNI and certificate validation therefore use
//! the service name while the connection lands on one specific backend.

use crate::config::{ProbeConfig, WellKnownConfig};
use crate::error::{Context, Result};
use crate::readiness::ReplicaAddress;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Replicas whose clients are kept; the oldest is dropped beyond this.
const MAX_CACHED_CLIENTS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scheme {
    Https,
    Http,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

#[derive(Debug)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        Self::new(error_chain(&err))
    }
}

/// One GET against one replica.
#[async_trait]
pub trait WellKnownTransport: Send + Sync {
    /// URL used for `replica`, as shown in diagnostics.
    fn url_for(&self, replica: &ReplicaAddress, path: &str) -> String;

    async fn get(
        &self,
        replica: &ReplicaAddress,
        path: &str,
    ) -> std::result::Result<ProbeResponse, TransportError>;
}

/// reqwest/rustls transport trusting only the supplied CA bundle.
///
/// Each replica gets its own client since the DNS pin is fixed at build time.
/// Clients are reused across ticks.
pub struct TlsTransport {
    server_name: String,
    scheme: Scheme,
    roots: Vec<Certificate>,
    timeout: Duration,
    connect_timeout: Duration,
    clients: Mutex<ClientCache>,
}

#[derive(Default)]
struct ClientCache {
    clients: HashMap<ReplicaAddress, Client>,
    order: VecDeque<ReplicaAddress>,
}

impl fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsTransport")
            .field("server_name", &self.server_name)
            .field("scheme", &self.scheme)
            .field("roots", &self.roots.len())
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl TlsTransport {
    /// Transport for the configured service name and CA bundle.
    pub fn from_config(config: &WellKnownConfig) -> Result<Self> {
        Self::from_ca_file(
            config.service.server_name.clone(),
            &config.probe.ca_path,
            &config.probe,
        )
    }

    pub fn from_ca_file(
        server_name: impl Into<String>,
        ca_path: &Path,
        probe: &ProbeConfig,
    ) -> Result<Self> {
        let bytes = fs::read(ca_path)
            .with_context(|| format!("failed to read CA bundle `{}`", ca_path.display()))?;
        Self::from_ca_pem(server_name, &bytes, probe)
            .with_context(|| format!("failed to parse CA bundle `{}`", ca_path.display()))
    }

    pub fn from_ca_pem(
        server_name: impl Into<String>,
        pem_bundle: &[u8],
        probe: &ProbeConfig,
    ) -> Result<Self> {
        let roots = Certificate::from_pem_bundle(pem_bundle)?;
        if roots.is_empty() {
            crate::bail_err!("CA bundle contains no certificates");
        }
        Ok(Self::build(server_name.into(), Scheme::Https, roots, probe))
    }

    /// Plain HTTP with the same DNS pinning, for loopback test servers.
    #[doc(hidden)]
    pub fn plaintext(server_name: impl Into<String>, probe: &ProbeConfig) -> Self {
        Self::build(server_name.into(), Scheme::Http, Vec::new(), probe)
    }

    fn build(
        server_name: String,
        scheme: Scheme,
        roots: Vec<Certificate>,
        probe: &ProbeConfig,
    ) -> Self {
        Self {
            server_name,
            scheme,
            roots,
            timeout: probe.timeout,
            connect_timeout: probe.connect_timeout,
            clients: Mutex::new(ClientCache::default()),
        }
    }

    fn client_for(&self, replica: &ReplicaAddress) -> std::result::Result<Client, reqwest::Error> {
        let mut cache = self.clients.lock().expect("client cache poisoned");
        if let Some(client) = cache.clients.get(replica) {
            return Ok(client.clone());
        }

        let client = self.new_client(replica)?;
        if cache.order.len() >= MAX_CACHED_CLIENTS {
            if let Some(oldest) = cache.order.pop_front() {
                cache.clients.remove(&oldest);
            }
        }
        cache.order.push_back(*replica);
        cache.clients.insert(*replica, client.clone());
        Ok(client)
    }

    fn new_client(&self, replica: &ReplicaAddress) -> std::result::Result<Client, reqwest::Error> {
        let mut builder = Client::builder()
            .no_proxy()
            .redirect(Policy::none())
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .resolve(&self.server_name, replica.socket_addr());

        if self.scheme == Scheme::Https {
            builder = builder.use_rustls_tls().tls_built_in_root_certs(false);
            for root in &self.roots {
                builder = builder.add_root_certificate(root.clone());
            }
        }

        builder.build()
    }
}

#[async_trait]
impl WellKnownTransport for TlsTransport {
    fn url_for(&self, replica: &ReplicaAddress, path: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.server_name,
            replica.port(),
            path
        )
    }

    async fn get(
        &self,
        replica: &ReplicaAddress,
        path: &str,
    ) -> std::result::Result<ProbeResponse, TransportError> {
        let url = self.url_for(replica, path);
        let client = self
            .client_for(replica)
            .map_err(TransportError::from_reqwest)?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ProbeResponse {
                status,
                body: Vec::new(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::new(format!("failed to read body: {}", error_chain(&err))))?;

        Ok(ProbeResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Render an error with its full source chain; reqwest's top-level message
/// omits the connect or TLS cause.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
