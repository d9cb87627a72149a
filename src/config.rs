use crate::error::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable the API server service port is advertised through.
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT_HTTPS";
pub const DEFAULT_SERVICE_PORT: u16 = 443;
pub const DEFAULT_MINIMUM_REPLICAS: usize = 3;
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";
pub const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WellKnownConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub metadata: MetadataSourceConfig,
    #[serde(default)]
    pub prerequisites: PrerequisiteConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

/// The load-balanced service whose backends are probed one by one.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_service_namespace")]
    pub namespace: String,
    /// Port clients use to address the service, not the backend target port.
    #[serde(default = "default_service_port")]
    pub port: u16,
    /// Hostname presented for SNI and certificate validation on every replica.
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            namespace: default_service_namespace(),
            port: DEFAULT_SERVICE_PORT,
            server_name: default_server_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataSourceConfig {
    #[serde(default = "default_metadata_namespace")]
    pub namespace: String,
    #[serde(default = "default_metadata_name")]
    pub name: String,
    #[serde(default = "default_metadata_key")]
    pub key: String,
}

impl Default for MetadataSourceConfig {
    fn default() -> Self {
        Self {
            namespace: default_metadata_namespace(),
            name: default_metadata_name(),
            key: default_metadata_key(),
        }
    }
}

/// Resources that must exist before the well-known endpoint can be correct.
#[derive(Debug, Clone, Deserialize)]
pub struct PrerequisiteConfig {
    #[serde(default = "default_auth_config_name")]
    pub auth_config_name: String,
    #[serde(default = "default_route_namespace")]
    pub route_namespace: String,
    #[serde(default = "default_route_name")]
    pub route_name: String,
}

impl Default for PrerequisiteConfig {
    fn default() -> Self {
        Self {
            auth_config_name: default_auth_config_name(),
            route_namespace: default_route_namespace(),
            route_name: default_route_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_well_known_path")]
    pub path: String,
    #[serde(default = "default_ca_path")]
    pub ca_path: PathBuf,
    #[serde(
        default = "default_probe_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub connect_timeout: Duration,
    /// Probe replicas concurrently. The reported failure is still the first by
    /// enumeration order.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_well_known_path(),
            ca_path: default_ca_path(),
            timeout: default_probe_timeout(),
            connect_timeout: default_connect_timeout(),
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    #[serde(
        default = "default_resync_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub resync_interval: Duration,
    /// Used when the operator spec states neither an override nor a replica count.
    #[serde(default = "default_minimum_replicas")]
    pub default_minimum_replicas: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval: default_resync_interval(),
            default_minimum_replicas: DEFAULT_MINIMUM_REPLICAS,
        }
    }
}

impl WellKnownConfig {
    /// Load from `config/local.*` (optional) and `WELLKNOWN__*` environment variables.
    ///
    /// The service port falls back to [`SERVICE_PORT_ENV`] and then to 443 when
    /// neither source sets `service.port`.
    pub fn load() -> Result<Self> {
        let env_port = std::env::var(SERVICE_PORT_ENV).ok();
        let fallback_port = service_port_from_env_value(env_port.as_deref());

        let config = Config::builder()
            .set_default("service.port", i64::from(fallback_port))?
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("WELLKNOWN").separator("__"))
            .build()
            .context("failed to assemble well-known configuration")?;

        config
            .try_deserialize()
            .context("failed to deserialize well-known configuration")
    }
}

/// Parse the advertised service port, warning and falling back to 443 on
/// anything that is not a usable port number.
pub fn service_port_from_env_value(raw: Option<&str>) -> u16 {
    let Some(raw) = raw else {
        return DEFAULT_SERVICE_PORT;
    };

    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => port,
        Ok(_) => {
            tracing::warn!(
                variable = SERVICE_PORT_ENV,
                value = raw,
                "defaulting service port to {DEFAULT_SERVICE_PORT}: port 0 is not usable"
            );
            DEFAULT_SERVICE_PORT
        }
        Err(err) => {
            tracing::warn!(
                variable = SERVICE_PORT_ENV,
                value = raw,
                error = %err,
                "defaulting service port to {DEFAULT_SERVICE_PORT} due to parsing error"
            );
            DEFAULT_SERVICE_PORT
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => match text.trim().parse::<u64>() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom),
        },
    }
}

fn default_service_name() -> String {
    "kubernetes".to_string()
}

fn default_service_namespace() -> String {
    "default".to_string()
}

const fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_server_name() -> String {
    "kubernetes.default.svc".to_string()
}

fn default_metadata_namespace() -> String {
    "openshift-config-managed".to_string()
}

fn default_metadata_name() -> String {
    "oauth-openshift".to_string()
}

fn default_metadata_key() -> String {
    "oauthMetadata".to_string()
}

fn default_auth_config_name() -> String {
    "cluster".to_string()
}

fn default_route_namespace() -> String {
    "openshift-authentication".to_string()
}

fn default_route_name() -> String {
    "oauth-openshift".to_string()
}

fn default_well_known_path() -> String {
    WELL_KNOWN_PATH.to_string()
}

fn default_ca_path() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_CA_PATH)
}

const fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

const fn default_resync_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_minimum_replicas() -> usize {
    DEFAULT_MINIMUM_REPLICAS
}
