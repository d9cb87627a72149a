//! Read-only views of the cluster objects the readiness check consumes.
//!
//! Lookups are cache reads: they never block on the network and a missing
//! object is `None`. Keeping the caches fresh is the caller's concern.

use k8s_openapi::api::core::v1::{ConfigMap, Endpoints, Service};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// How cluster authentication is provided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum AuthenticationType {
    /// The operator runs the OAuth server and owns its discovery metadata.
    IntegratedOAuth,
    None,
    #[serde(rename = "OIDC")]
    Oidc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default, rename = "type")]
    pub kind: Option<AuthenticationType>,
    /// Name of a user-supplied config map carrying the discovery metadata.
    #[serde(default)]
    pub oauth_metadata_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthenticationConfig {
    pub name: String,
    #[serde(default)]
    pub spec: AuthenticationSpec,
}

/// Externally routable endpoint of the OAuth server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthRoute {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub host: String,
}

pub trait AuthConfigLister: Send + Sync {
    fn auth_config(&self, name: &str) -> Option<AuthenticationConfig>;
}

pub trait RouteLister: Send + Sync {
    fn route(&self, namespace: &str, name: &str) -> Option<OAuthRoute>;
}

pub trait ConfigMapLister: Send + Sync {
    fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap>;
}

pub trait ServiceLister: Send + Sync {
    fn service(&self, namespace: &str, name: &str) -> Option<Service>;
}

pub trait EndpointsLister: Send + Sync {
    fn endpoints(&self, namespace: &str, name: &str) -> Option<Endpoints>;
}

type ObjectKey = (String, String);

/// Object cache implementing every lister, fed by whatever watches the cluster.
#[derive(Default)]
pub struct InMemoryResources {
    auth_configs: RwLock<BTreeMap<String, AuthenticationConfig>>,
    routes: RwLock<BTreeMap<ObjectKey, OAuthRoute>>,
    config_maps: RwLock<BTreeMap<ObjectKey, ConfigMap>>,
    services: RwLock<BTreeMap<ObjectKey, Service>>,
    endpoints: RwLock<BTreeMap<ObjectKey, Endpoints>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_auth_config(&self, config: AuthenticationConfig) {
        let mut guard = self.auth_configs.write().expect("auth config cache poisoned");
        guard.insert(config.name.clone(), config);
    }

    pub fn remove_auth_config(&self, name: &str) -> Option<AuthenticationConfig> {
        let mut guard = self.auth_configs.write().expect("auth config cache poisoned");
        guard.remove(name)
    }

    pub fn upsert_route(&self, route: OAuthRoute) {
        let mut guard = self.routes.write().expect("route cache poisoned");
        guard.insert((route.namespace.clone(), route.name.clone()), route);
    }

    pub fn remove_route(&self, namespace: &str, name: &str) -> Option<OAuthRoute> {
        let mut guard = self.routes.write().expect("route cache poisoned");
        guard.remove(&key(namespace, name))
    }

    pub fn upsert_config_map(&self, config_map: ConfigMap) {
        let object_key = metadata_key(&config_map.metadata);
        let mut guard = self.config_maps.write().expect("config map cache poisoned");
        guard.insert(object_key, config_map);
    }

    pub fn remove_config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        let mut guard = self.config_maps.write().expect("config map cache poisoned");
        guard.remove(&key(namespace, name))
    }

    pub fn upsert_service(&self, service: Service) {
        let object_key = metadata_key(&service.metadata);
        let mut guard = self.services.write().expect("service cache poisoned");
        guard.insert(object_key, service);
    }

    pub fn remove_service(&self, namespace: &str, name: &str) -> Option<Service> {
        let mut guard = self.services.write().expect("service cache poisoned");
        guard.remove(&key(namespace, name))
    }

    pub fn upsert_endpoints(&self, endpoints: Endpoints) {
        let object_key = metadata_key(&endpoints.metadata);
        let mut guard = self.endpoints.write().expect("endpoints cache poisoned");
        guard.insert(object_key, endpoints);
    }

    pub fn remove_endpoints(&self, namespace: &str, name: &str) -> Option<Endpoints> {
        let mut guard = self.endpoints.write().expect("endpoints cache poisoned");
        guard.remove(&key(namespace, name))
    }
}

impl AuthConfigLister for InMemoryResources {
    fn auth_config(&self, name: &str) -> Option<AuthenticationConfig> {
        let guard = self.auth_configs.read().expect("auth config cache poisoned");
        guard.get(name).cloned()
    }
}

impl RouteLister for InMemoryResources {
    fn route(&self, namespace: &str, name: &str) -> Option<OAuthRoute> {
        let guard = self.routes.read().expect("route cache poisoned");
        guard.get(&key(namespace, name)).cloned()
    }
}

impl ConfigMapLister for InMemoryResources {
    fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        let guard = self.config_maps.read().expect("config map cache poisoned");
        guard.get(&key(namespace, name)).cloned()
    }
}

impl ServiceLister for InMemoryResources {
    fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        let guard = self.services.read().expect("service cache poisoned");
        guard.get(&key(namespace, name)).cloned()
    }
}

impl EndpointsLister for InMemoryResources {
    fn endpoints(&self, namespace: &str, name: &str) -> Option<Endpoints> {
        let guard = self.endpoints.read().expect("endpoints cache poisoned");
        guard.get(&key(namespace, name)).cloned()
    }
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn metadata_key(
    metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
) -> ObjectKey {
    (
        metadata.namespace.clone().unwrap_or_default(),
        metadata.name.clone().unwrap_or_default(),
    )
}
