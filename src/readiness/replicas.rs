use crate::config::ServiceConfig;
use crate::readiness::CheckFailure;
use crate::resources::{EndpointsLister, ServiceLister};
use k8s_openapi::api::core::v1::{EndpointSubset, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const PROTOCOL_TCP: &str = "TCP";

/// One live backend process, addressed directly rather than through the service VIP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaAddress(SocketAddr);

impl ReplicaAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SocketAddr brackets IPv6 hosts, matching host:port joining.
        fmt::Display::fmt(&self.0, f)
    }
}

/// Resolves the backends of a service from its Service and Endpoints objects.
///
/// Nothing is cached: each call reads the current topology.
#[derive(Clone, Debug)]
pub struct ReplicaEnumerator {
    namespace: String,
    name: String,
    service_port: u16,
}

impl ReplicaEnumerator {
    pub fn new(service: &ServiceConfig) -> Self {
        Self {
            namespace: service.namespace.clone(),
            name: service.name.clone(),
            service_port: service.port,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enumerate(
        &self,
        services: &dyn ServiceLister,
        endpoints: &dyn EndpointsLister,
    ) -> Result<Vec<ReplicaAddress>, CheckFailure> {
        let service = services
            .service(&self.namespace, &self.name)
            .ok_or_else(|| CheckFailure::ServiceNotFound {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
            })?;

        let target_port = target_port_for(&service, self.service_port).ok_or_else(|| {
            CheckFailure::TargetPortNotFound {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                service_port: self.service_port,
            }
        })?;

        let endpoints = endpoints
            .endpoints(&self.namespace, &self.name)
            .ok_or_else(|| CheckFailure::EndpointNotFound {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
            })?;

        let subset = endpoints
            .subsets
            .iter()
            .flatten()
            .find(|subset| subset_has_port(subset, target_port))
            .ok_or_else(|| CheckFailure::EndpointPortNotFound {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                target_port,
            })?;

        let ready = subset.addresses.as_deref().unwrap_or_default();
        let not_ready = subset.not_ready_addresses.as_deref().unwrap_or_default();

        // Any not-ready member fails the whole subset.
        if !not_ready.is_empty() || ready.is_empty() {
            return Err(CheckFailure::EndpointsNotReady {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                target_port,
                ready: ready.len(),
                not_ready: not_ready.len(),
            });
        }

        ready
            .iter()
            .map(|address| {
                address
                    .ip
                    .trim()
                    .parse::<IpAddr>()
                    .map(|ip| ReplicaAddress::new(ip, target_port))
                    .map_err(|_| CheckFailure::InvalidEndpointAddress {
                        namespace: self.namespace.clone(),
                        name: self.name.clone(),
                        address: address.ip.clone(),
                    })
            })
            .collect()
    }
}

/// Backend port the service forwards `service_port` to.
///
/// Only TCP ports with a numeric, non-zero target port qualify; named target
/// ports are not resolved.
pub fn target_port_for(service: &Service, service_port: u16) -> Option<u16> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .iter()
        .filter(|port| is_tcp(port.protocol.as_deref()) && port.port == i32::from(service_port))
        .find_map(|port| port.target_port.as_ref().and_then(int_value))
}

fn subset_has_port(subset: &EndpointSubset, target_port: u16) -> bool {
    subset.ports.iter().flatten().any(|port| {
        is_tcp(port.protocol.as_deref()) && port.port == i32::from(target_port)
    })
}

fn is_tcp(protocol: Option<&str>) -> bool {
    protocol.map_or(true, |value| value == PROTOCOL_TCP)
}

fn int_value(value: &IntOrString) -> Option<u16> {
    let raw = match value {
        IntOrString::Int(port) => *port,
        IntOrString::String(text) => text.parse::<i32>().unwrap_or(0),
    };
    u16::try_from(raw).ok().filter(|port| *port != 0)
}
