use crate::readiness::ReplicaAddress;
use thiserror::Error;

/// Coarse grouping of check failures; all of them are recoverable on a later tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    PrerequisiteMissing,
    ResolutionFailure,
    VerificationFailure,
    QuorumDeficiency,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::PrerequisiteMissing => "prerequisite_missing",
            FailureClass::ResolutionFailure => "resolution_failure",
            FailureClass::VerificationFailure => "verification_failure",
            FailureClass::QuorumDeficiency => "quorum_deficiency",
        }
    }
}

/// Why a tick could not declare the well-known endpoint converged.
///
/// The `Display` output is operator-facing and always names the resource or
/// replica at fault.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CheckFailure {
    #[error("the {namespace}/{name} configMap was not found")]
    MissingResource { namespace: String, name: String },
    #[error("the {namespace}/{name} configMap is missing data in the '{key}' key")]
    MissingKey {
        namespace: String,
        name: String,
        key: String,
    },
    #[error("failed to parse the '{key}' key of the {namespace}/{name} configMap as a JSON object: {reason}")]
    MalformedDocument {
        namespace: String,
        name: String,
        key: String,
        reason: String,
    },
    #[error("failed to get service {namespace}/{name}")]
    ServiceNotFound { namespace: String, name: String },
    #[error("failed to get endpoints {namespace}/{name}")]
    EndpointNotFound { namespace: String, name: String },
    #[error("unable to find a TCP target port for service port {service_port} on service {namespace}/{name}")]
    TargetPortNotFound {
        namespace: String,
        name: String,
        service_port: u16,
    },
    #[error("unable to find an endpoints subset exposing TCP port {target_port} in {namespace}/{name}")]
    EndpointPortNotFound {
        namespace: String,
        name: String,
        target_port: u16,
    },
    #[error("endpoints {namespace}/{name} are not ready: {ready} ready and {not_ready} not ready addresses for port {target_port}")]
    EndpointsNotReady {
        namespace: String,
        name: String,
        target_port: u16,
        ready: usize,
        not_ready: usize,
    },
    #[error("endpoints {namespace}/{name} list an invalid address `{address}`")]
    InvalidEndpointAddress {
        namespace: String,
        name: String,
        address: String,
    },
    #[error("failed to GET well-known {url} on replica {address}: {reason}")]
    Unreachable {
        address: ReplicaAddress,
        url: String,
        reason: String,
    },
    #[error("got '{status}' status while trying to GET the OAuth well-known {url} endpoint data from replica {address}")]
    UnexpectedStatus {
        address: ReplicaAddress,
        url: String,
        status: String,
    },
    #[error("failed to parse well-known {url} JSON from replica {address}: {reason}")]
    MalformedResponse {
        address: ReplicaAddress,
        url: String,
        reason: String,
    },
    #[error("the value returned by the well-known {url} endpoint on replica {address} does not match expectations (differing keys: {})", .differing_keys.join(", "))]
    DocumentMismatch {
        address: ReplicaAddress,
        url: String,
        differing_keys: Vec<String>,
    },
    #[error("insufficient replica count observed: need at least {expected} replicas of {namespace}/{name}, got {observed}")]
    InsufficientReplicas {
        namespace: String,
        name: String,
        expected: usize,
        observed: usize,
    },
}

impl CheckFailure {
    pub fn class(&self) -> FailureClass {
        match self {
            CheckFailure::MissingResource { .. }
            | CheckFailure::MissingKey { .. }
            | CheckFailure::MalformedDocument { .. } => FailureClass::PrerequisiteMissing,
            CheckFailure::ServiceNotFound { .. }
            | CheckFailure::EndpointNotFound { .. }
            | CheckFailure::TargetPortNotFound { .. }
            | CheckFailure::EndpointPortNotFound { .. }
            | CheckFailure::EndpointsNotReady { .. }
            | CheckFailure::InvalidEndpointAddress { .. } => FailureClass::ResolutionFailure,
            CheckFailure::Unreachable { .. }
            | CheckFailure::UnexpectedStatus { .. }
            | CheckFailure::MalformedResponse { .. }
            | CheckFailure::DocumentMismatch { .. } => FailureClass::VerificationFailure,
            CheckFailure::InsufficientReplicas { .. } => FailureClass::QuorumDeficiency,
        }
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckFailure::MissingResource { .. } => "missing_resource",
            CheckFailure::MissingKey { .. } => "missing_key",
            CheckFailure::MalformedDocument { .. } => "malformed_document",
            CheckFailure::ServiceNotFound { .. } => "service_not_found",
            CheckFailure::EndpointNotFound { .. } => "endpoint_not_found",
            CheckFailure::TargetPortNotFound { .. } => "target_port_not_found",
            CheckFailure::EndpointPortNotFound { .. } => "endpoint_port_not_found",
            CheckFailure::EndpointsNotReady { .. } => "endpoints_not_ready",
            CheckFailure::InvalidEndpointAddress { .. } => "invalid_endpoint_address",
            CheckFailure::Unreachable { .. } => "unreachable",
            CheckFailure::UnexpectedStatus { .. } => "unexpected_status",
            CheckFailure::MalformedResponse { .. } => "malformed_response",
            CheckFailure::DocumentMismatch { .. } => "document_mismatch",
            CheckFailure::InsufficientReplicas { .. } => "insufficient_replicas",
        }
    }

    /// Replica the failure was observed on, for per-replica failures.
    pub fn replica(&self) -> Option<&ReplicaAddress> {
        match self {
            CheckFailure::Unreachable { address, .. }
            | CheckFailure::UnexpectedStatus { address, .. }
            | CheckFailure::MalformedResponse { address, .. }
            | CheckFailure::DocumentMismatch { address, .. } => Some(address),
            _ => None,
        }
    }
}
