//! Business rules of the readiness check, kept apart from the HTTP probing.

use crate::resources::{AuthenticationSpec, AuthenticationType};
use crate::status::OperatorSpec;

/// Key under `unsupportedConfigOverrides` that pins the replica minimum.
pub const MINIMUM_REPLICAS_OVERRIDE: &str = "minimumNumberOfReplicas";

/// Whether this operator owns the served discovery metadata.
///
/// When authentication is delegated, or the user supplies their own metadata
/// config map, another component manages the endpoint and the check is skipped.
pub fn metadata_is_operator_managed(spec: &AuthenticationSpec) -> bool {
    let operator_managed_type = matches!(spec.kind, None | Some(AuthenticationType::IntegratedOAuth));
    let user_metadata = spec
        .oauth_metadata_name
        .as_deref()
        .is_some_and(|name| !name.is_empty());
    operator_managed_type && !user_metadata
}

/// Smallest replica count at which readiness may be declared.
///
/// Order of precedence: explicit override, desired replica count, `fallback`.
pub fn expected_minimum_replicas(spec: &OperatorSpec, fallback: usize) -> usize {
    let overridden = spec
        .unsupported_config_overrides
        .as_ref()
        .and_then(|overrides| overrides.get(MINIMUM_REPLICAS_OVERRIDE))
        .and_then(|value| value.as_u64())
        .and_then(|value| usize::try_from(value).ok());

    overridden
        .or_else(|| spec.replicas.and_then(|replicas| usize::try_from(replicas).ok()))
        .unwrap_or(fallback)
}

/// True once at least `expected` replicas have been observed.
pub fn quorum_satisfied(observed: usize, expected: usize) -> bool {
    observed >= expected
}
