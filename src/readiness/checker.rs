use crate::config::WellKnownConfig;
use crate::error::{Error, Result};
use crate::readiness::policy::{expected_minimum_replicas, metadata_is_operator_managed, quorum_satisfied};
use crate::readiness::{verify_replica, CheckFailure, ReferenceSource, ReplicaAddress, ReplicaEnumerator};
use crate::resources::{AuthenticationConfig, ConfigMapLister, EndpointsLister, ServiceLister};
use crate::status::OperatorSpec;
use crate::document::MetadataDocument;
use crate::transport::WellKnownTransport;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

/// Result of one convergence check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Another component manages the served metadata; nothing was checked.
    NotApplicable,
    Ready,
    NotReady(CheckFailure),
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NotApplicable => "NOT_APPLICABLE",
            Verdict::Ready => "READY",
            Verdict::NotReady(_) => "NOT_READY",
        }
    }

    pub fn failure(&self) -> Option<&CheckFailure> {
        match self {
            Verdict::NotReady(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Object caches the checker reads each tick.
#[derive(Clone, Copy)]
pub struct CheckSources<'a> {
    pub config_maps: &'a dyn ConfigMapLister,
    pub services: &'a dyn ServiceLister,
    pub endpoints: &'a dyn EndpointsLister,
}

/// Decides whether every replica behind the service serves the reference document.
#[derive(Clone, Debug)]
pub struct ConvergenceChecker {
    reference: ReferenceSource,
    enumerator: ReplicaEnumerator,
    path: String,
    parallel: bool,
    default_minimum_replicas: usize,
}

impl ConvergenceChecker {
    pub fn new(config: &WellKnownConfig) -> Self {
        Self {
            reference: ReferenceSource::new(&config.metadata),
            enumerator: ReplicaEnumerator::new(&config.service),
            path: config.probe.path.clone(),
            parallel: config.probe.parallel,
            default_minimum_replicas: config.controller.default_minimum_replicas,
        }
    }

    /// Run the check. Failures are returned inside the verdict; the only
    /// error is [`Error::Cancelled`].
    pub async fn check(
        &self,
        auth: &AuthenticationConfig,
        spec: &OperatorSpec,
        sources: CheckSources<'_>,
        transport: &dyn WellKnownTransport,
        cancel: &CancellationToken,
    ) -> Result<Verdict> {
        if !metadata_is_operator_managed(&auth.spec) {
            tracing::debug!(
                auth_config = auth.name.as_str(),
                "well-known metadata is managed elsewhere, skipping verification"
            );
            return Ok(Verdict::NotApplicable);
        }

        let expected = match self.reference.fetch(sources.config_maps) {
            Ok(document) => document,
            Err(failure) => return Ok(Verdict::NotReady(failure)),
        };

        let replicas = match self.enumerator.enumerate(sources.services, sources.endpoints) {
            Ok(replicas) => replicas,
            Err(failure) => return Ok(Verdict::NotReady(failure)),
        };

        if let Some(failure) = self.verify_all(&replicas, &expected, transport, cancel).await? {
            return Ok(Verdict::NotReady(failure));
        }

        // Evaluated after probing so that disagreement among the replicas we
        // can see is reported ahead of a missing replica.
        let expected_replicas = expected_minimum_replicas(spec, self.default_minimum_replicas);
        if !quorum_satisfied(replicas.len(), expected_replicas) {
            return Ok(Verdict::NotReady(CheckFailure::InsufficientReplicas {
                namespace: self.enumerator.namespace().to_string(),
                name: self.enumerator.name().to_string(),
                expected: expected_replicas,
                observed: replicas.len(),
            }));
        }

        Ok(Verdict::Ready)
    }

    /// First failure in enumeration order, whether probes run one by one or together.
    async fn verify_all(
        &self,
        replicas: &[ReplicaAddress],
        expected: &MetadataDocument,
        transport: &dyn WellKnownTransport,
        cancel: &CancellationToken,
    ) -> Result<Option<CheckFailure>> {
        if self.parallel {
            let probes = replicas
                .iter()
                .map(|replica| verify_replica(transport, &self.path, replica, expected));
            let outcomes = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcomes = join_all(probes) => outcomes,
            };
            return Ok(outcomes.into_iter().find_map(Result::err));
        }

        for replica in replicas {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = verify_replica(transport, &self.path, replica, expected) => outcome,
            };
            if let Err(failure) = outcome {
                return Ok(Some(failure));
            }
        }

        Ok(None)
    }
}
