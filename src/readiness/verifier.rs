use crate::document::MetadataDocument;
use crate::readiness::{CheckFailure, ReplicaAddress};
use crate::telemetry::runtime_counters;
use crate::transport::WellKnownTransport;
use std::time::Instant;

/// GET the well-known document from one replica and compare it with `expected`.
///
/// The first problem found is returned; there is no retry.
pub async fn verify_replica(
    transport: &dyn WellKnownTransport,
    path: &str,
    replica: &ReplicaAddress,
    expected: &MetadataDocument,
) -> Result<(), CheckFailure> {
    let started = Instant::now();
    let outcome = probe(transport, path, replica, expected).await;
    let elapsed = started.elapsed();
    let replica_label = replica.to_string();

    match &outcome {
        Ok(()) => {
            runtime_counters().record_probe_success(&replica_label, elapsed);
            crate::replica_event!(
                debug,
                "replica_verified",
                replica = replica,
                duration_ms = elapsed.as_millis()
            );
        }
        Err(failure) => {
            runtime_counters().record_probe_failure(&replica_label, failure.kind(), elapsed);
            crate::replica_event!(
                warn,
                "replica_verification_failed",
                replica = replica,
                kind = failure.kind(),
                duration_ms = elapsed.as_millis(),
                reason = failure
            );
        }
    }

    outcome
}

async fn probe(
    transport: &dyn WellKnownTransport,
    path: &str,
    replica: &ReplicaAddress,
    expected: &MetadataDocument,
) -> Result<(), CheckFailure> {
    let url = transport.url_for(replica, path);

    let response = transport
        .get(replica, path)
        .await
        .map_err(|err| CheckFailure::Unreachable {
            address: *replica,
            url: url.clone(),
            reason: err.to_string(),
        })?;

    if !response.status.is_success() {
        return Err(CheckFailure::UnexpectedStatus {
            address: *replica,
            url,
            status: response.status.to_string(),
        });
    }

    let served =
        MetadataDocument::parse(&response.body).map_err(|err| CheckFailure::MalformedResponse {
            address: *replica,
            url: url.clone(),
            reason: err.to_string(),
        })?;

    if !expected.matches(&served) {
        return Err(CheckFailure::DocumentMismatch {
            address: *replica,
            url,
            differing_keys: expected.differing_keys(&served),
        });
    }

    Ok(())
}
