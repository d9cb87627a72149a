#[path = "../support/mod.rs"]
mod support;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use support::fixtures::{
    kubernetes_endpoints, kubernetes_service, subset, test_config, SERVICE_PORT, TARGET_PORT,
};
use wellknown_ready::readiness::{CheckFailure, FailureClass, ReplicaAddress, ReplicaEnumerator};
use wellknown_ready::resources::InMemoryResources;

fn enumerator() -> ReplicaEnumerator {
    ReplicaEnumerator::new(&test_config().service)
}

fn resources_with(
    target_port: IntOrString,
    subsets: Vec<k8s_openapi::api::core::v1::EndpointSubset>,
) -> InMemoryResources {
    let resources = InMemoryResources::new();
    resources.upsert_service(kubernetes_service(SERVICE_PORT, target_port));
    resources.upsert_endpoints(kubernetes_endpoints(subsets));
    resources
}

fn enumerate(resources: &InMemoryResources) -> Result<Vec<ReplicaAddress>, CheckFailure> {
    enumerator().enumerate(resources, resources)
}

fn replica(ip: &str) -> ReplicaAddress {
    ReplicaAddress::new(ip.parse().expect("ip"), TARGET_PORT)
}

#[test]
fn ready_addresses_are_returned_in_declared_order() {
    let resources = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&["10.0.0.3", "10.0.0.1", "10.0.0.2"], &[], TARGET_PORT)],
    );

    let replicas = enumerate(&resources).expect("replicas");
    assert_eq!(
        replicas,
        vec![replica("10.0.0.3"), replica("10.0.0.1"), replica("10.0.0.2")]
    );
}

#[test]
fn first_subset_exposing_the_target_port_is_used() {
    let resources = resources_with(
        IntOrString::String("6443".to_string()),
        vec![
            subset(&["10.0.1.1"], &[], 8080),
            subset(&["10.0.0.1", "10.0.0.2"], &[], TARGET_PORT),
            subset(&["10.0.2.1"], &[], TARGET_PORT),
        ],
    );

    let replicas = enumerate(&resources).expect("replicas");
    assert_eq!(replicas, vec![replica("10.0.0.1"), replica("10.0.0.2")]);
}

#[test]
fn any_not_ready_address_fails_the_subset() {
    let resources = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&["10.0.0.1", "10.0.0.2"], &["10.0.0.3"], TARGET_PORT)],
    );

    let failure = enumerate(&resources).expect_err("not ready");
    assert_eq!(
        failure,
        CheckFailure::EndpointsNotReady {
            namespace: "default".to_string(),
            name: "kubernetes".to_string(),
            target_port: TARGET_PORT,
            ready: 2,
            not_ready: 1,
        }
    );
    assert_eq!(failure.class(), FailureClass::ResolutionFailure);
}

#[test]
fn empty_subset_is_not_ready() {
    let resources = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&[], &[], TARGET_PORT)],
    );

    assert!(matches!(
        enumerate(&resources),
        Err(CheckFailure::EndpointsNotReady { ready: 0, not_ready: 0, .. })
    ));
}

#[test]
fn missing_objects_and_ports_map_to_distinct_failures() {
    let empty = InMemoryResources::new();
    assert!(matches!(enumerate(&empty), Err(CheckFailure::ServiceNotFound { .. })));

    let named_port = resources_with(IntOrString::String("https".to_string()), Vec::new());
    assert!(matches!(
        enumerate(&named_port),
        Err(CheckFailure::TargetPortNotFound { service_port: SERVICE_PORT, .. })
    ));

    let no_endpoints = InMemoryResources::new();
    no_endpoints.upsert_service(kubernetes_service(
        SERVICE_PORT,
        IntOrString::Int(i32::from(TARGET_PORT)),
    ));
    assert!(matches!(
        enumerate(&no_endpoints),
        Err(CheckFailure::EndpointNotFound { .. })
    ));

    let wrong_port = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&["10.0.0.1"], &[], 8080)],
    );
    assert!(matches!(
        enumerate(&wrong_port),
        Err(CheckFailure::EndpointPortNotFound { target_port: TARGET_PORT, .. })
    ));
}

#[test]
fn service_port_must_match_configuration() {
    let resources = InMemoryResources::new();
    resources.upsert_service(kubernetes_service(8443, IntOrString::Int(i32::from(TARGET_PORT))));
    resources.upsert_endpoints(kubernetes_endpoints(vec![subset(&["10.0.0.1"], &[], TARGET_PORT)]));

    let failure = enumerate(&resources).expect_err("port mismatch");
    assert!(failure.to_string().contains("service port 443"));
}

#[test]
fn unparsable_addresses_are_reported() {
    let resources = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&["10.0.0.1", "not-an-ip"], &[], TARGET_PORT)],
    );

    assert_eq!(
        enumerate(&resources),
        Err(CheckFailure::InvalidEndpointAddress {
            namespace: "default".to_string(),
            name: "kubernetes".to_string(),
            address: "not-an-ip".to_string(),
        })
    );
}

#[test]
fn ipv6_replicas_keep_the_target_port() {
    let resources = resources_with(
        IntOrString::Int(i32::from(TARGET_PORT)),
        vec![subset(&["fd00::1"], &[], TARGET_PORT)],
    );

    let replicas = enumerate(&resources).expect("replicas");
    assert_eq!(replicas[0].to_string(), "[fd00::1]:6443");
}
