use serde_json::json;
use wellknown_ready::status::{
    ConditionStatus, InMemoryStatusStore, OperatorClient, OperatorCondition, OperatorSpec,
};

fn condition(status: ConditionStatus, reason: &str) -> OperatorCondition {
    OperatorCondition::new("WellKnownAvailable", status, reason, "")
}

#[tokio::test]
async fn transition_time_moves_only_when_status_flips() {
    let store = InMemoryStatusStore::default();

    store
        .update_conditions(vec![condition(ConditionStatus::False, "NotReady")])
        .await
        .expect("first submission");
    let first = store.condition("WellKnownAvailable").await.expect("stored");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .update_conditions(vec![condition(ConditionStatus::False, "PrereqsNotReady")])
        .await
        .expect("same status");
    let unchanged = store.condition("WellKnownAvailable").await.expect("stored");
    assert_eq!(unchanged.last_transition_time, first.last_transition_time);
    assert_eq!(unchanged.condition.reason, "PrereqsNotReady");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .update_conditions(vec![condition(ConditionStatus::True, "")])
        .await
        .expect("flip");
    let flipped = store.condition("WellKnownAvailable").await.expect("stored");
    assert!(flipped.last_transition_time > first.last_transition_time);
    assert_eq!(store.submission_count(), 3);
}

#[tokio::test]
async fn conditions_of_other_controllers_are_preserved() {
    let store = InMemoryStatusStore::default();
    store
        .update_conditions(vec![OperatorCondition::new(
            "OAuthServerDeploymentDegraded",
            ConditionStatus::False,
            "",
            "",
        )])
        .await
        .expect("other controller");
    store
        .update_conditions(vec![condition(ConditionStatus::True, "")])
        .await
        .expect("ours");

    let types: Vec<String> = store
        .conditions()
        .await
        .into_iter()
        .map(|stored| stored.condition.condition_type)
        .collect();
    assert_eq!(types, vec!["OAuthServerDeploymentDegraded", "WellKnownAvailable"]);
}

#[tokio::test]
async fn spec_reads_can_be_made_to_fail() {
    let spec = OperatorSpec {
        replicas: Some(3),
        unsupported_config_overrides: Some(json!({"minimumNumberOfReplicas": 2})),
    };
    let store = InMemoryStatusStore::new(spec.clone());
    assert_eq!(store.operator_spec().await.expect("spec"), spec);

    store.set_spec_error(Some("etcd unavailable".to_string())).await;
    let err = store.operator_spec().await.expect_err("spec error");
    assert!(err.to_string().contains("etcd unavailable"));

    store.set_spec_error(None).await;
    assert!(store.operator_spec().await.is_ok());
}

#[test]
fn operator_spec_deserializes_from_camel_case() {
    let spec: OperatorSpec = serde_json::from_value(json!({
        "replicas": 2,
        "unsupportedConfigOverrides": {"minimumNumberOfReplicas": 1}
    }))
    .expect("spec");
    assert_eq!(spec.replicas, Some(2));
    assert!(spec.unsupported_config_overrides.is_some());
}
