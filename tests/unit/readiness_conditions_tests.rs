use std::net::{IpAddr, Ipv4Addr};
use wellknown_ready::readiness::conditions::{outcome_conditions, REASON_NOT_READY, REASON_PREREQS_NOT_READY};
use wellknown_ready::readiness::{
    complete_condition_set, reduce, CheckFailure, KnownCondition, ReplicaAddress, TickOutcome,
    Verdict,
};
use wellknown_ready::status::{ConditionStatus, OperatorCondition};

fn find<'a>(conditions: &'a [OperatorCondition], known: KnownCondition) -> &'a OperatorCondition {
    conditions
        .iter()
        .find(|condition| condition.condition_type == known.as_str())
        .expect("condition present")
}

fn names(conditions: &[OperatorCondition]) -> Vec<&str> {
    conditions
        .iter()
        .map(|condition| condition.condition_type.as_str())
        .collect()
}

fn mismatch() -> CheckFailure {
    CheckFailure::DocumentMismatch {
        address: ReplicaAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 6443),
        url: "https://kubernetes.default.svc:6443/.well-known/oauth-authorization-server".to_string(),
        differing_keys: vec!["issuer".to_string()],
    }
}

#[test]
fn ready_tick_writes_defaults_for_all_four_names() {
    let conditions = reduce(&TickOutcome::Checked(Verdict::Ready), Vec::new());

    assert_eq!(
        names(&conditions),
        vec![
            "WellKnownRouteDegraded",
            "WellKnownAuthConfigDegraded",
            "WellKnownProgressing",
            "WellKnownAvailable"
        ]
    );
    assert_eq!(find(&conditions, KnownCondition::Available).status, ConditionStatus::True);
    for known in [
        KnownCondition::RouteDegraded,
        KnownCondition::AuthConfigDegraded,
        KnownCondition::Progressing,
    ] {
        let condition = find(&conditions, known);
        assert_eq!(condition.status, ConditionStatus::False);
        assert!(condition.reason.is_empty());
    }
}

#[test]
fn not_applicable_is_indistinguishable_from_ready() {
    assert_eq!(
        reduce(&TickOutcome::Checked(Verdict::NotApplicable), Vec::new()),
        reduce(&TickOutcome::Checked(Verdict::Ready), Vec::new())
    );
}

#[test]
fn not_ready_marks_progressing_and_unavailable_with_the_diagnostic() {
    let conditions = reduce(&TickOutcome::Checked(Verdict::NotReady(mismatch())), Vec::new());

    let progressing = find(&conditions, KnownCondition::Progressing);
    assert_eq!(progressing.status, ConditionStatus::True);
    assert_eq!(progressing.reason, REASON_NOT_READY);

    let available = find(&conditions, KnownCondition::Available);
    assert_eq!(available.status, ConditionStatus::False);
    assert_eq!(available.reason, REASON_NOT_READY);
    assert!(available
        .message
        .starts_with("The well-known endpoint is not yet available: "));
    assert!(available.message.contains("10.0.0.2:6443"));
    assert_eq!(progressing.message, available.message);
}

#[test]
fn missing_prerequisites_keep_upstream_degraded_conditions() {
    let upstream = vec![OperatorCondition::new(
        KnownCondition::RouteDegraded.as_str(),
        ConditionStatus::True,
        "NotFound",
        "the route openshift-authentication/oauth-openshift was not found",
    )];

    let conditions = reduce(&TickOutcome::PrerequisitesMissing, upstream);

    assert_eq!(conditions.len(), 4);
    let route = find(&conditions, KnownCondition::RouteDegraded);
    assert_eq!(route.status, ConditionStatus::True);
    assert_eq!(route.reason, "NotFound");

    let available = find(&conditions, KnownCondition::Available);
    assert_eq!(available.status, ConditionStatus::False);
    assert_eq!(available.reason, REASON_PREREQS_NOT_READY);
    assert_eq!(
        available.message,
        "The well-known endpoint prereqs are not yet available"
    );
    assert_eq!(find(&conditions, KnownCondition::Progressing).status, ConditionStatus::False);
}

#[test]
fn success_outcomes_ask_for_nothing() {
    assert!(outcome_conditions(&TickOutcome::Checked(Verdict::Ready)).is_empty());
    assert!(outcome_conditions(&TickOutcome::Checked(Verdict::NotApplicable)).is_empty());
}

#[test]
fn completion_keeps_first_match_and_drops_unknown_names() {
    let conditions = complete_condition_set(vec![
        OperatorCondition::new("SomeOtherDegraded", ConditionStatus::True, "Other", ""),
        OperatorCondition::new("WellKnownAvailable", ConditionStatus::False, "First", ""),
        OperatorCondition::new("WellKnownAvailable", ConditionStatus::True, "Second", ""),
    ]);

    assert_eq!(conditions.len(), 4);
    assert!(conditions
        .iter()
        .all(|condition| KnownCondition::from_name(&condition.condition_type).is_some()));
    assert_eq!(find(&conditions, KnownCondition::Available).reason, "First");
}
