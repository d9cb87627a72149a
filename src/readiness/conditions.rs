//! Reduction of a tick's outcome onto the controller's fixed condition set.

use crate::readiness::Verdict;
use crate::status::{ConditionStatus, OperatorCondition};

pub const REASON_NOT_READY: &str = "NotReady";
pub const REASON_PREREQS_NOT_READY: &str = "PrereqsNotReady";

/// Every condition this controller owns. Conditions of other controllers are
/// never written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KnownCondition {
    RouteDegraded,
    AuthConfigDegraded,
    Progressing,
    Available,
}

impl KnownCondition {
    pub const ALL: [KnownCondition; 4] = [
        KnownCondition::RouteDegraded,
        KnownCondition::AuthConfigDegraded,
        KnownCondition::Progressing,
        KnownCondition::Available,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KnownCondition::RouteDegraded => "WellKnownRouteDegraded",
            KnownCondition::AuthConfigDegraded => "WellKnownAuthConfigDegraded",
            KnownCondition::Progressing => "WellKnownProgressing",
            KnownCondition::Available => "WellKnownAvailable",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.as_str() == name)
    }

    /// Status written when nothing this tick said otherwise.
    pub fn default_status(self) -> ConditionStatus {
        match self {
            KnownCondition::Available => ConditionStatus::True,
            _ => ConditionStatus::False,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auth config or route missing; the convergence check did not run.
    PrerequisitesMissing,
    Checked(Verdict),
}

impl TickOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickOutcome::PrerequisitesMissing => "PREREQS_NOT_READY",
            TickOutcome::Checked(verdict) => verdict.as_str(),
        }
    }
}

/// Conditions the outcome itself asks for. Success is silent.
pub fn outcome_conditions(outcome: &TickOutcome) -> Vec<OperatorCondition> {
    match outcome {
        TickOutcome::PrerequisitesMissing => vec![OperatorCondition::new(
            KnownCondition::Available.as_str(),
            ConditionStatus::False,
            REASON_PREREQS_NOT_READY,
            "The well-known endpoint prereqs are not yet available",
        )],
        TickOutcome::Checked(Verdict::NotReady(failure)) => vec![
            OperatorCondition::new(
                KnownCondition::Progressing.as_str(),
                ConditionStatus::True,
                REASON_NOT_READY,
                format!("The well-known endpoint is not yet available: {failure}"),
            ),
            OperatorCondition::new(
                KnownCondition::Available.as_str(),
                ConditionStatus::False,
                REASON_NOT_READY,
                format!("The well-known endpoint is not yet available: {failure}"),
            ),
        ],
        TickOutcome::Checked(Verdict::Ready | Verdict::NotApplicable) => Vec::new(),
    }
}

/// Expand `found` into exactly one condition per known name.
///
/// The first condition found for a name wins; names without one get their
/// default status; unknown names are dropped.
pub fn complete_condition_set(found: Vec<OperatorCondition>) -> Vec<OperatorCondition> {
    for condition in &found {
        if KnownCondition::from_name(&condition.condition_type).is_none() {
            tracing::warn!(
                condition = condition.condition_type.as_str(),
                "dropping condition outside the controller's known set"
            );
        }
    }

    KnownCondition::ALL
        .into_iter()
        .map(|known| {
            found
                .iter()
                .find(|condition| condition.condition_type == known.as_str())
                .cloned()
                .unwrap_or_else(|| {
                    OperatorCondition::new(known.as_str(), known.default_status(), "", "")
                })
        })
        .collect()
}

/// Upstream prerequisite conditions plus the outcome's own, completed to the full set.
pub fn reduce(outcome: &TickOutcome, upstream: Vec<OperatorCondition>) -> Vec<OperatorCondition> {
    let mut found = upstream;
    found.extend(outcome_conditions(outcome));
    complete_condition_set(found)
}
