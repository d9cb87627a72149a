//! Operator status collaborator: spec access and condition submission.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl OperatorCondition {
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Desired operator configuration relevant to the readiness check.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSpec {
    /// Desired number of API server replicas, when the operator knows it.
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub unsupported_config_overrides: Option<JsonValue>,
}

#[async_trait]
pub trait OperatorClient: Send + Sync {
    async fn operator_spec(&self) -> Result<OperatorSpec>;

    /// Submit the complete desired condition set for one controller. The
    /// implementation merges it with what it already stores.
    async fn update_conditions(&self, conditions: Vec<OperatorCondition>) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCondition {
    pub condition: OperatorCondition,
    pub last_transition_time: DateTime<Utc>,
}

/// Status store keeping conditions in memory.
///
/// `last_transition_time` only moves when a condition's status changes.
#[derive(Default)]
pub struct InMemoryStatusStore {
    spec: RwLock<OperatorSpec>,
    spec_error: RwLock<Option<String>>,
    conditions: RwLock<BTreeMap<String, StoredCondition>>,
    submissions: AtomicU64,
}

impl InMemoryStatusStore {
    pub fn new(spec: OperatorSpec) -> Self {
        Self {
            spec: RwLock::new(spec),
            ..Self::default()
        }
    }

    pub async fn set_spec(&self, spec: OperatorSpec) {
        *self.spec.write().await = spec;
    }

    /// Make subsequent spec reads fail with `message`, or succeed again with `None`.
    pub async fn set_spec_error(&self, message: Option<String>) {
        *self.spec_error.write().await = message;
    }

    pub async fn condition(&self, condition_type: &str) -> Option<StoredCondition> {
        self.conditions.read().await.get(condition_type).cloned()
    }

    pub async fn conditions(&self) -> Vec<StoredCondition> {
        self.conditions.read().await.values().cloned().collect()
    }

    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OperatorClient for InMemoryStatusStore {
    async fn operator_spec(&self) -> Result<OperatorSpec> {
        if let Some(message) = self.spec_error.read().await.as_ref() {
            return Err(Error::OperatorClient(message.clone()));
        }
        Ok(self.spec.read().await.clone())
    }

    async fn update_conditions(&self, conditions: Vec<OperatorCondition>) -> Result<()> {
        let now = Utc::now();
        let mut guard = self.conditions.write().await;
        for condition in conditions {
            let previous = guard.get(&condition.condition_type);
            let last_transition_time = match previous {
                Some(stored) if stored.condition.status == condition.status => {
                    stored.last_transition_time
                }
                Some(stored) => {
                    tracing::info!(
                        condition = condition.condition_type.as_str(),
                        state_from = stored.condition.status.as_str(),
                        state_to = condition.status.as_str(),
                        reason = condition.reason.as_str(),
                        "condition transition"
                    );
                    now
                }
                None => now,
            };
            guard.insert(
                condition.condition_type.clone(),
                StoredCondition {
                    condition,
                    last_transition_time,
                },
            );
        }
        drop(guard);

        self.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
