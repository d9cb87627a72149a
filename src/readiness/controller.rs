use crate::config::WellKnownConfig;
use crate::error::{Context, Error, Result};
use crate::readiness::conditions::{reduce, TickOutcome};
use crate::readiness::prerequisites::Prerequisites;
use crate::readiness::{CheckSources, ConvergenceChecker};
use crate::resources::{
    AuthConfigLister, ConfigMapLister, EndpointsLister, InMemoryResources, RouteLister,
    ServiceLister,
};
use crate::status::{OperatorClient, OperatorCondition};
use crate::telemetry::runtime_counters;
use crate::transport::WellKnownTransport;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Object caches the controller reads from.
#[derive(Clone)]
pub struct Listers {
    pub auth_configs: Arc<dyn AuthConfigLister>,
    pub routes: Arc<dyn RouteLister>,
    pub config_maps: Arc<dyn ConfigMapLister>,
    pub services: Arc<dyn ServiceLister>,
    pub endpoints: Arc<dyn EndpointsLister>,
}

impl Listers {
    pub fn from_resources(resources: Arc<InMemoryResources>) -> Self {
        Self {
            auth_configs: resources.clone(),
            routes: resources.clone(),
            config_maps: resources.clone(),
            services: resources.clone(),
            endpoints: resources,
        }
    }

    fn check_sources(&self) -> CheckSources<'_> {
        CheckSources {
            config_maps: self.config_maps.as_ref(),
            services: self.services.as_ref(),
            endpoints: self.endpoints.as_ref(),
        }
    }
}

/// What one tick decided and submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub conditions: Vec<OperatorCondition>,
}

#[derive(Clone)]
pub struct WellKnownReadyController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: WellKnownConfig,
    checker: ConvergenceChecker,
    listers: Listers,
    transport: Arc<dyn WellKnownTransport>,
    operator: Arc<dyn OperatorClient>,
    resync: Notify,
}

impl WellKnownReadyController {
    pub fn new(
        config: WellKnownConfig,
        listers: Listers,
        transport: Arc<dyn WellKnownTransport>,
        operator: Arc<dyn OperatorClient>,
    ) -> Self {
        let checker = ConvergenceChecker::new(&config);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                checker,
                listers,
                transport,
                operator,
                resync: Notify::new(),
            }),
        }
    }

    /// Run one reconciliation tick and submit all four conditions.
    ///
    /// Errors are limited to operator spec reads, condition submission and
    /// cancellation. A cancelled tick submits nothing.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<TickReport> {
        let inner = &self.inner;
        let started = Instant::now();

        let prerequisites = Prerequisites::load(
            &inner.config.prerequisites,
            inner.listers.auth_configs.as_ref(),
            inner.listers.routes.as_ref(),
        );

        let outcome = match (&prerequisites.auth, &prerequisites.route) {
            (Some(auth), Some(_)) => {
                let spec = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    spec = inner.operator.operator_spec() => {
                        spec.context("failed to read operator spec")?
                    }
                };
                let verdict = inner
                    .checker
                    .check(
                        auth,
                        &spec,
                        inner.listers.check_sources(),
                        inner.transport.as_ref(),
                        cancel,
                    )
                    .await?;
                TickOutcome::Checked(verdict)
            }
            _ => TickOutcome::PrerequisitesMissing,
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let conditions = reduce(&outcome, prerequisites.conditions);
        inner
            .operator
            .update_conditions(conditions.clone())
            .await
            .context("failed to submit well-known conditions")?;

        runtime_counters().record_tick(outcome.as_str());
        let elapsed = started.elapsed();
        match &outcome {
            TickOutcome::Checked(verdict) => match verdict.failure() {
                Some(failure) => tracing::info!(
                    verdict = verdict.as_str(),
                    class = failure.class().as_str(),
                    reason = %failure,
                    duration_ms = elapsed.as_millis() as u64,
                    "well-known endpoint not converged"
                ),
                None => tracing::debug!(
                    verdict = verdict.as_str(),
                    duration_ms = elapsed.as_millis() as u64,
                    "well-known readiness tick complete"
                ),
            },
            TickOutcome::PrerequisitesMissing => tracing::info!(
                verdict = outcome.as_str(),
                duration_ms = elapsed.as_millis() as u64,
                "well-known prerequisites not available"
            ),
        }

        Ok(TickReport {
            outcome,
            conditions,
        })
    }

    /// Tick on the resync interval, or sooner when a resync is requested,
    /// until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.inner.config.controller.resync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            resync_interval = %humantime::format_duration(self.inner.config.controller.resync_interval),
            "well-known readiness controller started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.inner.resync.notified() => {}
            }

            match self.sync(&shutdown).await {
                Ok(_) => {}
                Err(err) if err.is_cancelled() => break,
                Err(err) => {
                    tracing::warn!(error = %err, "well-known readiness tick failed");
                }
            }
        }

        tracing::info!("well-known readiness controller stopped");
    }

    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move { controller.run(shutdown).await })
    }

    /// Ask the running loop for an immediate tick, e.g. after a watched object changed.
    pub fn request_resync(&self) {
        self.inner.resync.notify_one();
    }
}
