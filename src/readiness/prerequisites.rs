use crate::config::PrerequisiteConfig;
use crate::readiness::conditions::KnownCondition;
use crate::resources::{AuthConfigLister, AuthenticationConfig, OAuthRoute, RouteLister};
use crate::status::{ConditionStatus, OperatorCondition};

/// Prerequisite objects for one tick plus the degraded conditions raised while loading them.
#[derive(Clone, Debug, Default)]
pub struct Prerequisites {
    pub auth: Option<AuthenticationConfig>,
    pub route: Option<OAuthRoute>,
    pub conditions: Vec<OperatorCondition>,
}

impl Prerequisites {
    pub fn load(
        config: &PrerequisiteConfig,
        auth_configs: &dyn AuthConfigLister,
        routes: &dyn RouteLister,
    ) -> Self {
        let mut conditions = Vec::new();

        let auth = auth_configs.auth_config(&config.auth_config_name);
        if auth.is_none() {
            conditions.push(OperatorCondition::new(
                KnownCondition::AuthConfigDegraded.as_str(),
                ConditionStatus::True,
                "NotFound",
                format!(
                    "the authentication config `{}` was not found",
                    config.auth_config_name
                ),
            ));
        }

        let route = match routes.route(&config.route_namespace, &config.route_name) {
            None => {
                conditions.push(OperatorCondition::new(
                    KnownCondition::RouteDegraded.as_str(),
                    ConditionStatus::True,
                    "NotFound",
                    format!(
                        "the route {}/{} was not found",
                        config.route_namespace, config.route_name
                    ),
                ));
                None
            }
            Some(route) if route.host.trim().is_empty() => {
                conditions.push(OperatorCondition::new(
                    KnownCondition::RouteDegraded.as_str(),
                    ConditionStatus::True,
                    "FailedHost",
                    format!(
                        "the route {}/{} does not have a host address",
                        route.namespace, route.name
                    ),
                ));
                None
            }
            Some(route) => Some(route),
        };

        Self {
            auth,
            route,
            conditions,
        }
    }
}
