//! Function declarations and their deployment preferences.

use serde::{Deserialize, Serialize};

use crate::config::is_logical_id;
use crate::errors::{CanaryError, CanaryResult};
use crate::model::LogicalId;

/// A function as declared by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// User-facing function name (`hello`).
    pub name: String,
    /// Logical id of the function resource (`HelloLambdaFunction`).
    pub logical_id: LogicalId,
    /// Presence of a preference is the only trigger for canary treatment.
    pub deployment_preference: Option<DeploymentPreference>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, logical_id: impl Into<LogicalId>) -> Self {
        Self {
            name: name.into(),
            logical_id: logical_id.into(),
            deployment_preference: None,
        }
    }

    pub fn with_preference(mut self, preference: DeploymentPreference) -> Self {
        self.deployment_preference = Some(preference);
        self
    }
}

/// Per-function deployment preference, as written in the service definition.
///
/// ```yaml
/// deploymentPreference:
///   alias: live
///   type: Linear10PercentEvery1Minute
///   preTrafficHook: preHook
///   postTrafficHook: postHook
///   alarms: [ErrorsAlarm]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPreference {
    #[serde(default)]
    pub alias: Option<String>,

    /// CodeDeploy Lambda deployment config without the `CodeDeployDefault.Lambda` prefix.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub traffic_shifting: Option<String>,

    /// Function name (not logical id) of the before-traffic hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_traffic_hook: Option<String>,

    /// Function name (not logical id) of the after-traffic hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_traffic_hook: Option<String>,

    /// Logical ids of CloudWatch alarms that stop the deployment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<String>,
}

impl DeploymentPreference {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    pub fn with_traffic_shifting(mut self, config_name: impl Into<String>) -> Self {
        self.traffic_shifting = Some(config_name.into());
        self
    }

    pub fn with_pre_traffic_hook(mut self, function_name: impl Into<String>) -> Self {
        self.pre_traffic_hook = Some(function_name.into());
        self
    }

    pub fn with_post_traffic_hook(mut self, function_name: impl Into<String>) -> Self {
        self.post_traffic_hook = Some(function_name.into());
        self
    }

    pub fn with_alarm(mut self, alarm_logical_id: impl Into<String>) -> Self {
        self.alarms.push(alarm_logical_id.into());
        self
    }

    /// A traffic shifting type or any lifecycle hook asks CodeDeploy to drive the alias.
    pub fn requests_traffic_shifting(&self) -> bool {
        self.traffic_shifting.is_some()
            || self.pre_traffic_hook.is_some()
            || self.post_traffic_hook.is_some()
    }

    /// Check that the preference can be turned into well-formed resources.
    ///
    /// Returns the alias name on success.
    pub fn validate(&self, function: &str) -> CanaryResult<&str> {
        let alias = match self.alias.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => a,
            _ if self.requests_traffic_shifting() => {
                return Err(CanaryError::invalid_preference(
                    function,
                    "traffic shifting requested without an alias name",
                ))
            }
            _ => return Err(CanaryError::invalid_preference(function, "alias is required")),
        };

        // The alias name becomes part of a logical id.
        if !is_logical_id(alias) {
            return Err(CanaryError::invalid_preference(
                function,
                format!("alias `{alias}` must be alphanumeric"),
            ));
        }

        if let Some(t) = &self.traffic_shifting {
            if !is_logical_id(t) {
                return Err(CanaryError::invalid_preference(
                    function,
                    format!("traffic shifting type `{t}` must be alphanumeric"),
                ));
            }
        }

        for (field, hook) in [
            ("preTrafficHook", &self.pre_traffic_hook),
            ("postTrafficHook", &self.post_traffic_hook),
        ] {
            if hook.as_deref().is_some_and(|h| h.trim().is_empty()) {
                return Err(CanaryError::invalid_preference(
                    function,
                    format!("{field} must not be empty"),
                ));
            }
        }

        if let Some(bad) = self.alarms.iter().find(|a| !is_logical_id(a)) {
            return Err(CanaryError::invalid_preference(
                function,
                format!("alarm `{bad}` is not a logical id"),
            ));
        }

        Ok(alias)
    }
}

/// References attached to an alias update policy.
///
/// Assembled by the orchestrator; hook ids are logical ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficShiftingSettings {
    pub deployment_application_id: LogicalId,
    pub deployment_group_id: LogicalId,
    pub before_hook_function_id: Option<LogicalId>,
    pub after_hook_function_id: Option<LogicalId>,
}
