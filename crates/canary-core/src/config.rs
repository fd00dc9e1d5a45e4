//! Configuration for a canary pass.
//!
//! The core crate does not read files or environment variables. Hosts build a
//! `CoreConfig` (usually `CoreConfig::default()`, optionally deserialized from a
//! user file) and hand it to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::errors::{CanaryError, CanaryResult};

/// Global configuration container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Logical id of the shared CodeDeploy service role.
    #[serde(default = "CoreConfig::default_service_role_logical_id")]
    pub service_role_logical_id: String,

    /// Suffix appended to the stack-scoped name to form the application id.
    #[serde(default = "CoreConfig::default_application_suffix")]
    pub application_suffix: String,

    /// Managed policy attached to the service role.
    #[serde(default = "CoreConfig::default_service_role_policy_arn")]
    pub service_role_policy_arn: String,

    /// Emit an `AutoRollbackConfiguration` on deployment groups.
    #[serde(default = "CoreConfig::default_auto_rollback")]
    pub auto_rollback: bool,

    /// Events that trigger an automatic rollback.
    #[serde(default = "CoreConfig::default_rollback_events")]
    pub rollback_events: Vec<String>,

    /// Verify that created and rewritten resources only reference existing ids.
    #[serde(default = "CoreConfig::default_check_references")]
    pub check_references: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            service_role_logical_id: Self::default_service_role_logical_id(),
            application_suffix: Self::default_application_suffix(),
            service_role_policy_arn: Self::default_service_role_policy_arn(),
            auto_rollback: Self::default_auto_rollback(),
            rollback_events: Self::default_rollback_events(),
            check_references: Self::default_check_references(),
        }
    }
}

impl CoreConfig {
    fn default_service_role_logical_id() -> String {
        "CodeDeployServiceRole".to_string()
    }
    fn default_application_suffix() -> String {
        "DeploymentApplication".to_string()
    }
    fn default_service_role_policy_arn() -> String {
        "arn:aws:iam::aws:policy/service-role/AWSCodeDeployRoleForLambda".to_string()
    }
    fn default_auto_rollback() -> bool {
        true
    }
    fn default_rollback_events() -> Vec<String> {
        vec![
            "DEPLOYMENT_FAILURE".to_string(),
            "DEPLOYMENT_STOP_ON_ALARM".to_string(),
            "DEPLOYMENT_STOP_ON_REQUEST".to_string(),
        ]
    }
    fn default_check_references() -> bool {
        true
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> CanaryResult<()> {
    if !is_logical_id(&cfg.service_role_logical_id) {
        return Err(CanaryError::invalid_argument(
            "serviceRoleLogicalId must be a non-empty alphanumeric string",
        ));
    }

    if !is_logical_id(&cfg.application_suffix) {
        return Err(CanaryError::invalid_argument(
            "applicationSuffix must be a non-empty alphanumeric string",
        ));
    }

    if cfg.service_role_policy_arn.trim().is_empty() {
        return Err(CanaryError::invalid_argument(
            "serviceRolePolicyArn must not be empty",
        ));
    }

    if cfg.auto_rollback && cfg.rollback_events.is_empty() {
        return Err(CanaryError::invalid_argument(
            "autoRollback requires at least one rollback event",
        ));
    }

    Ok(())
}

/// CloudFormation logical ids are ASCII alphanumeric.
pub fn is_logical_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
