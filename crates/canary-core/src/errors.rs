//! Error types for canary-core.
//!
//! Every fallible operation in this crate returns `CanaryResult<T>`. A pass is
//! fail-fast: the first error aborts it and the caller's resource map is left
//! as it was before the pass started.
//!
//! Conditions that are worth surfacing but do not abort a pass (ambiguous
//! version resources, functions without HTTP exposure) are reported as
//! diagnostics on the pass report instead, see `crate::pipeline`.

use crate::model::LogicalId;

/// Result alias used across the crate.
pub type CanaryResult<T> = Result<T, CanaryError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CanaryError {
    /// A function declares a deployment preference but nothing publishes a version of it.
    #[error("function {function} has a deployment preference but no AWS::Lambda::Version references it")]
    MissingVersionResource { function: LogicalId },

    /// The deployment preference cannot be turned into well-formed resources.
    #[error("invalid deployment preference for function {function}: {reason}")]
    InvalidDeploymentPreference { function: String, reason: String },

    /// A resource created or rewritten by the pass points at a logical id that does not exist.
    #[error("resource {resource} references unknown logical id {target}")]
    DanglingReference { resource: LogicalId, target: String },

    #[error("invalid Fn::Sub pattern `{pattern}`: {reason}")]
    InvalidSubPattern { pattern: String, reason: String },

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CanaryError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_template(msg: impl Into<String>) -> Self {
        Self::InvalidTemplate(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn invalid_preference(function: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDeploymentPreference {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used by CLI JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingVersionResource { .. } => "version.missing",
            Self::InvalidDeploymentPreference { .. } => "preference.invalid",
            Self::DanglingReference { .. } => "reference.dangling",
            Self::InvalidSubPattern { .. } => "sub.invalid",
            Self::InvalidTemplate(_) => "template.invalid",
            Self::InvalidArgument(_) => "argument.invalid",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for CanaryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
