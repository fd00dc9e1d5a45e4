//! canary-core
//!
//! Template transform that wires CodeDeploy canary/linear traffic shifting
//! into compiled CloudFormation templates:
//! - Template/resource model with explicit reference forms
//! - Version, method and permission lookup over the resource map
//! - Builders for the CodeDeploy application, service role, groups and aliases
//! - API Gateway integration retargeting
//! - A transactional, single-pass orchestrator
//!
//! The crate does no I/O. Hosts supply functions and naming through the
//! traits in `host` and own the template.

pub mod config;
pub mod errors;
pub mod host;
pub mod integrity;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod rewrite;
pub mod synth;

pub use crate::errors::{CanaryError, CanaryResult};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::CoreConfig;
    pub use crate::host::{FunctionSource, Naming, ServerlessNaming};
    pub use crate::model::{
        DeploymentPreference, FunctionDescriptor, PropertyTree, Resource, ResourceMap,
        ResourceType, Template,
    };
    pub use crate::pipeline::{CanaryOrchestrator, Diagnostic, DiagnosticLevel, PassReport, Phase};
    pub use crate::{CanaryError, CanaryResult};
}
