//! Host collaborators and the logical-id naming policy.
//!
//! The transform does not know how a host discovers functions or names its
//! resources. Hosts implement `FunctionSource` and `Naming`; the resource map
//! itself is passed to the orchestrator as a `&mut` handle.

use crate::model::{FunctionDescriptor, LogicalId};

/// Supplies the declared functions, in declaration order.
pub trait FunctionSource {
    fn function_descriptors(&self) -> Vec<FunctionDescriptor>;
}

impl FunctionSource for [FunctionDescriptor] {
    fn function_descriptors(&self) -> Vec<FunctionDescriptor> {
        self.to_vec()
    }
}

impl FunctionSource for Vec<FunctionDescriptor> {
    fn function_descriptors(&self) -> Vec<FunctionDescriptor> {
        self.clone()
    }
}

/// Naming conventions of the host framework.
///
/// Implementations must be pure: the same input always yields the same id.
pub trait Naming {
    /// Logical id of the function resource for a user-facing function name.
    fn logical_id_for(&self, function_name: &str) -> LogicalId;

    /// Alphanumeric identifier combining the stack name with `suffix`.
    fn stack_scoped_name(&self, suffix: &str) -> String;
}

/// Deployment group id for a function.
pub fn deployment_group_logical_id(function_id: &str) -> LogicalId {
    format!("{function_id}DeploymentGroup")
}

/// Alias id for a function and alias name.
pub fn alias_logical_id(function_id: &str, alias: &str) -> LogicalId {
    format!("{function_id}Alias{alias}")
}

/// Serverless Framework naming (`hello` -> `HelloLambdaFunction`, stack `service-stage`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessNaming {
    pub service: String,
    pub stage: String,
}

impl ServerlessNaming {
    pub fn new(service: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            stage: stage.into(),
        }
    }

    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
    }
}

impl Naming for ServerlessNaming {
    fn logical_id_for(&self, function_name: &str) -> LogicalId {
        let normalized = function_name.replace('-', "Dash").replace('_', "Underscore");
        format!("{}LambdaFunction", capitalize(&normalized))
    }

    fn stack_scoped_name(&self, suffix: &str) -> String {
        let alnum: String = self
            .stack_name()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        format!("{}{suffix}", capitalize(&alnum))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
