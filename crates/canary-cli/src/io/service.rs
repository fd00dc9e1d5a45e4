//! Service definition: the functions a host declares and their deployment preferences.
//!
//! ```yaml
//! service: canary
//! provider:
//!   stage: dev
//! functions:
//!   hello:
//!     handler: handler.hello
//!     deploymentPreference:
//!       alias: live
//!       type: Linear10PercentEvery1Minute
//! ```

use canary_core::host::{FunctionSource, Naming, ServerlessNaming};
use canary_core::model::{DeploymentPreference, FunctionDescriptor};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    pub service: String,

    #[serde(default)]
    pub provider: Provider,

    /// Declaration order is kept; functions without a body are allowed.
    #[serde(default)]
    pub functions: IndexMap<String, Option<FunctionDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    #[serde(default = "Provider::default_stage")]
    pub stage: String,
}

impl Default for Provider {
    fn default() -> Self {
        Self {
            stage: Self::default_stage(),
        }
    }
}

impl Provider {
    fn default_stage() -> String {
        "dev".to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    #[serde(default)]
    pub deployment_preference: Option<DeploymentPreference>,
}

impl ServiceDefinition {
    pub fn with_stage(mut self, stage: Option<String>) -> Self {
        if let Some(s) = stage {
            self.provider.stage = s;
        }
        self
    }

    pub fn naming(&self) -> ServerlessNaming {
        ServerlessNaming::new(self.service.clone(), self.provider.stage.clone())
    }
}

impl FunctionSource for ServiceDefinition {
    fn function_descriptors(&self) -> Vec<FunctionDescriptor> {
        let naming = self.naming();
        self.functions
            .iter()
            .map(|(name, def)| FunctionDescriptor {
                name: name.clone(),
                logical_id: naming.logical_id_for(name),
                deployment_preference: def.as_ref().and_then(|d| d.deployment_preference.clone()),
            })
            .collect()
    }
}
