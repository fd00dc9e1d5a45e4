use anyhow::{Context, Result};
use canary_core::host::ServerlessNaming;
use canary_core::model::Template;
use canary_core::pipeline::CanaryOrchestrator;
use tracing::debug;

use crate::args::{Cli, Command, PassArgs};
use crate::io::input;
use crate::io::service::ServiceDefinition;

mod plan;
mod transform;

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Transform { pass, out } => transform::run(&pass, out.as_deref()),
        Command::Plan { pass } => plan::run(&pass),
    }
}

/// Everything a pass needs, loaded from the command line arguments.
pub struct PassInputs {
    pub template: Template,
    pub service: ServiceDefinition,
    pub orchestrator: CanaryOrchestrator<ServerlessNaming>,
}

pub fn load(args: &PassArgs) -> Result<PassInputs> {
    let template = input::read_template(&args.template)?;
    let service = input::read_structured_file::<ServiceDefinition, _>(&args.service)
        .context("loading service definition")?
        .with_stage(args.stage.clone());
    let config = input::read_config(args.config.as_deref())?;

    debug!(
        resources = template.resources.len(),
        functions = service.functions.len(),
        stage = %service.provider.stage,
        "inputs loaded"
    );

    let orchestrator = CanaryOrchestrator::new(service.naming(), config)?;
    Ok(PassInputs {
        template,
        service,
        orchestrator,
    })
}
