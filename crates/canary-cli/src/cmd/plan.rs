use anyhow::{Context, Result};
use canary_core::pipeline::PassReport;
use serde::Serialize;

use crate::args::PassArgs;
use crate::output;

#[derive(Debug, Serialize)]
pub struct PlanOut {
    pub ok: bool,
    pub service: String,
    pub stage: String,
    pub report: PassReport,
}

pub fn run(args: &PassArgs) -> Result<()> {
    let mut inputs = super::load(args)?;

    let report = inputs
        .orchestrator
        .run_template(&inputs.service, &mut inputs.template)
        .context("canary pass failed")?;

    if output::is_json() {
        output::print(&PlanOut {
            ok: true,
            service: inputs.service.service.clone(),
            stage: inputs.service.provider.stage.clone(),
            report,
        })?;
    } else {
        output::write_report(&mut output::stdout(), &report)?;
    }
    Ok(())
}
