use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use canary_core::pipeline::PassReport;
use serde::Serialize;

use crate::args::PassArgs;
use crate::output;

#[derive(Debug, Serialize)]
pub struct TransformOut<'a> {
    pub ok: bool,
    pub out: Option<&'a str>,
    pub report: &'a PassReport,
}

pub fn run(args: &PassArgs, out: Option<&str>) -> Result<()> {
    let mut inputs = super::load(args)?;

    let report = inputs
        .orchestrator
        .run_template(&inputs.service, &mut inputs.template)
        .context("canary pass failed")?;

    let rendered = inputs.template.to_json_pretty()?;
    match out {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }

    // The template may own stdout, so the summary goes to stderr unless it has a file.
    if output::is_json() {
        let summary = TransformOut {
            ok: true,
            out,
            report: &report,
        };
        if out.is_some() {
            output::print(&summary)?;
        } else {
            writeln!(std::io::stderr(), "{}", serde_json::to_string(&summary)?)?;
        }
    } else {
        output::write_report(&mut output::stderr(), &report)?;
    }
    Ok(())
}
