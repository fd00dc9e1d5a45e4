use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "canary",
    version,
    about = "Wire CodeDeploy canary/linear traffic shifting into compiled CloudFormation templates"
)]
pub struct Cli {
    /// Emit JSON output (results on stdout, logs on stderr).
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the pass and write the transformed template.
    Transform {
        #[command(flatten)]
        pass: PassArgs,

        /// Output file (default: stdout).
        #[arg(long)]
        out: Option<String>,
    },

    /// Run the pass and print what it would add and rewrite.
    Plan {
        #[command(flatten)]
        pass: PassArgs,
    },
}

/// Inputs shared by every command that runs a pass.
#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    /// Compiled CloudFormation template (JSON).
    pub template: String,

    /// Service definition declaring functions and deployment preferences (YAML or JSON).
    #[arg(long)]
    pub service: String,

    /// Override `provider.stage` from the service definition.
    #[arg(long)]
    pub stage: Option<String>,

    /// Optional core configuration file (YAML or JSON).
    #[arg(long)]
    pub config: Option<String>,
}
