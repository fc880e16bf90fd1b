use anyhow::Result;
use clap::{Args, Subcommand};

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PolicyCommand {
    /// Print the effective snapshot as YAML
    Show(PolicyShowArgs),
}

#[derive(Args, Clone, Debug)]
pub struct PolicyShowArgs {
    /// Leave out where each value came from
    #[arg(long)]
    pub no_provenance: bool,
}

pub async fn cmd_policy(args: PolicyArgs, ctx: &CliContext) -> Result<()> {
    match args.command {
        PolicyCommand::Show(show_args) => {
            let mut snapshot = ctx.policy()?;
            if show_args.no_provenance {
                snapshot.provenance.clear();
            }
            print!("{}", serde_yaml::to_string(&snapshot)?);
        }
    }
    Ok(())
}
