use super::policy::cmd_policy;
use super::run::cmd_run;
use super::settings::cmd_settings;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Settings(args) => cmd_settings(args, ctx).await,
        Commands::Policy(args) => cmd_policy(args, ctx).await,
    }
}
