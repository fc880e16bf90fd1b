use clap::Subcommand;

use super::policy::PolicyArgs;
use super::run::RunArgs;
use super::settings::SettingsArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Attach to the browser and run one agent pass
    Run(RunArgs),

    /// Inspect or change the persisted booking settings
    Settings(SettingsArgs),

    /// Inspect the effective agent policy
    Policy(PolicyArgs),
}
