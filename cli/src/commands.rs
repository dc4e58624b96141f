pub mod bootstrap;
pub mod deploy;
pub mod outputs;
pub mod synth;

use crate::stage::StageName;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap the cross-account pipeline from scratch
    Bootstrap(bootstrap::BootstrapCommand),

    /// Synthesize and deploy one stack, or a whole stage
    Deploy(deploy::DeployCommand),

    /// Print the outputs of a deployed stack
    Outputs(outputs::OutputsCommand),

    /// Write every stack template to a directory
    Synth(synth::SynthCommand),
}

/// Target stage selector shared by the commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StageArg {
    Beta,
    Prod,
}

impl From<StageArg> for StageName {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Beta => StageName::Beta,
            StageArg::Prod => StageName::Prod,
        }
    }
}
