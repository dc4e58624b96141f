mod runner;
use crate::commands::StageArg;
use crate::runner::{Runnable, Runner};
use clap::ArgAction;
use runner::OutputsRunner;

#[derive(clap::Args, Clone)]
pub(crate) struct OutputsCommand {
    /// Stack name, as printed by synth
    pub(crate) stack: String,

    /// Target stage account to read from, default is the pipeline account
    #[arg(short, long, value_enum)]
    pub(crate) stage: Option<StageArg>,

    /// Region override, e.g. us-east-1 for certificate stacks
    #[arg(long)]
    pub(crate) region: Option<String>,

    /// Print as JSON instead of a table
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) json: bool,
}

impl Runnable for OutputsCommand {
    fn runner(&self) -> impl Runner {
        OutputsRunner {
            command: self.clone(),
        }
    }
}
