mod runner;
use crate::commands::StageArg;
use crate::runner::{Runnable, Runner};
use crate::stacks::Kind;
use clap::ArgAction;
use runner::DeployRunner;

#[derive(clap::Args, Clone)]
pub(crate) struct DeployCommand {
    /// Stack kind to deploy
    #[arg(value_enum)]
    pub(crate) kind: Option<Kind>,

    /// Target stage, required for every stage-scoped stack
    #[arg(short, long, value_enum)]
    pub(crate) stage: Option<StageArg>,

    /// Deploy every stack of the stage in dependency order
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) all: bool,

    /// Artifact key ARN to apply when deploying the roles stack
    #[arg(long)]
    pub(crate) key_arn: Option<String>,
}

impl Runnable for DeployCommand {
    fn runner(&self) -> impl Runner {
        DeployRunner {
            command: self.clone(),
        }
    }
}
