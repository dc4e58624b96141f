mod runner;
use crate::runner::{Runnable, Runner};
use clap::ArgAction;
use runner::BootstrapRunner;

#[derive(clap::Args, Clone)]
pub(crate) struct BootstrapCommand {
    /// Commit and push once bootstrap completes, triggering the first run
    #[arg(long, action = ArgAction::SetTrue)]
    pub(crate) push: bool,
}

impl Runnable for BootstrapCommand {
    fn runner(&self) -> impl Runner {
        BootstrapRunner {
            command: self.clone(),
        }
    }
}
