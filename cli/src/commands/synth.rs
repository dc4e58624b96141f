mod runner;
use crate::runner::{Runnable, Runner};
use runner::SynthRunner;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(crate) struct SynthCommand {
    /// Directory to write the templates into
    #[arg(short, long, default_value = "out")]
    pub(crate) out: PathBuf,
}

impl Runnable for SynthCommand {
    fn runner(&self) -> impl Runner {
        SynthRunner {
            command: self.clone(),
        }
    }
}
