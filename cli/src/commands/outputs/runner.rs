use crate::cfn::Cfn;
use crate::commands::outputs::OutputsCommand;
use crate::config::Config;
use crate::error::Error;
use crate::runner::Runner;
use eyre::WrapErr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled, Clone)]
struct OutputRow {
    #[tabled(rename = "Key")]
    key: String,

    #[tabled(rename = "Value")]
    value: String,
}

pub(crate) struct OutputsRunner {
    pub(crate) command: OutputsCommand,
}

impl Runner for OutputsRunner {
    /// Print a deployed stack's outputs as typed key/value pairs
    async fn run(&mut self) -> Result<(), Error> {
        let config = Config::load(&std::env::current_dir().wrap_err("No working directory")?)?;

        let profile = self
            .command
            .stage
            .map(|stage| config.profile(stage.into()).to_string());

        let region = self
            .command
            .region
            .clone()
            .unwrap_or_else(|| config.region.clone());

        let cfn = Cfn::new(profile.as_deref(), Some(&region)).await;

        if !cfn.exists(&self.command.stack).await? {
            return Err(self.error(
                Some("Stack not found"),
                Some("Check the stack name, stage, and region."),
                None,
            ));
        }

        let outputs = cfn.outputs(&self.command.stack).await?;

        if self.command.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&outputs).wrap_err("Failed to serialize outputs")?,
            );
            return Ok(());
        }

        if outputs.is_empty() {
            println!("{}", console::style("No outputs").yellow());
            return Ok(());
        }

        let mut rows: Vec<OutputRow> = outputs
            .into_iter()
            .map(|(key, value)| OutputRow { key, value })
            .collect();

        rows.sort_by(|a, b| a.key.cmp(&b.key));

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");

        Ok(())
    }
}
