use crate::cfn::{Cfn, Outcome};
use crate::commands::deploy::DeployCommand;
use crate::config::Config;
use crate::error::Error;
use crate::naming;
use crate::runner::Runner;
use crate::stacks::{self, cross_account_role, pipeline, Kind, Stack, STAGE_ORDER};
use crate::stage::StageConfig;
use eyre::WrapErr;
use std::time::Instant;

pub(crate) struct DeployRunner {
    pub(crate) command: DeployCommand,
}

impl Runner for DeployRunner {
    async fn run(&mut self) -> Result<(), Error> {
        let config = Config::load(&std::env::current_dir().wrap_err("No working directory")?)?;
        let stages = config.stages()?;

        if self.command.all {
            let stage = stages.get(self.stage_arg()?.into());

            for kind in STAGE_ORDER {
                if stage.domain.is_none()
                    && matches!(kind, Kind::Certificate | Kind::Cdn | Kind::Domain)
                {
                    continue;
                }

                self.deploy_kind(kind, &config, stage).await?;
            }

            return Ok(());
        }

        match self.command.kind {
            Some(Kind::Pipeline) => {
                let stack = pipeline::synthesize(&config, &stages)?;
                let cfn = Cfn::new(None, Some(&config.region)).await;
                deploy(&cfn, &stack).await?;
            }

            Some(Kind::Roles) => {
                let stage = stages.get(self.stage_arg()?.into());
                let stack =
                    cross_account_role::synthesize(&config, stage, self.command.key_arn.as_deref());

                let cfn = Cfn::new(Some(config.profile(stage.name)), Some(&stage.region)).await;
                deploy(&cfn, &stack).await?;
            }

            Some(kind) => {
                let stage = stages.get(self.stage_arg()?.into());
                self.deploy_kind(kind, &config, stage).await?;
            }

            None => {
                return Err(self.error(
                    Some("Nothing to deploy"),
                    Some("Name a stack kind, or pass --all with --stage."),
                    None,
                ));
            }
        }

        Ok(())
    }
}

impl DeployRunner {
    fn stage_arg(&self) -> Result<crate::commands::StageArg, Error> {
        self.command.stage.ok_or_else(|| {
            self.error(
                Some("No stage selected"),
                Some("Pass --stage beta or --stage prod."),
                None,
            )
        })
    }

    /// Synthesize and deploy one stage-scoped stack
    async fn deploy_kind(
        &self,
        kind: Kind,
        config: &Config,
        stage: &StageConfig,
    ) -> eyre::Result<()> {
        let mut stack = stacks::synthesize(kind, config, stage)?;

        // The CDN needs the certificate ARN from us-east-1, wired at deploy
        // time because exports do not cross regions
        if kind == Kind::Cdn {
            match certificate_arn(config, stage).await? {
                Some(arn) => stack.parameters.push(("CertificateArn".to_string(), arn)),
                None => log::warn!(
                    "Certificate stack not deployed yet, the CDN keeps its previous certificate"
                ),
            }
        }

        let region = stack.region.clone().unwrap_or_else(|| stage.region.clone());
        let cfn = Cfn::new(Some(config.profile(stage.name)), Some(&region)).await;
        deploy(&cfn, &stack).await
    }
}

/// Certificate ARN from the stage's certificate stack, if it exists
async fn certificate_arn(config: &Config, stage: &StageConfig) -> eyre::Result<Option<String>> {
    let name = naming::certificate_stack_name(stage.name.as_str(), &stage.region);
    let cfn = Cfn::new(Some(config.profile(stage.name)), Some("us-east-1")).await;

    if !cfn.exists(&name).await? {
        return Ok(None);
    }

    Ok(cfn.outputs(&name).await?.get("CertificateArn").cloned())
}

async fn deploy(cfn: &Cfn, stack: &Stack) -> eyre::Result<()> {
    let start_time = Instant::now();

    println!(
        "{} {}...",
        console::style("Deploying").green().bold(),
        console::style(&stack.name).bold(),
    );

    match cfn.deploy(stack).await? {
        Outcome::Unchanged => {
            println!("    {}", console::style("Nothing to update").yellow());
        }
        _ => {
            println!(
                "    {} in {:.2}s",
                console::style("Finished").green().bold(),
                start_time.elapsed().as_secs_f64(),
            );
        }
    }

    Ok(())
}
