use crate::cfn::Cfn;
use crate::commands::bootstrap::BootstrapCommand;
use crate::config::Config;
use crate::error::Error;
use crate::git;
use crate::naming;
use crate::runner::Runner;
use crate::stacks::{cross_account_role, pipeline};
use crate::stage::{StageConfig, Stages};
use eyre::{bail, eyre, Report, WrapErr};
use futures::future;
use std::collections::HashMap;

/// Where the bootstrap currently stands, probed from live stack state
///
/// The deployment roles and the pipeline's artifact key depend on each other:
/// the key policy references the role ARNs, the roles' key grant references
/// the key ARN. Resolution is two deployments of the role stacks with the
/// pipeline stack in between, and every phase is derived from what actually
/// exists so a rerun continues where the last one stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// A role stack is missing in at least one target account
    SeedRoles,

    /// Roles exist, the pipeline stack or its key output do not
    DeployPipeline,

    /// The key exists but a role stack does not carry it yet
    PatchRoles,

    /// Both phases applied everywhere
    Complete,
}

fn next_phase(roles_exist: bool, key_arn: Option<&str>, roles_patched: bool) -> Phase {
    match (roles_exist, key_arn, roles_patched) {
        (false, ..) => Phase::SeedRoles,
        (true, None, _) => Phase::DeployPipeline,
        (true, Some(_), false) => Phase::PatchRoles,
        (true, Some(_), true) => Phase::Complete,
    }
}

/// Extract and validate the artifact key ARN from the pipeline stack outputs
///
/// The role-patching phase must never run with a missing or malformed value.
fn validated_key_arn(outputs: &HashMap<String, String>) -> eyre::Result<String> {
    let arn = outputs
        .get(pipeline::ARTIFACT_KEY_OUTPUT)
        .map(|value| value.trim())
        .unwrap_or_default();

    if arn.is_empty() {
        bail!(
            "The pipeline stack published no {} output",
            pipeline::ARTIFACT_KEY_OUTPUT,
        );
    }

    let pattern = regex::Regex::new(r"^arn:aws:kms:[a-z0-9-]+:\d{12}:key/.+$")
        .expect("the key ARN pattern is valid");

    if !pattern.is_match(arn) {
        bail!("The {} output is not a KMS key ARN: {arn}", pipeline::ARTIFACT_KEY_OUTPUT);
    }

    Ok(arn.to_string())
}

pub(crate) struct BootstrapRunner {
    pub(crate) command: BootstrapCommand,
}

impl Runner for BootstrapRunner {
    /// Drive the bootstrap state machine to completion
    async fn run(&mut self) -> Result<(), Error> {
        // Loading the config validates the account ids before any AWS call
        let config = Config::load(&std::env::current_dir().wrap_err("No working directory")?)?;
        let stages = config.stages()?;

        loop {
            match self.probe(&config, &stages).await? {
                Phase::SeedRoles => {
                    println!(
                        "{} {}",
                        console::style("Seeding deployment roles in").green().bold(),
                        console::style("beta and prod").bold(),
                    );

                    deploy_roles(&config, &stages, None).await?;
                }

                Phase::DeployPipeline => {
                    println!(
                        "{}",
                        console::style("Deploying the pipeline stack").green().bold(),
                    );

                    let key_arn = self.deploy_pipeline(&config, &stages).await?;

                    println!(
                        "    {} {}",
                        console::style("Artifact key").dim(),
                        console::style(&key_arn).bold(),
                    );
                }

                Phase::PatchRoles => {
                    println!(
                        "{}",
                        console::style("Granting the artifact key to the deployment roles")
                            .green()
                            .bold(),
                    );

                    let key_arn = self.pipeline_key_arn(&config).await?;
                    deploy_roles(&config, &stages, Some(&key_arn)).await?;
                }

                Phase::Complete => break,
            }
        }

        println!("{}", console::style("Bootstrap complete").green().bold());

        if self.command.push {
            git::push_trigger(&config.github.branch)?;
        }

        Ok(())
    }
}

impl BootstrapRunner {
    /// Derive the next phase from live stack state
    async fn probe(&self, config: &Config, stages: &Stages) -> eyre::Result<Phase> {
        let mut roles_exist = true;
        let mut roles_patched = true;

        let key_arn = match self.pipeline_key_arn(config).await {
            Ok(arn) => Some(arn),
            Err(_) => None,
        };

        for stage in stages.ordered() {
            let name = naming::deployment_roles_stack_name(stage.name.as_str(), &stage.region);
            let cfn = Cfn::new(Some(config.profile(stage.name)), Some(&stage.region)).await;

            if !cfn.exists(&name).await? {
                roles_exist = false;
                roles_patched = false;
                continue;
            }

            let applied = cfn.parameter(&name, "ArtifactKeyArn").await?;

            if key_arn.is_none() || applied.as_deref() != key_arn.as_deref() {
                roles_patched = false;
            }
        }

        let phase = next_phase(roles_exist, key_arn.as_deref(), roles_patched);
        log::debug!("Bootstrap phase: {phase:?}");
        Ok(phase)
    }

    /// Deploy the pipeline stack, then read back the generated key ARN
    async fn deploy_pipeline(&self, config: &Config, stages: &Stages) -> eyre::Result<String> {
        let stack = pipeline::synthesize(config, stages)?;
        let cfn = Cfn::new(None, Some(&config.region)).await;

        cfn.deploy(&stack)
            .await
            .wrap_err("Failed to deploy the pipeline stack")?;

        validated_key_arn(&cfn.outputs(&stack.name).await?)
    }

    /// The key ARN of an already-deployed pipeline stack
    async fn pipeline_key_arn(&self, config: &Config) -> eyre::Result<String> {
        let name = naming::pipeline_stack_name(&config.project);
        let cfn = Cfn::new(None, Some(&config.region)).await;

        if !cfn.exists(&name).await? {
            bail!("The pipeline stack is not deployed");
        }

        validated_key_arn(&cfn.outputs(&name).await?)
    }
}

/// Deploy the role stacks into both target accounts concurrently
///
/// Joins both deployments before returning, the next phase depends on them.
async fn deploy_roles(
    config: &Config,
    stages: &Stages,
    key_arn: Option<&str>,
) -> eyre::Result<()> {
    let handles: Vec<_> = stages
        .ordered()
        .into_iter()
        .map(|stage| spawn_role_deploy(config, stage, key_arn))
        .collect();

    let results: Vec<_> = future::join_all(handles)
        .await
        .into_iter()
        .map(|res| res.map_err(Report::msg).and_then(|inner| inner))
        .collect();

    let (.., errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);

    if !errors.is_empty() {
        log::error!(
            "Failed to deploy role stacks: {:?}",
            errors
                .into_iter()
                .map(Result::unwrap_err)
                .collect::<Vec<_>>(),
        );

        return Err(eyre!("Failed to deploy the deployment role stacks"));
    }

    Ok(())
}

fn spawn_role_deploy(
    config: &Config,
    stage: &StageConfig,
    key_arn: Option<&str>,
) -> tokio::task::JoinHandle<eyre::Result<()>> {
    let stack = cross_account_role::synthesize(config, stage, key_arn);
    let profile = config.profile(stage.name).to_string();
    let region = stage.region.clone();
    let stage_name = stage.name;

    tokio::spawn(async move {
        let cfn = Cfn::new(Some(&profile), Some(&region)).await;

        cfn.deploy(&stack)
            .await
            .wrap_err(format!("Failed to deploy roles to {stage_name}"))?;

        println!(
            "    {} {}",
            console::style("Settled").green().bold(),
            console::style(&stack.name).bold(),
        );

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "arn:aws:kms:us-west-2:000000000000:key/11111111-2222-3333-4444-555555555555";

    #[test]
    fn phases_advance_in_order() {
        assert_eq!(next_phase(false, None, false), Phase::SeedRoles);
        assert_eq!(next_phase(true, None, false), Phase::DeployPipeline);
        assert_eq!(next_phase(true, Some(KEY), false), Phase::PatchRoles);
        assert_eq!(next_phase(true, Some(KEY), true), Phase::Complete);
    }

    #[test]
    fn missing_roles_always_reseed() {
        // A half-applied state never skips the first phase
        assert_eq!(next_phase(false, Some(KEY), false), Phase::SeedRoles);
        assert_eq!(next_phase(false, Some(KEY), true), Phase::SeedRoles);
    }

    #[test]
    fn missing_key_output_aborts_before_patching() {
        assert!(validated_key_arn(&HashMap::new()).is_err());
    }

    #[test]
    fn empty_key_output_aborts_before_patching() {
        let outputs = HashMap::from([(pipeline::ARTIFACT_KEY_OUTPUT.to_string(), "  ".to_string())]);
        assert!(validated_key_arn(&outputs).is_err());
    }

    #[test]
    fn malformed_key_output_aborts_before_patching() {
        let outputs = HashMap::from([(
            pipeline::ARTIFACT_KEY_OUTPUT.to_string(),
            "arn:aws:s3:::some-bucket".to_string(),
        )]);

        assert!(validated_key_arn(&outputs).is_err());
    }

    #[test]
    fn valid_key_output_is_accepted() {
        let outputs = HashMap::from([(pipeline::ARTIFACT_KEY_OUTPUT.to_string(), KEY.to_string())]);
        assert_eq!(validated_key_arn(&outputs).unwrap(), KEY);
    }
}
