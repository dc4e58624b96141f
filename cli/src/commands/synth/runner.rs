use crate::commands::synth::SynthCommand;
use crate::config::Config;
use crate::error::Error;
use crate::runner::Runner;
use crate::stacks::{self, cross_account_role, pipeline, Kind, Stack, STAGE_ORDER};
use crate::stage::Stages;
use eyre::WrapErr;
use std::fs;

pub(crate) struct SynthRunner {
    pub(crate) command: SynthCommand,
}

impl Runner for SynthRunner {
    /// Write every stack template for every stage to the output directory
    async fn run(&mut self) -> Result<(), Error> {
        let config = Config::load(&std::env::current_dir().wrap_err("No working directory")?)?;
        let stages = config.stages()?;
        let stacks = all_stacks(&config, &stages)?;

        fs::create_dir_all(&self.command.out)
            .inspect_err(|e| log::error!("Failed to create {:?}: {e:?}", self.command.out))
            .wrap_err("Failed to create the output directory")?;

        for stack in &stacks {
            let path = self.command.out.join(format!("{}.yaml", stack.name));

            fs::write(&path, &stack.template)
                .inspect_err(|e| log::error!("Failed to write {path:?}: {e:?}"))
                .wrap_err("Failed to write a template")?;
        }

        let manifest = serde_json::json!({
            "stacks": stacks
                .iter()
                .map(|stack| {
                    serde_json::json!({
                        "name": stack.name,
                        "region": stack.region,
                        "capabilities": stack.capabilities,
                    })
                })
                .collect::<Vec<_>>(),
        });

        fs::write(
            self.command.out.join("manifest.json"),
            serde_json::to_string_pretty(&manifest).wrap_err("Failed to serialize the manifest")?,
        )
        .wrap_err("Failed to write the manifest")?;

        println!(
            "{} {} {} {}",
            console::style("Wrote").green().bold(),
            stacks.len(),
            console::style("templates to").dim(),
            self.command.out.display(),
        );

        Ok(())
    }
}

/// Every stack of the topology: stage stacks, role stacks, the pipeline
fn all_stacks(config: &Config, stages: &Stages) -> eyre::Result<Vec<Stack>> {
    let mut synthesized = Vec::new();

    for stage in stages.ordered() {
        for kind in STAGE_ORDER {
            // Domain-dependent stacks only exist once a domain is configured
            if stage.domain.is_none()
                && matches!(kind, Kind::Certificate | Kind::Cdn | Kind::Domain)
            {
                continue;
            }

            synthesized.push(stacks::synthesize(kind, config, stage)?);
        }

        synthesized.push(cross_account_role::synthesize(config, stage, None));
    }

    if config.github.owner.is_empty() || config.github.repo.is_empty() {
        log::warn!("github.owner/github.repo not set, skipping the pipeline stack");
    } else {
        synthesized.push(pipeline::synthesize(config, stages)?);
    }

    Ok(synthesized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support;

    #[test]
    fn synthesizes_the_whole_topology() {
        let config = test_support::config("frontend", Some("example.com"));
        let stacks = all_stacks(&config, &config.stages().unwrap()).unwrap();

        // 8 stage stacks and a roles stack per stage, plus the pipeline
        assert_eq!(stacks.len(), 2 * 9 + 1);

        let names: Vec<_> = stacks.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Betauswest2ServiceStack"));
        assert!(names.contains(&"Produswest2ServiceStack"));
        assert!(names.contains(&"FrontendBetauswest2DeviceFarmStack"));
        assert!(names.contains(&"FrontendPipelineStack"));
    }

    #[test]
    fn stack_names_are_unique() {
        let config = test_support::config("frontend", Some("example.com"));
        let stacks = all_stacks(&config, &config.stages().unwrap()).unwrap();

        let mut names: Vec<_> = stacks.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), stacks.len());
    }

    #[test]
    fn domainless_projects_skip_the_domain_stacks() {
        let config = test_support::config("frontend", None);
        let stacks = all_stacks(&config, &config.stages().unwrap()).unwrap();

        assert!(!stacks.iter().any(|s| s.name.contains("Cdn")));
        assert!(!stacks.iter().any(|s| s.name.contains("Certificate")));
    }
}
