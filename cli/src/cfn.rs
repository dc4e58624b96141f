use crate::stacks::Stack;
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, Parameter};
use eyre::{eyre, ContextCompat, WrapErr};
use std::collections::HashMap;

/// What a deploy call did to the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// CloudFormation client bound to one account and region
///
/// Target accounts are reached through their named profiles, the pipeline
/// account through the default credential chain.
pub struct Cfn {
    client: aws_sdk_cloudformation::Client,
}

impl Cfn {
    pub async fn new(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::v2025_01_17());

        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }

        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = loader.load().await;

        Cfn {
            client: aws_sdk_cloudformation::Client::new(&config),
        }
    }

    /// Create or update a stack and wait until the operation settles
    pub async fn deploy(&self, stack: &Stack) -> eyre::Result<Outcome> {
        let outcome = if self.exists(&stack.name).await? {
            self.update(stack).await?
        } else {
            self.create(stack).await?
        };

        if outcome != Outcome::Unchanged {
            self.wait_settled(&stack.name).await?;
        }

        Ok(outcome)
    }

    async fn create(&self, stack: &Stack) -> eyre::Result<Outcome> {
        self.client
            .create_stack()
            .stack_name(&stack.name)
            .template_body(&stack.template)
            .set_parameters(Some(parameters(stack)))
            .set_capabilities(Some(capabilities(stack)))
            .send()
            .await
            .wrap_err(format!("Failed to create stack {}", stack.name))?;

        Ok(Outcome::Created)
    }

    async fn update(&self, stack: &Stack) -> eyre::Result<Outcome> {
        let result = self
            .client
            .update_stack()
            .stack_name(&stack.name)
            .template_body(&stack.template)
            .set_parameters(Some(parameters(stack)))
            .set_capabilities(Some(capabilities(stack)))
            .send()
            .await;

        match result {
            Ok(_) => Ok(Outcome::Updated),
            Err(err) => {
                // CloudFormation reports a no-op update as an error
                if err
                    .message()
                    .unwrap_or_default()
                    .contains("No updates are to be performed")
                {
                    return Ok(Outcome::Unchanged);
                }

                Err(eyre!(err).wrap_err(format!("Failed to update stack {}", stack.name)))
            }
        }
    }

    pub async fn exists(&self, name: &str) -> eyre::Result<bool> {
        match self.client.describe_stacks().stack_name(name).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.message().unwrap_or_default().contains("does not exist") => Ok(false),
            Err(err) => Err(eyre!(err).wrap_err(format!("Failed to describe stack {name}"))),
        }
    }

    /// Poll the stack status until it leaves the in-progress states
    pub async fn wait_settled(&self, name: &str) -> eyre::Result<()> {
        loop {
            let status = self
                .describe(name)
                .await?
                .stack_status()
                .wrap_err("Missing stack status")?
                .as_str()
                .to_string();

            log::debug!("Stack {name} status: {status}");

            if status.ends_with("IN_PROGRESS") {
                tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                continue;
            }

            return match status.as_str() {
                "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => Ok(()),
                _ => Err(eyre!("Stack {name} settled in {status}")),
            };
        }
    }

    /// Typed stack outputs, the structured replacement for scraping CLI logs
    pub async fn outputs(&self, name: &str) -> eyre::Result<HashMap<String, String>> {
        Ok(self
            .describe(name)
            .await?
            .outputs()
            .iter()
            .filter_map(|output| {
                Some((
                    output.output_key()?.to_string(),
                    output.output_value()?.to_string(),
                ))
            })
            .collect())
    }

    /// Current value of one stack parameter
    pub async fn parameter(&self, name: &str, key: &str) -> eyre::Result<Option<String>> {
        Ok(self
            .describe(name)
            .await?
            .parameters()
            .iter()
            .find(|parameter| parameter.parameter_key() == Some(key))
            .and_then(|parameter| parameter.parameter_value())
            .map(String::from))
    }

    async fn describe(&self, name: &str) -> eyre::Result<aws_sdk_cloudformation::types::Stack> {
        self.client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .wrap_err(format!("Failed to describe stack {name}"))?
            .stacks()
            .first()
            .cloned()
            .wrap_err(format!("Stack {name} not found"))
    }
}

fn parameters(stack: &Stack) -> Vec<Parameter> {
    stack
        .parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn capabilities(stack: &Stack) -> Vec<Capability> {
    stack
        .capabilities
        .iter()
        .map(|capability| Capability::from(*capability))
        .collect()
}
