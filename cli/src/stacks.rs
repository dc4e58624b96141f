pub mod bucket;
pub mod cdn;
pub mod certificate;
pub mod contact_form;
pub mod cross_account_role;
pub mod device_farm;
pub mod domain;
pub mod network;
pub mod pipeline;
pub mod service;

use crate::config::Config;
use crate::stage::StageConfig;

/// A synthesized CloudFormation stack, deployable as a unit
#[derive(Debug, Clone)]
pub struct Stack {
    pub name: String,

    /// Template body, YAML
    pub template: String,

    /// Concrete parameter values to pass on deploy
    pub parameters: Vec<(String, String)>,

    /// IAM capabilities CloudFormation demands for the template
    pub capabilities: Vec<&'static str>,

    /// Some stacks must live in a fixed region regardless of the stage region
    pub region: Option<String>,
}

impl Stack {
    fn new(name: String, template: String) -> Self {
        Stack {
            name,
            template,
            parameters: Vec::new(),
            capabilities: Vec::new(),
            region: None,
        }
    }
}

/// Resource groups addressable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Kind {
    Network,
    Bucket,
    Certificate,
    Cdn,
    Domain,
    ContactForm,
    Service,
    DeviceFarm,
    Roles,
    Pipeline,
}

/// Per-stage stacks in deployment order
///
/// Producers come before the consumers of their exports: the CDN imports the
/// bucket outputs, the domain imports the CDN outputs, the service imports
/// network and contact-form outputs.
pub const STAGE_ORDER: [Kind; 8] = [
    Kind::Network,
    Kind::Bucket,
    Kind::Certificate,
    Kind::Cdn,
    Kind::Domain,
    Kind::ContactForm,
    Kind::Service,
    Kind::DeviceFarm,
];

/// Synthesize one stage-scoped stack
///
/// The pipeline and roles stacks are not stage-scoped in the same way and
/// have their own synthesizers.
pub fn synthesize(kind: Kind, config: &Config, stage: &StageConfig) -> eyre::Result<Stack> {
    match kind {
        Kind::Network => Ok(network::synthesize(config, stage)),
        Kind::Bucket => Ok(bucket::synthesize(config, stage)),
        Kind::Certificate => certificate::synthesize(stage),
        Kind::Cdn => cdn::synthesize(stage),
        Kind::Domain => domain::synthesize(stage),
        Kind::ContactForm => Ok(contact_form::synthesize(config, stage)),
        Kind::Service => Ok(service::synthesize(config, stage)),
        Kind::DeviceFarm => Ok(device_farm::synthesize(config, stage)),
        Kind::Roles => Ok(cross_account_role::synthesize(config, stage, None)),
        Kind::Pipeline => eyre::bail!("The pipeline stack is not stage-scoped"),
    }
}
