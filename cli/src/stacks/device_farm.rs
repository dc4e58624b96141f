use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// Browser test grid for end-to-end tests against the stage
///
/// The stack name carries the account prefix since several account groups may
/// own a grid of the same kind in the same region.
pub fn synthesize(config: &Config, stage: &StageConfig) -> Stack {
    let stage_name = stage.name.as_str();

    let name = naming::device_farm_stack_name(stage_name, &stage.region, &config.account_prefix);

    let template = format!(
        "Description: Browser test grid for the {stage_name} stage
Resources:
    TestGridProject:
        Type: AWS::DeviceFarm::TestGridProject
        Properties:
            Name: {project}-{stage_lower}-grid
Outputs:
    TestGridProjectArn:
        Value: !GetAtt TestGridProject.Arn
",
        project = config.project,
        stage_lower = stage_name.to_lowercase(),
    );

    Stack::new(name, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    #[test]
    fn stack_name_carries_the_account_prefix() {
        let config = crate::config::test_support::config("front-end", None);

        let stack = synthesize(
            &config,
            &StageConfig {
                name: StageName::Beta,
                account: "111111111111".into(),
                region: "us-west-2".into(),
                is_production: false,
                domain: None,
            },
        );

        assert_eq!(stack.name, "FrontEndBetauswest2DeviceFarmStack");
    }
}
