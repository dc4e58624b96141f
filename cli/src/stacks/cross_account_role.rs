use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// Deployment roles the pipeline assumes inside a target account
///
/// The stack deploys twice during bootstrap: first bare, so the pipeline's
/// key policy can reference the role ARNs, then again with the generated key
/// ARN so the role may read encrypted artifacts. The `HasArtifactKey`
/// condition is what lets one template serve both phases.
pub fn synthesize(config: &Config, stage: &StageConfig, key_arn: Option<&str>) -> Stack {
    let stage_name = stage.name.as_str();
    let name = naming::deployment_roles_stack_name(stage_name, &stage.region);
    let deployment_role = naming::deployment_role_name(&config.project, stage_name);
    let execution_role = naming::execution_role_name(&config.project, stage_name);
    let artifact_bucket = naming::artifact_bucket_name(&config.project, &config.accounts.pipeline);

    let template = format!(
        "Description: Cross-account deployment roles for the {stage_name} stage
Parameters:
    ArtifactKeyArn:
        Type: String
        Default: ''
        Description: Artifact encryption key, unknown until the pipeline stack exists
Conditions:
    HasArtifactKey: !Not [!Equals [!Ref ArtifactKeyArn, '']]
Resources:
    DeploymentRole:
        Type: AWS::IAM::Role
        Properties:
            RoleName: {deployment_role}
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          AWS: arn:aws:iam::{pipeline_account}:root
                      Action:
                          - sts:AssumeRole
            Policies:
                - PolicyName: DeployPolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - cloudformation:CreateStack
                                - cloudformation:UpdateStack
                                - cloudformation:DeleteStack
                                - cloudformation:DescribeStacks
                                - cloudformation:DescribeStackEvents
                                - cloudformation:GetTemplate
                                - cloudformation:ValidateTemplate
                            Resource: arn:aws:cloudformation:*:{account}:stack/*
                          - Effect: Allow
                            Action:
                                - iam:PassRole
                            Resource: !GetAtt CloudFormationExecutionRole.Arn
                          - Effect: Allow
                            Action:
                                - s3:GetObject*
                                - s3:GetBucket*
                                - s3:List*
                            Resource:
                                - arn:aws:s3:::{artifact_bucket}
                                - arn:aws:s3:::{artifact_bucket}/*
                          - Effect: Allow
                            Action:
                                - s3:GetObject*
                                - s3:PutObject*
                                - s3:DeleteObject*
                                - s3:ListBucket
                            Resource:
                                - arn:aws:s3:::{site_bucket}
                                - arn:aws:s3:::{site_bucket}/*
                          - Effect: Allow
                            Action:
                                - cloudfront:CreateInvalidation
                            Resource: \"*\"
                - !If
                    - HasArtifactKey
                    - PolicyName: ArtifactKeyPolicy
                      PolicyDocument:
                          Version: '2012-10-17'
                          Statement:
                              - Effect: Allow
                                Action:
                                    - kms:Decrypt
                                    - kms:DescribeKey
                                    - kms:Encrypt
                                    - kms:ReEncrypt*
                                    - kms:GenerateDataKey*
                                Resource: !Ref ArtifactKeyArn
                    - !Ref AWS::NoValue
    CloudFormationExecutionRole:
        Type: AWS::IAM::Role
        Properties:
            RoleName: {execution_role}
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - cloudformation.amazonaws.com
                      Action:
                          - sts:AssumeRole
            ManagedPolicyArns:
                - arn:aws:iam::aws:policy/AdministratorAccess
Outputs:
    DeploymentRoleArn:
        Value: !GetAtt DeploymentRole.Arn
        Export:
            Name: {role_export}
    ExecutionRoleArn:
        Value: !GetAtt CloudFormationExecutionRole.Arn
        Export:
            Name: {execution_export}
    AppliedArtifactKeyArn:
        Value: !Ref ArtifactKeyArn
",
        pipeline_account = config.accounts.pipeline,
        account = stage.account,
        site_bucket = naming::site_bucket_name(&config.project, stage_name, &stage.account),
        role_export = naming::export_name(&name, "DeploymentRoleArn"),
        execution_export = naming::export_name(&name, "ExecutionRoleArn"),
    );

    let mut stack = Stack::new(name, template);
    stack.capabilities = vec!["CAPABILITY_NAMED_IAM"];

    if let Some(arn) = key_arn {
        stack
            .parameters
            .push(("ArtifactKeyArn".to_string(), arn.to_string()));
    }

    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage() -> StageConfig {
        StageConfig {
            name: StageName::Beta,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: false,
            domain: None,
        }
    }

    #[test]
    fn bare_phase_passes_no_parameters() {
        let config = crate::config::test_support::config("frontend", None);
        let stack = synthesize(&config, &stage(), None);

        assert!(stack.parameters.is_empty());
        assert!(stack.template.contains("Default: ''"));
    }

    #[test]
    fn patch_phase_passes_the_key_arn() {
        let config = crate::config::test_support::config("frontend", None);
        let arn = "arn:aws:kms:us-west-2:000000000000:key/11111111-2222-3333-4444-555555555555";
        let stack = synthesize(&config, &stage(), Some(arn));

        assert_eq!(
            stack.parameters,
            vec![("ArtifactKeyArn".to_string(), arn.to_string())],
        );
    }

    #[test]
    fn key_policy_is_conditional() {
        let config = crate::config::test_support::config("frontend", None);
        let stack = synthesize(&config, &stage(), None);

        assert!(stack.template.contains("HasArtifactKey:"));
        assert!(stack.template.contains("- !Ref AWS::NoValue"));
    }

    #[test]
    fn trusts_the_pipeline_account() {
        let config = crate::config::test_support::config("frontend", None);
        let stack = synthesize(&config, &stage(), None);

        assert!(stack
            .template
            .contains("AWS: arn:aws:iam::000000000000:root"));
        assert!(stack.capabilities.contains(&"CAPABILITY_NAMED_IAM"));
    }
}
