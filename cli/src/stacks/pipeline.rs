use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::{StageConfig, Stages};
use eyre::bail;

/// Output key under which the pipeline stack publishes its artifact key ARN
///
/// The bootstrap's second phase reads this value and feeds it back into the
/// target-account role stacks.
pub const ARTIFACT_KEY_OUTPUT: &str = "ArtifactKeyArn";

/// The pipeline account's stack: artifact key, artifact bucket, pipeline
///
/// Stage order is fixed: Source, Build, PipelineUpdate (self-mutate),
/// DeployBeta, PromoteToProd (manual), DeployProd. The deploy stages assume
/// the target accounts' deployment roles, which therefore must exist before
/// this stack can deploy.
pub fn synthesize(config: &Config, stages: &Stages) -> eyre::Result<Stack> {
    if config.github.owner.is_empty() || config.github.repo.is_empty() {
        bail!("The pipeline stack needs github.owner and github.repo set in crosswire.toml");
    }

    let name = naming::pipeline_stack_name(&config.project);
    let project = &config.project;
    let pipeline_account = &config.accounts.pipeline;
    let artifact_bucket = naming::artifact_bucket_name(project, pipeline_account);

    let beta_role = naming::role_arn(
        &stages.beta().account,
        &naming::deployment_role_name(project, stages.beta().name.as_str()),
    );

    let prod_role = naming::role_arn(
        &stages.prod().account,
        &naming::deployment_role_name(project, stages.prod().name.as_str()),
    );

    let beta_actions = deploy_stage_actions(config, stages.beta());
    let prod_actions = deploy_stage_actions(config, stages.prod());

    let template = format!(
        "Description: Cross-account delivery pipeline for {project}
Resources:
    ArtifactKey:
        Type: AWS::KMS::Key
        Properties:
            Description: Encrypts {project} pipeline artifacts shared with the target accounts
            EnableKeyRotation: true
            KeyPolicy:
                Version: '2012-10-17'
                Statement:
                    - Sid: AdministerByPipelineAccount
                      Effect: Allow
                      Principal:
                          AWS: arn:aws:iam::{pipeline_account}:root
                      Action: kms:*
                      Resource: '*'
                    - Sid: UseByDeploymentRoles
                      Effect: Allow
                      Principal:
                          AWS:
                              - {beta_role}
                              - {prod_role}
                      Action:
                          - kms:Decrypt
                          - kms:DescribeKey
                          - kms:Encrypt
                          - kms:ReEncrypt*
                          - kms:GenerateDataKey*
                      Resource: '*'
    ArtifactKeyAlias:
        Type: AWS::KMS::Alias
        Properties:
            AliasName: alias/{project}-artifacts
            TargetKeyId: !Ref ArtifactKey
    ArtifactBucket:
        Type: AWS::S3::Bucket
        Properties:
            BucketName: {artifact_bucket}
            BucketEncryption:
                ServerSideEncryptionConfiguration:
                    - ServerSideEncryptionByDefault:
                          SSEAlgorithm: aws:kms
                          KMSMasterKeyID: !GetAtt ArtifactKey.Arn
            PublicAccessBlockConfiguration:
                BlockPublicAcls: true
                BlockPublicPolicy: true
                IgnorePublicAcls: true
                RestrictPublicBuckets: true
    ArtifactBucketPolicy:
        Type: AWS::S3::BucketPolicy
        Properties:
            Bucket: !Ref ArtifactBucket
            PolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          AWS:
                              - {beta_role}
                              - {prod_role}
                      Action:
                          - s3:GetObject*
                          - s3:GetBucket*
                          - s3:List*
                      Resource:
                          - !GetAtt ArtifactBucket.Arn
                          - !Sub \"${{ArtifactBucket.Arn}}/*\"
    PipelineRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - codepipeline.amazonaws.com
                      Action:
                          - sts:AssumeRole
            Policies:
                - PolicyName: PipelinePolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - s3:GetObject*
                                - s3:PutObject*
                                - s3:GetBucket*
                                - s3:List*
                            Resource:
                                - !GetAtt ArtifactBucket.Arn
                                - !Sub \"${{ArtifactBucket.Arn}}/*\"
                          - Effect: Allow
                            Action:
                                - kms:Decrypt
                                - kms:DescribeKey
                                - kms:Encrypt
                                - kms:ReEncrypt*
                                - kms:GenerateDataKey*
                            Resource: !GetAtt ArtifactKey.Arn
                          - Effect: Allow
                            Action:
                                - codebuild:StartBuild
                                - codebuild:BatchGetBuilds
                            Resource:
                                - !GetAtt BuildProject.Arn
                                - !GetAtt PipelineUpdateProject.Arn
                                - !GetAtt SyncProject.Arn
                                - !GetAtt InvalidateProject.Arn
                          - Effect: Allow
                            Action:
                                - sts:AssumeRole
                            Resource:
                                - {beta_role}
                                - {prod_role}
    BuildRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - codebuild.amazonaws.com
                      Action:
                          - sts:AssumeRole
            Policies:
                - PolicyName: BuildPolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - logs:CreateLogGroup
                                - logs:CreateLogStream
                                - logs:PutLogEvents
                            Resource: '*'
                          - Effect: Allow
                            Action:
                                - s3:GetObject*
                                - s3:PutObject*
                                - s3:GetBucket*
                                - s3:List*
                            Resource:
                                - !GetAtt ArtifactBucket.Arn
                                - !Sub \"${{ArtifactBucket.Arn}}/*\"
                          - Effect: Allow
                            Action:
                                - kms:Decrypt
                                - kms:DescribeKey
                                - kms:Encrypt
                                - kms:ReEncrypt*
                                - kms:GenerateDataKey*
                            Resource: !GetAtt ArtifactKey.Arn
                          - Effect: Allow
                            Action:
                                - sts:AssumeRole
                            Resource:
                                - {beta_role}
                                - {prod_role}
    PipelineUpdateRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - codebuild.amazonaws.com
                      Action:
                          - sts:AssumeRole
            ManagedPolicyArns:
                - arn:aws:iam::aws:policy/AdministratorAccess
    BuildProject:
        Type: AWS::CodeBuild::Project
        Properties:
            Name: {project}-site-build
            ServiceRole: !GetAtt BuildRole.Arn
            Artifacts:
                Type: CODEPIPELINE
            Environment:
                Type: LINUX_CONTAINER
                ComputeType: BUILD_GENERAL1_SMALL
                Image: aws/codebuild/standard:7.0
                EnvironmentVariables:
                    - Name: PIPELINE_ACCOUNT_ID
                      Value: {pipeline_account}
                    - Name: BETA_ACCOUNT_ID
                      Value: {beta_account}
                    - Name: PROD_ACCOUNT_ID
                      Value: {prod_account}
            Source:
                Type: CODEPIPELINE
                BuildSpec: |
                    version: 0.2
                    phases:
                        install:
                            runtime-versions:
                                nodejs: 20
                            commands:
                                - curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y --profile minimal
                                - . \"$HOME/.cargo/env\"
                        build:
                            commands:
                                - cargo build --release --locked
                                - ./target/release/crosswire synth --out out
                                - npm ci
                                - npm run build
                    artifacts:
                        secondary-artifacts:
                            TemplateOut:
                                base-directory: out
                                files:
                                    - '**/*'
                            SiteOut:
                                base-directory: dist
                                files:
                                    - '**/*'
    PipelineUpdateProject:
        Type: AWS::CodeBuild::Project
        Properties:
            Name: {project}-pipeline-update
            ServiceRole: !GetAtt PipelineUpdateRole.Arn
            Artifacts:
                Type: CODEPIPELINE
            Environment:
                Type: LINUX_CONTAINER
                ComputeType: BUILD_GENERAL1_SMALL
                Image: aws/codebuild/standard:7.0
                EnvironmentVariables:
                    - Name: PIPELINE_ACCOUNT_ID
                      Value: {pipeline_account}
                    - Name: BETA_ACCOUNT_ID
                      Value: {beta_account}
                    - Name: PROD_ACCOUNT_ID
                      Value: {prod_account}
            Source:
                Type: CODEPIPELINE
                BuildSpec: |
                    version: 0.2
                    phases:
                        install:
                            commands:
                                - curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y --profile minimal
                                - . \"$HOME/.cargo/env\"
                        build:
                            commands:
                                - cargo build --release --locked
                                - ./target/release/crosswire deploy pipeline
    SyncProject:
        Type: AWS::CodeBuild::Project
        Properties:
            Name: {project}-content-sync
            ServiceRole: !GetAtt BuildRole.Arn
            Artifacts:
                Type: CODEPIPELINE
            Environment:
                Type: LINUX_CONTAINER
                ComputeType: BUILD_GENERAL1_SMALL
                Image: aws/codebuild/standard:7.0
            Source:
                Type: CODEPIPELINE
                BuildSpec: |
                    version: 0.2
                    phases:
                        build:
                            commands:
                                - CREDS=$(aws sts assume-role --role-arn \"$DEPLOY_ROLE_ARN\" --role-session-name content-sync --query Credentials --output json)
                                - export AWS_ACCESS_KEY_ID=$(echo \"$CREDS\" | jq -r .AccessKeyId)
                                - export AWS_SECRET_ACCESS_KEY=$(echo \"$CREDS\" | jq -r .SecretAccessKey)
                                - export AWS_SESSION_TOKEN=$(echo \"$CREDS\" | jq -r .SessionToken)
                                - aws s3 sync . \"s3://$SITE_BUCKET\" --delete
    InvalidateProject:
        Type: AWS::CodeBuild::Project
        Properties:
            Name: {project}-cache-invalidate
            ServiceRole: !GetAtt BuildRole.Arn
            Artifacts:
                Type: CODEPIPELINE
            Environment:
                Type: LINUX_CONTAINER
                ComputeType: BUILD_GENERAL1_SMALL
                Image: aws/codebuild/standard:7.0
            Source:
                Type: CODEPIPELINE
                BuildSpec: |
                    version: 0.2
                    phases:
                        build:
                            commands:
                                - CREDS=$(aws sts assume-role --role-arn \"$DEPLOY_ROLE_ARN\" --role-session-name cache-invalidate --query Credentials --output json)
                                - export AWS_ACCESS_KEY_ID=$(echo \"$CREDS\" | jq -r .AccessKeyId)
                                - export AWS_SECRET_ACCESS_KEY=$(echo \"$CREDS\" | jq -r .SecretAccessKey)
                                - export AWS_SESSION_TOKEN=$(echo \"$CREDS\" | jq -r .SessionToken)
                                - aws cloudfront create-invalidation --distribution-id \"$DISTRIBUTION_ID\" --paths \"/*\"
    Pipeline:
        Type: AWS::CodePipeline::Pipeline
        Properties:
            Name: {project}-delivery
            RoleArn: !GetAtt PipelineRole.Arn
            RestartExecutionOnUpdate: true
            ArtifactStore:
                Type: S3
                Location: !Ref ArtifactBucket
                EncryptionKey:
                    Id: !GetAtt ArtifactKey.Arn
                    Type: KMS
            Stages:
                - Name: Source
                  Actions:
                      - Name: GitHubSource
                        ActionTypeId:
                            Category: Source
                            Owner: ThirdParty
                            Provider: GitHub
                            Version: '1'
                        RunOrder: 1
                        Configuration:
                            Owner: {github_owner}
                            Repo: {github_repo}
                            Branch: {github_branch}
                            OAuthToken: '{{{{resolve:secretsmanager:{token_secret}:SecretString:token}}}}'
                            PollForSourceChanges: true
                        OutputArtifacts:
                            - Name: Source
                - Name: Build
                  Actions:
                      - Name: BuildSite
                        ActionTypeId:
                            Category: Build
                            Owner: AWS
                            Provider: CodeBuild
                            Version: '1'
                        RunOrder: 1
                        Configuration:
                            ProjectName: !Ref BuildProject
                        InputArtifacts:
                            - Name: Source
                        OutputArtifacts:
                            - Name: TemplateOut
                            - Name: SiteOut
                - Name: PipelineUpdate
                  Actions:
                      - Name: SelfMutate
                        ActionTypeId:
                            Category: Build
                            Owner: AWS
                            Provider: CodeBuild
                            Version: '1'
                        RunOrder: 1
                        Configuration:
                            ProjectName: !Ref PipelineUpdateProject
                        InputArtifacts:
                            - Name: Source
                - Name: DeployBeta
                  Actions:
{beta_actions}
                - Name: PromoteToProd
                  Actions:
                      - Name: Approve
                        ActionTypeId:
                            Category: Approval
                            Owner: AWS
                            Provider: Manual
                            Version: '1'
                        RunOrder: 1
                        Configuration:
                            CustomData: Approve to promote the current beta deployment to prod
                - Name: DeployProd
                  Actions:
{prod_actions}
Outputs:
    {key_output}:
        Value: !GetAtt ArtifactKey.Arn
        Export:
            Name: {key_export}
    ArtifactBucketName:
        Value: !Ref ArtifactBucket
    PipelineName:
        Value: !Ref Pipeline
",
        beta_account = stages.beta().account,
        prod_account = stages.prod().account,
        github_owner = config.github.owner,
        github_repo = config.github.repo,
        github_branch = config.github.branch,
        token_secret = config.github.token_secret,
        key_output = ARTIFACT_KEY_OUTPUT,
        key_export = naming::export_name(&name, ARTIFACT_KEY_OUTPUT),
    );

    let mut stack = Stack::new(name, template);
    stack.capabilities = vec!["CAPABILITY_IAM"];
    Ok(stack)
}

/// Ordered deploy actions of one target stage
///
/// Run orders are explicit, the sequence is bucket, cdn, domain, contact
/// form, then content sync, cache invalidation, and a manual confirmation of
/// the invalidation. Prod mirrors beta exactly.
fn deploy_stage_actions(config: &Config, stage: &StageConfig) -> String {
    let stage_name = stage.name.as_str();
    let region = &stage.region;

    let deploy_role = naming::role_arn(
        &stage.account,
        &naming::deployment_role_name(&config.project, stage_name),
    );

    let execution_role = naming::role_arn(
        &stage.account,
        &naming::execution_role_name(&config.project, stage_name),
    );

    let bucket_stack = naming::bucket_stack_name(stage_name, region);
    let cdn_stack = naming::cdn_stack_name(stage_name, region);
    let domain_stack = naming::domain_stack_name(stage_name, region);
    let contact_form_stack = naming::contact_form_stack_name(stage_name, region);

    let cloudformation_action = |name: &str, run_order: u32, stack: &str, extra: &str| {
        format!(
            "                      - Name: {name}
                        ActionTypeId:
                            Category: Deploy
                            Owner: AWS
                            Provider: CloudFormation
                            Version: '1'
                        RunOrder: {run_order}
                        RoleArn: {deploy_role}
                        Namespace: {stage_name}{name}
                        InputArtifacts:
                            - Name: TemplateOut
                        Configuration:
                            ActionMode: CREATE_UPDATE
                            StackName: {stack}
                            TemplatePath: TemplateOut::{stack}.yaml
                            RoleArn: {execution_role}{extra}
"
        )
    };

    let codebuild_action = |name: &str, run_order: u32, project: &str, input: &str, env: &str| {
        format!(
            "                      - Name: {name}
                        ActionTypeId:
                            Category: Build
                            Owner: AWS
                            Provider: CodeBuild
                            Version: '1'
                        RunOrder: {run_order}
                        Configuration:
                            ProjectName: !Ref {project}
                            EnvironmentVariables: '{env}'
                        InputArtifacts:
                            - Name: {input}
"
        )
    };

    let sync_env = format!(
        "[{{\"name\":\"SITE_BUCKET\",\"value\":\"#{{{stage_name}DeployBucket.SiteBucketName}}\"}},{{\"name\":\"DEPLOY_ROLE_ARN\",\"value\":\"{deploy_role}\"}}]"
    );

    let invalidate_env = format!(
        "[{{\"name\":\"DISTRIBUTION_ID\",\"value\":\"#{{{stage_name}DeployCdn.DistributionId}}\"}},{{\"name\":\"DEPLOY_ROLE_ARN\",\"value\":\"{deploy_role}\"}}]"
    );

    let confirm_action = format!(
        "                      - Name: ConfirmCacheInvalidation
                        ActionTypeId:
                            Category: Approval
                            Owner: AWS
                            Provider: Manual
                            Version: '1'
                        RunOrder: 7
                        Configuration:
                            CustomData: Confirm the {stage_name} cache invalidation has completed
"
    );

    [
        cloudformation_action("DeployBucket", 1, &bucket_stack, ""),
        cloudformation_action("DeployCdn", 2, &cdn_stack, ""),
        cloudformation_action("DeployDomain", 3, &domain_stack, ""),
        cloudformation_action(
            "DeployContactForm",
            4,
            &contact_form_stack,
            "
                            Capabilities: CAPABILITY_IAM",
        ),
        codebuild_action("SyncContent", 5, "SyncProject", "SiteOut", &sync_env),
        codebuild_action("InvalidateCache", 6, "InvalidateProject", "Source", &invalidate_env),
        confirm_action,
    ]
    .join("")
    .trim_end_matches('\n')
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support;

    fn synthesized() -> Stack {
        let config = test_support::config("frontend", Some("example.com"));
        synthesize(&config, &config.stages().unwrap()).unwrap()
    }

    #[test]
    fn stage_sequence_is_fixed() {
        let template = synthesized().template;

        let order: Vec<_> = [
            "- Name: Source\n",
            "- Name: Build\n",
            "- Name: PipelineUpdate\n",
            "- Name: DeployBeta\n",
            "- Name: PromoteToProd\n",
            "- Name: DeployProd\n",
        ]
        .iter()
        .map(|stage| template.find(stage).expect(stage))
        .collect();

        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted, "pipeline stages out of order");
    }

    #[test]
    fn deploy_sub_steps_carry_explicit_run_orders() {
        let template = synthesized().template;

        for run_order in 1..=7 {
            assert!(
                template.contains(&format!("RunOrder: {run_order}")),
                "missing RunOrder {run_order}",
            );
        }
    }

    #[test]
    fn deploy_actions_assume_the_target_account_roles() {
        let template = synthesized().template;

        assert!(template
            .contains("RoleArn: arn:aws:iam::111111111111:role/frontend-deployment-beta"));
        assert!(template
            .contains("RoleArn: arn:aws:iam::222222222222:role/frontend-deployment-prod"));
    }

    #[test]
    fn key_policy_grants_both_deployment_roles() {
        let template = synthesized().template;

        assert!(template.contains("- arn:aws:iam::111111111111:role/frontend-deployment-beta"));
        assert!(template.contains("- arn:aws:iam::222222222222:role/frontend-deployment-prod"));
    }

    #[test]
    fn token_comes_from_the_secrets_vault() {
        let template = synthesized().template;
        assert!(template.contains("'{{resolve:secretsmanager:github-token:SecretString:token}}'"));
    }

    #[test]
    fn key_arn_is_published_as_an_output() {
        let template = synthesized().template;
        assert!(template.contains("ArtifactKeyArn:\n        Value: !GetAtt ArtifactKey.Arn"));
    }

    #[test]
    fn missing_github_config_is_an_error() {
        let config = test_support::config("frontend", Some("example.com"));

        let mut broken = config.clone();
        broken.github.owner = String::new();

        assert!(synthesize(&broken, &config.stages().unwrap()).is_err());
    }
}
