use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// Static-site bucket
///
/// The bucket is private, the CDN identity is its only reader. The pipeline's
/// sync step writes content into it through the stage's deployment role.
pub fn synthesize(config: &Config, stage: &StageConfig) -> Stack {
    let name = naming::bucket_stack_name(stage.name.as_str(), &stage.region);
    let bucket_name =
        naming::site_bucket_name(&config.project, stage.name.as_str(), &stage.account);

    // User-facing content survives stack deletion in prod only
    let deletion_policy = if stage.is_production {
        "Retain"
    } else {
        "Delete"
    };

    let template = format!(
        "Description: Static site bucket for the {stage_name} stage
Resources:
    SiteBucket:
        Type: AWS::S3::Bucket
        DeletionPolicy: {deletion_policy}
        UpdateReplacePolicy: {deletion_policy}
        Properties:
            BucketName: {bucket_name}
            BucketEncryption:
                ServerSideEncryptionConfiguration:
                    - ServerSideEncryptionByDefault:
                          SSEAlgorithm: AES256
            PublicAccessBlockConfiguration:
                BlockPublicAcls: true
                BlockPublicPolicy: true
                IgnorePublicAcls: true
                RestrictPublicBuckets: true
Outputs:
    SiteBucketName:
        Value: !Ref SiteBucket
        Export:
            Name: {name_export}
    SiteBucketArn:
        Value: !GetAtt SiteBucket.Arn
        Export:
            Name: {arn_export}
    SiteBucketRegionalDomainName:
        Value: !GetAtt SiteBucket.RegionalDomainName
        Export:
            Name: {domain_export}
",
        stage_name = stage.name,
        name_export = naming::export_name(&name, "SiteBucketName"),
        arn_export = naming::export_name(&name, "SiteBucketArn"),
        domain_export = naming::export_name(&name, "SiteBucketRegionalDomainName"),
    );

    Stack::new(name, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage(name: StageName) -> StageConfig {
        StageConfig {
            name,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: None,
        }
    }

    fn config() -> Config {
        crate::config::test_support::config("frontend", Some("example.com"))
    }

    #[test]
    fn prod_bucket_is_retained() {
        let stack = synthesize(&config(), &stage(StageName::Prod));
        assert!(stack.template.contains("DeletionPolicy: Retain"));
    }

    #[test]
    fn beta_bucket_is_not_retained() {
        let stack = synthesize(&config(), &stage(StageName::Beta));
        assert!(stack.template.contains("DeletionPolicy: Delete"));
    }

    #[test]
    fn bucket_name_carries_the_account_id() {
        let stack = synthesize(&config(), &stage(StageName::Beta));
        assert_eq!(stack.name, "Betauswest2BucketStack");
        assert!(stack
            .template
            .contains("BucketName: frontend-site-beta-111111111111"));
    }
}
