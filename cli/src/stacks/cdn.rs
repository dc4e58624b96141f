use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;
use eyre::ContextCompat;

// CloudFront's managed CachingOptimized policy
const CLOUDFRONT_CACHING_OPTIMIZED: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// CDN distribution in front of the stage's site bucket
///
/// The distribution reads the bucket through an origin access identity, the
/// only principal the bucket policy lets in. The certificate ARN arrives as a
/// parameter since the certificate stack lives in us-east-1; until it is set
/// the distribution serves under the default CloudFront certificate with no
/// aliases, which lets the pipeline create the stack before the certificate
/// has been wired in. CloudFormation keeps the previous parameter value on
/// updates that do not override it.
pub fn synthesize(stage: &StageConfig) -> eyre::Result<Stack> {
    let domain = stage
        .domain
        .as_deref()
        .wrap_err("A CDN stack needs dns.domain set in crosswire.toml")?;

    let stage_name = stage.name.as_str();
    let name = naming::cdn_stack_name(stage_name, &stage.region);
    let bucket_stack = naming::bucket_stack_name(stage_name, &stage.region);

    let aliases = if stage.is_production {
        format!(
            "- {domain}
                      - www.{domain}"
        )
    } else {
        format!("- {domain}")
    };

    let template = format!(
        "Description: CDN for the {stage_name} site
Parameters:
    CertificateArn:
        Type: String
        Default: ''
        Description: Certificate covering {domain}, issued in us-east-1
Conditions:
    HasCertificate: !Not [!Equals [!Ref CertificateArn, '']]
Resources:
    OriginAccessIdentity:
        Type: AWS::CloudFront::CloudFrontOriginAccessIdentity
        Properties:
            CloudFrontOriginAccessIdentityConfig:
                Comment: Read access to the {stage_name} site bucket
    SiteBucketPolicy:
        Type: AWS::S3::BucketPolicy
        Properties:
            Bucket:
                Fn::ImportValue: {bucket_name_export}
            PolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          CanonicalUser: !GetAtt OriginAccessIdentity.S3CanonicalUserId
                      Action:
                          - s3:GetObject
                      Resource: !Sub
                          - \"${{BucketArn}}/*\"
                          - BucketArn:
                                Fn::ImportValue: {bucket_arn_export}
    Distribution:
        Type: AWS::CloudFront::Distribution
        Properties:
            DistributionConfig:
                Enabled: true
                Comment: {stage_name} site
                Aliases: !If
                    - HasCertificate
                    - {aliases}
                    - !Ref AWS::NoValue
                DefaultRootObject: index.html
                HttpVersion: http2
                Origins:
                    - Id: SiteBucketOrigin
                      DomainName:
                          Fn::ImportValue: {bucket_domain_export}
                      S3OriginConfig:
                          OriginAccessIdentity: !Sub origin-access-identity/cloudfront/${{OriginAccessIdentity}}
                DefaultCacheBehavior:
                    TargetOriginId: SiteBucketOrigin
                    ViewerProtocolPolicy: redirect-to-https
                    CachePolicyId: {caching_policy}
                    AllowedMethods:
                        - GET
                        - HEAD
                CustomErrorResponses:
                    - ErrorCode: 404
                      ResponseCode: 200
                      ResponsePagePath: /index.html
                ViewerCertificate: !If
                    - HasCertificate
                    - AcmCertificateArn: !Ref CertificateArn
                      MinimumProtocolVersion: TLSv1.2_2021
                      SslSupportMethod: sni-only
                    - CloudFrontDefaultCertificate: true
Outputs:
    DistributionId:
        Value: !Ref Distribution
        Export:
            Name: {id_export}
    DistributionDomainName:
        Value: !GetAtt Distribution.DomainName
        Export:
            Name: {domain_name_export}
",
        caching_policy = CLOUDFRONT_CACHING_OPTIMIZED,
        bucket_name_export = naming::export_name(&bucket_stack, "SiteBucketName"),
        bucket_arn_export = naming::export_name(&bucket_stack, "SiteBucketArn"),
        bucket_domain_export = naming::export_name(&bucket_stack, "SiteBucketRegionalDomainName"),
        id_export = naming::export_name(&name, "DistributionId"),
        domain_name_export = naming::export_name(&name, "DistributionDomainName"),
    );

    Ok(Stack::new(name, template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage(name: StageName, domain: &str) -> StageConfig {
        StageConfig {
            name,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: Some(domain.into()),
        }
    }

    #[test]
    fn imports_the_bucket_exports() {
        let stack = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();

        assert!(stack
            .template
            .contains("Fn::ImportValue: Betauswest2BucketStack-SiteBucketName"));
        assert!(stack
            .template
            .contains("Fn::ImportValue: Betauswest2BucketStack-SiteBucketRegionalDomainName"));
    }

    #[test]
    fn prod_aliases_include_www() {
        let stack = synthesize(&stage(StageName::Prod, "example.com")).unwrap();
        assert!(stack.template.contains("- www.example.com"));
    }

    #[test]
    fn certificate_is_an_optional_parameter() {
        let stack = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();

        assert!(stack.template.contains("AcmCertificateArn: !Ref CertificateArn"));
        assert!(stack.template.contains("CloudFrontDefaultCertificate: true"));
    }

    #[test]
    fn bucket_stays_private_behind_the_identity() {
        let stack = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();

        assert!(stack
            .template
            .contains("CanonicalUser: !GetAtt OriginAccessIdentity.S3CanonicalUserId"));
    }
}
