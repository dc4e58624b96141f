use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;
use eyre::ContextCompat;

// Alias records pointing at CloudFront always use this hosted zone id
const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Hosted zone and records for the stage domain
///
/// Prod additionally carries the mail records and the NS delegation handing
/// the beta subdomain over to the beta account's zone. The delegation name
/// servers are a parameter because they only exist once the beta zone does.
pub fn synthesize(stage: &StageConfig) -> eyre::Result<Stack> {
    let domain = stage
        .domain
        .as_deref()
        .wrap_err("A domain stack needs dns.domain set in crosswire.toml")?;

    let stage_name = stage.name.as_str();
    let name = naming::domain_stack_name(stage_name, &stage.region);
    let cdn_stack = naming::cdn_stack_name(stage_name, &stage.region);
    let cdn_domain_export = naming::export_name(&cdn_stack, "DistributionDomainName");

    let parameters = if stage.is_production {
        "Parameters:
    BetaDelegationNameServers:
        Type: CommaDelimitedList
        Default: ''
        Description: Name servers of the beta subdomain zone, set once beta exists
Conditions:
    HasBetaDelegation: !Not [!Equals [!Join [',', !Ref BetaDelegationNameServers], '']]
"
    } else {
        ""
    };

    let prod_records = if stage.is_production {
        format!(
            "    WwwAliasRecord:
        Type: AWS::Route53::RecordSet
        Properties:
            HostedZoneId: !Ref HostedZone
            Name: www.{domain}
            Type: A
            AliasTarget:
                DNSName:
                    Fn::ImportValue: {cdn_domain_export}
                HostedZoneId: {cloudfront_zone}
    MailRecord:
        Type: AWS::Route53::RecordSet
        Properties:
            HostedZoneId: !Ref HostedZone
            Name: {domain}
            Type: MX
            TTL: '300'
            ResourceRecords:
                - 10 inbound-smtp.us-east-1.amazonaws.com
    SpfRecord:
        Type: AWS::Route53::RecordSet
        Properties:
            HostedZoneId: !Ref HostedZone
            Name: {domain}
            Type: TXT
            TTL: '300'
            ResourceRecords:
                - '\"v=spf1 include:amazonses.com ~all\"'
    BetaDelegationRecord:
        Type: AWS::Route53::RecordSet
        Condition: HasBetaDelegation
        Properties:
            HostedZoneId: !Ref HostedZone
            Name: beta.{domain}
            Type: NS
            TTL: '3600'
            ResourceRecords: !Ref BetaDelegationNameServers
",
            cloudfront_zone = CLOUDFRONT_HOSTED_ZONE_ID,
        )
    } else {
        String::new()
    };

    let template = format!(
        "Description: DNS for {domain}
{parameters}Resources:
    HostedZone:
        Type: AWS::Route53::HostedZone
        Properties:
            Name: {domain}
    SiteAliasRecord:
        Type: AWS::Route53::RecordSet
        Properties:
            HostedZoneId: !Ref HostedZone
            Name: {domain}
            Type: A
            AliasTarget:
                DNSName:
                    Fn::ImportValue: {cdn_domain_export}
                HostedZoneId: {cloudfront_zone}
{prod_records}Outputs:
    HostedZoneId:
        Value: !Ref HostedZone
        Export:
            Name: {zone_export}
    NameServers:
        Value: !Join [',', !GetAtt HostedZone.NameServers]
",
        cloudfront_zone = CLOUDFRONT_HOSTED_ZONE_ID,
        zone_export = naming::export_name(&name, "HostedZoneId"),
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
    fn delegation_record_is_prod_only() {
        let prod = synthesize(&stage(StageName::Prod, "example.com")).unwrap();
        assert!(prod.template.contains("BetaDelegationRecord:"));
        assert!(prod.template.contains("Condition: HasBetaDelegation"));

        let beta = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();
        assert!(!beta.template.contains("BetaDelegationRecord:"));
    }

    #[test]
    fn mail_records_are_prod_only() {
        let prod = synthesize(&stage(StageName::Prod, "example.com")).unwrap();
        assert!(prod.template.contains("Type: MX"));
        assert!(prod.template.contains("Type: TXT"));

        let beta = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();
        assert!(!beta.template.contains("Type: MX"));
    }

    #[test]
    fn alias_points_at_the_distribution_export() {
        let beta = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();
        assert!(beta
            .template
            .contains("Fn::ImportValue: Betauswest2CdnStack-DistributionDomainName"));
    }

    #[test]
    fn name_servers_are_published_for_delegation() {
        let beta = synthesize(&stage(StageName::Beta, "beta.example.com")).unwrap();
        assert!(beta.template.contains("!GetAtt HostedZone.NameServers"));
    }
}
