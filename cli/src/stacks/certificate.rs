use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;
use eyre::ContextCompat;

/// TLS certificate for the stage domain, DNS-validated
///
/// CloudFront only accepts certificates issued in us-east-1, so the stack is
/// pinned there regardless of the stage region. Its output crosses the region
/// boundary as a plain parameter, not an export.
pub fn synthesize(stage: &StageConfig) -> eyre::Result<Stack> {
    let domain = stage
        .domain
        .as_deref()
        .wrap_err("A certificate stack needs dns.domain set in crosswire.toml")?;

    let name = naming::certificate_stack_name(stage.name.as_str(), &stage.region);

    let alternative_names = if stage.is_production {
        format!(
            "
            SubjectAlternativeNames:
                - www.{domain}"
        )
    } else {
        String::new()
    };

    let template = format!(
        "Description: TLS certificate for {domain}
Resources:
    Certificate:
        Type: AWS::CertificateManager::Certificate
        Properties:
            DomainName: {domain}{alternative_names}
            ValidationMethod: DNS
Outputs:
    CertificateArn:
        Value: !Ref Certificate
",
    );

    let mut stack = Stack::new(name, template);
    stack.region = Some("us-east-1".to_string());
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage(name: StageName, domain: Option<&str>) -> StageConfig {
        StageConfig {
            name,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: domain.map(String::from),
        }
    }

    #[test]
    fn pinned_to_us_east_1() {
        let stack = synthesize(&stage(StageName::Beta, Some("beta.example.com"))).unwrap();
        assert_eq!(stack.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn prod_covers_www() {
        let stack = synthesize(&stage(StageName::Prod, Some("example.com"))).unwrap();
        assert!(stack.template.contains("www.example.com"));

        let beta = synthesize(&stage(StageName::Beta, Some("beta.example.com"))).unwrap();
        assert!(!beta.template.contains("SubjectAlternativeNames"));
    }

    #[test]
    fn missing_domain_is_an_error() {
        assert!(synthesize(&stage(StageName::Beta, None)).is_err());
    }
}
