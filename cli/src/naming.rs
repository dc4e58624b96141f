//! Stack and bucket naming
//!
//! Every name is a pure function of its inputs so that re-synthesis is
//! idempotent. Stack names drop the hyphens from region codes ("us-west-2"
//! becomes "uswest2"), one scheme for every resource kind.

/// Strip characters a CloudFormation stack name cannot carry from a region code
fn flatten_region(region: &str) -> String {
    region.replace('-', "")
}

/// Collapse an arbitrary project name into a PascalCase-ish stack prefix
pub fn pascal(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();

            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Unique stack name for a (stage, region, kind) tuple
///
/// The optional prefix distinguishes stacks of the same kind owned by
/// different accounts or projects.
pub fn stack_name(prefix: &str, stage: &str, region: &str, kind: &str) -> String {
    format!("{prefix}{stage}{}{kind}Stack", flatten_region(region))
}

pub fn network_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Network")
}

pub fn service_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Service")
}

pub fn bucket_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Bucket")
}

pub fn certificate_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Certificate")
}

pub fn cdn_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Cdn")
}

pub fn domain_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "Domain")
}

pub fn contact_form_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "ContactForm")
}

pub fn device_farm_stack_name(stage: &str, region: &str, account_prefix: &str) -> String {
    stack_name(account_prefix, stage, region, "DeviceFarm")
}

pub fn deployment_roles_stack_name(stage: &str, region: &str) -> String {
    stack_name("", stage, region, "DeploymentRoles")
}

/// The pipeline stack is stage-less, it lives in the pipeline account only
pub fn pipeline_stack_name(project: &str) -> String {
    format!("{}PipelineStack", pascal(project))
}

/// Role the pipeline assumes in a target account to run deploy actions there
///
/// The pipeline template references this ARN before the role stack has ever
/// exported anything, so the name must be constructible from (project, stage)
/// alone.
pub fn deployment_role_name(project: &str, stage: &str) -> String {
    format!("{project}-deployment-{}", stage.to_lowercase())
}

/// Role CloudFormation itself assumes while executing a cross-account deploy
pub fn execution_role_name(project: &str, stage: &str) -> String {
    format!("{project}-cloudformation-{}", stage.to_lowercase())
}

pub fn role_arn(account: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account}:role/{role_name}")
}

/// Globally unique static-site bucket name, lowercase with hyphens
///
/// The account id suffix is what makes the name unique across accounts that
/// share a stage label.
pub fn site_bucket_name(project: &str, stage: &str, account: &str) -> String {
    format!("{project}-site-{}-{account}", stage.to_lowercase())
}

pub fn artifact_bucket_name(project: &str, account: &str) -> String {
    format!("{project}-artifacts-{account}")
}

/// Name under which one stack exports a value for another to import
pub fn export_name(stack: &str, key: &str) -> String {
    format!("{stack}-{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_stack_name_drops_region_hyphens() {
        assert_eq!(
            service_stack_name("Beta", "us-west-2"),
            "Betauswest2ServiceStack",
        );
        assert_eq!(
            service_stack_name("Prod", "us-west-2"),
            "Produswest2ServiceStack",
        );
    }

    #[test]
    fn device_farm_stack_name_carries_account_prefix() {
        assert_eq!(
            device_farm_stack_name("Beta", "us-west-2", "FrontEnd"),
            "FrontEndBetauswest2DeviceFarmStack",
        );
    }

    #[test]
    fn names_are_deterministic() {
        assert_eq!(
            stack_name("", "Beta", "us-west-2", "Service"),
            stack_name("", "Beta", "us-west-2", "Service"),
        );
    }

    #[test]
    fn distinct_tuples_never_collide() {
        let stages = ["Beta", "Prod"];
        let regions = ["us-west-2", "us-east-1", "eu-west-1"];
        let kinds = [
            "Network",
            "Service",
            "Bucket",
            "Certificate",
            "Cdn",
            "Domain",
            "ContactForm",
            "DeviceFarm",
            "DeploymentRoles",
        ];

        let mut seen = std::collections::HashSet::new();

        for stage in stages {
            for region in regions {
                for kind in kinds {
                    assert!(
                        seen.insert(stack_name("", stage, region, kind)),
                        "collision for ({stage}, {region}, {kind})",
                    );
                }
            }
        }
    }

    #[test]
    fn pascal_collapses_separators() {
        assert_eq!(pascal("front-end"), "FrontEnd");
        assert_eq!(pascal("my_site"), "MySite");
        assert_eq!(pascal("plain"), "Plain");
    }

    #[test]
    fn bucket_names_are_lowercase() {
        let name = site_bucket_name("frontend", "Beta", "111111111111");
        assert_eq!(name, "frontend-site-beta-111111111111");
        assert!(name.chars().all(|c| !c.is_ascii_uppercase()));
    }
}
