use crate::stage::{StageConfig, StageName, Stages};
use eyre::{bail, Context};
use serde::Deserialize;
use std::path::Path;

pub const PIPELINE_ACCOUNT_VAR: &str = "PIPELINE_ACCOUNT_ID";
pub const BETA_ACCOUNT_VAR: &str = "BETA_ACCOUNT_ID";
pub const PROD_ACCOUNT_VAR: &str = "PROD_ACCOUNT_ID";

/// The three account ids of the topology, required from the environment
#[derive(Debug, Clone)]
pub struct Accounts {
    pub pipeline: String,
    pub beta: String,
    pub prod: String,
}

impl Accounts {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the account ids through a lookup function
    ///
    /// An unset or empty variable aborts before any AWS call is made.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let mut required = [PIPELINE_ACCOUNT_VAR, BETA_ACCOUNT_VAR, PROD_ACCOUNT_VAR]
            .into_iter()
            .map(|key| match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => bail!("Required environment variable {key} is not set"),
            });

        // The iterator yields in declaration order
        Ok(Accounts {
            pipeline: required.next().unwrap()?,
            beta: required.next().unwrap()?,
            prod: required.next().unwrap()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Github {
    pub owner: String,
    pub repo: String,
    pub branch: String,

    /// Secrets Manager name holding the access token the pipeline source uses
    pub token_secret: String,
}

/// Resolved tool configuration
///
/// Merged from crosswire.toml and the required environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project name, the prefix of every account-scoped resource name
    pub project: String,

    /// Stack-name prefix for stacks owned by this account group
    pub account_prefix: String,

    /// Apex domain served by prod, beta gets a subdomain of it
    pub domain: Option<String>,

    pub github: Github,
    pub region: String,
    pub beta_profile: String,
    pub prod_profile: String,
    pub accounts: Accounts,
}

impl Config {
    /// Load crosswire.toml from the given directory and merge the environment
    pub fn load(dir: &Path) -> eyre::Result<Self> {
        Ok(Self::from_parts(
            FileConfig::from_path(dir)?,
            Accounts::from_env()?,
        ))
    }

    fn from_parts(file: FileConfig, accounts: Accounts) -> Self {
        let project = if file.project.name.is_empty() {
            "frontend".to_string()
        } else {
            file.project.name
        };

        let account_prefix = match file.project.account_prefix {
            Some(prefix) => prefix,
            None => crate::naming::pascal(&project),
        };

        Config {
            account_prefix,
            domain: file.dns.domain,
            github: Github {
                owner: file.github.owner,
                repo: file.github.repo,
                branch: file.github.branch,
                token_secret: file.github.token_secret,
            },
            region: file.aws.region,
            beta_profile: file.aws.beta_profile,
            prod_profile: file.aws.prod_profile,
            accounts,
            project,
        }
    }

    /// The stage configuration table, beta first, prod second
    pub fn stages(&self) -> eyre::Result<Stages> {
        Stages::new(vec![
            StageConfig {
                name: StageName::Beta,
                account: self.accounts.beta.clone(),
                region: self.region.clone(),
                is_production: false,
                domain: self.domain.as_ref().map(|d| format!("beta.{d}")),
            },
            StageConfig {
                name: StageName::Prod,
                account: self.accounts.prod.clone(),
                region: self.region.clone(),
                is_production: true,
                domain: self.domain.clone(),
            },
        ])
    }

    /// AWS profile holding credentials for a target account
    pub fn profile(&self, stage: StageName) -> &str {
        match stage {
            StageName::Beta => &self.beta_profile,
            StageName::Prod => &self.prod_profile,
        }
    }
}

/// FileConfig is the structure of crosswire.toml
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    /// [project]
    /// name = "frontend"
    #[serde(default)]
    project: ProjectSection,

    /// [github]
    /// owner = "someorg"
    /// repo = "frontend"
    #[serde(default)]
    github: GithubSection,

    /// [aws]
    /// region = "us-west-2"
    #[serde(default)]
    aws: AwsSection,

    /// [dns]
    /// domain = "example.com"
    #[serde(default)]
    dns: DnsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProjectSection {
    #[serde(default)]
    name: String,

    account_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubSection {
    #[serde(default)]
    owner: String,

    #[serde(default)]
    repo: String,

    #[serde(default = "GithubSection::default_branch")]
    branch: String,

    #[serde(default = "GithubSection::default_token_secret")]
    token_secret: String,
}

impl GithubSection {
    fn default_branch() -> String {
        "main".into()
    }

    fn default_token_secret() -> String {
        "github-token".into()
    }
}

impl Default for GithubSection {
    fn default() -> Self {
        GithubSection {
            owner: String::new(),
            repo: String::new(),
            branch: Self::default_branch(),
            token_secret: Self::default_token_secret(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AwsSection {
    #[serde(default = "AwsSection::default_region")]
    region: String,

    #[serde(default = "AwsSection::default_beta_profile")]
    beta_profile: String,

    #[serde(default = "AwsSection::default_prod_profile")]
    prod_profile: String,
}

impl AwsSection {
    fn default_region() -> String {
        "us-west-2".into()
    }

    fn default_beta_profile() -> String {
        "beta".into()
    }

    fn default_prod_profile() -> String {
        "prod".into()
    }
}

impl Default for AwsSection {
    fn default() -> Self {
        AwsSection {
            region: Self::default_region(),
            beta_profile: Self::default_beta_profile(),
            prod_profile: Self::default_prod_profile(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DnsSection {
    domain: Option<String>,
}

impl FileConfig {
    fn from_path(dir: &Path) -> eyre::Result<Self> {
        let config_toml_path = dir.join("crosswire.toml");

        if let Ok(toml_string) = std::fs::read_to_string(&config_toml_path) {
            let config = toml::from_str(&toml_string).wrap_err("Failed to parse crosswire.toml")?;
            Ok(config)
        } else {
            // Just use a default config if crosswire.toml is not found
            Ok(FileConfig::default())
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// A fully resolved config with fixed account ids, for template tests
    pub fn config(project: &str, domain: Option<&str>) -> Config {
        let mut file = FileConfig::default();
        file.project.name = project.into();
        file.dns.domain = domain.map(String::from);
        file.github.owner = "someorg".into();
        file.github.repo = project.into();

        Config::from_parts(
            file,
            Accounts {
                pipeline: "000000000000".into(),
                beta: "111111111111".into(),
                prod: "222222222222".into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn all_accounts() -> Vec<(&'static str, &'static str)> {
        vec![
            (PIPELINE_ACCOUNT_VAR, "000000000000"),
            (BETA_ACCOUNT_VAR, "111111111111"),
            (PROD_ACCOUNT_VAR, "222222222222"),
        ]
    }

    #[test]
    fn accounts_read_from_lookup() {
        let pairs = all_accounts();
        let accounts = Accounts::from_lookup(env(&pairs)).unwrap();

        assert_eq!(accounts.pipeline, "000000000000");
        assert_eq!(accounts.beta, "111111111111");
        assert_eq!(accounts.prod, "222222222222");
    }

    #[test]
    fn unset_account_variable_aborts() {
        for missing in [PIPELINE_ACCOUNT_VAR, BETA_ACCOUNT_VAR, PROD_ACCOUNT_VAR] {
            let pairs: Vec<_> = all_accounts()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();

            let error = Accounts::from_lookup(env(&pairs)).unwrap_err();
            assert!(error.to_string().contains(missing));
        }
    }

    #[test]
    fn empty_account_variable_aborts() {
        let pairs: Vec<_> = all_accounts()
            .into_iter()
            .map(|(k, v)| if k == BETA_ACCOUNT_VAR { (k, "") } else { (k, v) })
            .collect();

        let error = Accounts::from_lookup(env(&pairs)).unwrap_err();
        assert!(error.to_string().contains(BETA_ACCOUNT_VAR));
    }

    fn test_config(domain: Option<&str>) -> Config {
        test_support::config("frontend", domain)
    }

    #[test]
    fn stage_table_is_beta_then_prod() {
        let stages = test_config(Some("example.com")).stages().unwrap();
        let [first, second] = stages.ordered();

        assert_eq!(first.name, StageName::Beta);
        assert!(!first.is_production);
        assert_eq!(second.name, StageName::Prod);
        assert!(second.is_production);
    }

    #[test]
    fn beta_serves_a_subdomain() {
        let stages = test_config(Some("example.com")).stages().unwrap();

        assert_eq!(stages.beta().domain.as_deref(), Some("beta.example.com"));
        assert_eq!(stages.prod().domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn account_prefix_defaults_to_pascal_project_name() {
        let mut file = FileConfig::default();
        file.project.name = "front-end".into();

        let config = Config::from_parts(
            file,
            Accounts {
                pipeline: "0".into(),
                beta: "1".into(),
                prod: "2".into(),
            },
        );

        assert_eq!(config.account_prefix, "FrontEnd");
    }
}
