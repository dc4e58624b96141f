use eyre::{bail, ContextCompat};

/// Deployment environment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    Beta,
    Prod,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Beta => "Beta",
            StageName::Prod => "Prod",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single deployment target
///
/// Created once at startup and never mutated afterwards. Every stack
/// synthesizer takes one of these.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: StageName,

    /// AWS account id the stage deploys into
    pub account: String,

    pub region: String,

    /// Production stages retain stateful resources on stack deletion
    pub is_production: bool,

    /// Fully qualified domain the stage serves, e.g. "beta.example.com"
    pub domain: Option<String>,
}

/// The full table of deployment targets
///
/// Lookup is by stage name. Consumers that iterate get beta first and prod
/// second, always.
#[derive(Debug, Clone)]
pub struct Stages {
    beta: StageConfig,
    prod: StageConfig,
}

impl Stages {
    /// Build the table from a list of stage records
    ///
    /// Fails unless the list holds exactly one Beta and one Prod entry.
    pub fn new(entries: Vec<StageConfig>) -> eyre::Result<Self> {
        if entries.len() != 2 {
            bail!(
                "Expected exactly 2 stage entries (Beta and Prod), got {}",
                entries.len(),
            );
        }

        let beta = entries
            .iter()
            .find(|s| s.name == StageName::Beta)
            .wrap_err("No Beta entry in the stage table")?
            .clone();

        let prod = entries
            .iter()
            .find(|s| s.name == StageName::Prod)
            .wrap_err("No Prod entry in the stage table")?
            .clone();

        Ok(Stages { beta, prod })
    }

    pub fn get(&self, name: StageName) -> &StageConfig {
        match name {
            StageName::Beta => &self.beta,
            StageName::Prod => &self.prod,
        }
    }

    pub fn beta(&self) -> &StageConfig {
        &self.beta
    }

    pub fn prod(&self) -> &StageConfig {
        &self.prod
    }

    /// All stages in deployment order: beta, then prod
    pub fn ordered(&self) -> [&StageConfig; 2] {
        [&self.beta, &self.prod]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: StageName, account: &str) -> StageConfig {
        StageConfig {
            name,
            account: account.into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: None,
        }
    }

    #[test]
    fn ordered_yields_beta_then_prod() {
        let stages = Stages::new(vec![
            stage(StageName::Prod, "222222222222"),
            stage(StageName::Beta, "111111111111"),
        ])
        .unwrap();

        // Several consumers iterate positionally, so the order is a contract
        let [first, second] = stages.ordered();
        assert_eq!(first.name, StageName::Beta);
        assert_eq!(second.name, StageName::Prod);
    }

    #[test]
    fn lookup_is_by_name_not_position() {
        let stages = Stages::new(vec![
            stage(StageName::Prod, "222222222222"),
            stage(StageName::Beta, "111111111111"),
        ])
        .unwrap();

        assert_eq!(stages.get(StageName::Beta).account, "111111111111");
        assert_eq!(stages.get(StageName::Prod).account, "222222222222");
    }

    #[test]
    fn rejects_duplicate_stages() {
        let result = Stages::new(vec![
            stage(StageName::Beta, "111111111111"),
            stage(StageName::Beta, "111111111111"),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_short_table() {
        assert!(Stages::new(vec![stage(StageName::Beta, "111111111111")]).is_err());
    }
}
