//! Command-line surface

use crate::config::{
    DEFAULT_MANIFEST_TEMPLATE, DEFAULT_POLICY_TEMPLATE, DEFAULT_REGION, DEFAULT_ZONE,
    ProvisionConfig,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provflow", version)]
#[command(about = "Provision a GKE execution environment, one confirmed step at a time", long_about = None)]
pub struct Cli {
    /// Environment name (dev, stg, prod); the project id becomes <base>-<environment>
    pub environment: String,

    /// Prefix of the project id
    #[arg(long, env = "PROVFLOW_BASE_PROJECT_ID")]
    base_project_id: Option<String>,

    /// Organization the project is created under
    #[arg(long, env = "PROVFLOW_ORGANIZATION_ID")]
    organization_id: Option<String>,

    /// Billing account linked to the project
    #[arg(long, env = "PROVFLOW_BILLING_ACCOUNT")]
    billing_account: Option<String>,

    /// Project owners, comma separated (user:, group: or bare emails)
    #[arg(long, env = "PROVFLOW_OWNERS", value_delimiter = ',')]
    owners: Vec<String>,

    #[arg(long, env = "PROVFLOW_REGION", default_value = DEFAULT_REGION)]
    region: String,

    #[arg(long, env = "PROVFLOW_ZONE", default_value = DEFAULT_ZONE)]
    zone: String,

    /// Cluster name (default: <environment>-cluster)
    #[arg(long)]
    cluster_name: Option<String>,

    /// Container image to deploy (default: gcr.io/<project>/app:latest)
    #[arg(long, env = "PROVFLOW_IMAGE")]
    image: Option<String>,

    /// Access policy template with @SERVICE_ACCOUNT@ and @OWNERS@ placeholders
    #[arg(long, default_value = DEFAULT_POLICY_TEMPLATE)]
    policy_template: PathBuf,

    /// Deployment manifest template with @IMAGE@ and @PROJECT_ID@ placeholders
    #[arg(long, default_value = DEFAULT_MANIFEST_TEMPLATE)]
    manifest_template: PathBuf,

    /// Answer yes at every confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Fail on unset configuration and on the first provisioning call that exits non-zero
    #[arg(long)]
    pub strict: bool,

    /// Log every external command
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> ProvisionConfig {
        ProvisionConfig {
            base_project_id: self.base_project_id.clone(),
            organization_id: self.organization_id.clone(),
            billing_account: self.billing_account.clone(),
            owners: self.owners.clone(),
            region: self.region.clone(),
            zone: self.zone.clone(),
            cluster_name: self.cluster_name.clone(),
            image: self.image.clone(),
            policy_template: self.policy_template.clone(),
            manifest_template: self.manifest_template.clone(),
            ..ProvisionConfig::new(&self.environment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "PROVFLOW_BASE_PROJECT_ID",
        "PROVFLOW_ORGANIZATION_ID",
        "PROVFLOW_BILLING_ACCOUNT",
        "PROVFLOW_OWNERS",
        "PROVFLOW_IMAGE",
    ];

    #[test]
    fn test_values_from_environment() {
        temp_env::with_vars(
            [
                ("PROVFLOW_BASE_PROJECT_ID", Some("acme")),
                ("PROVFLOW_ORGANIZATION_ID", Some("123456789")),
                ("PROVFLOW_BILLING_ACCOUNT", Some("0000-AAAA-BBBB")),
                ("PROVFLOW_OWNERS", Some("alice@acme.dev,group:ops@acme.dev")),
                ("PROVFLOW_IMAGE", None),
            ],
            || {
                let cli = Cli::try_parse_from(["provflow", "stg"]).unwrap();
                let config = cli.config();

                assert_eq!(config.project_id(), "acme-stg");
                assert_eq!(config.owners, vec!["alice@acme.dev", "group:ops@acme.dev"]);
                assert!(config.missing().is_empty());
                assert_eq!(config.region, DEFAULT_REGION);
                assert!(!cli.yes && !cli.strict);
            },
        );
    }

    #[test]
    fn test_flags_override_environment() {
        temp_env::with_vars(
            [
                ("PROVFLOW_BASE_PROJECT_ID", Some("acme")),
                ("PROVFLOW_ZONE", Some("europe-west1-b")),
            ],
            || {
                let cli = Cli::try_parse_from([
                    "provflow",
                    "dev",
                    "--base-project-id",
                    "other",
                    "--yes",
                    "--strict",
                ])
                .unwrap();
                let config = cli.config();

                assert_eq!(config.project_id(), "other-dev");
                assert_eq!(config.zone, "europe-west1-b");
                assert!(cli.yes && cli.strict);
            },
        );
    }

    #[test]
    fn test_unset_values_are_reported() {
        temp_env::with_vars_unset(VARS, || {
            let cli = Cli::try_parse_from(["provflow", "dev"]).unwrap();
            assert_eq!(cli.config().missing().len(), 4);
        });
    }

    #[test]
    fn test_environment_is_required() {
        assert!(Cli::try_parse_from(["provflow"]).is_err());
    }
}
