//! Run configuration
//!
//! Values come from CLI flags or their `PROVFLOW_*` environment variables. The
//! four organisation-level values are expected but not enforced: a missing one
//! only produces a warning.

use std::path::PathBuf;

pub const DEFAULT_REGION: &str = "us-central1";
pub const DEFAULT_ZONE: &str = "us-central1-a";
pub const DEFAULT_POLICY_TEMPLATE: &str = "deploy/iam-policy.yaml";
pub const DEFAULT_MANIFEST_TEMPLATE: &str = "deploy/workload.yaml";

/// NodePort the workload is exposed on behind the load balancer
pub const NODE_PORT: u16 = 30080;

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub environment: String,
    pub base_project_id: Option<String>,
    pub organization_id: Option<String>,
    pub billing_account: Option<String>,
    pub owners: Vec<String>,
    pub region: String,
    pub zone: String,
    pub cluster_name: Option<String>,
    pub image: Option<String>,
    pub policy_template: PathBuf,
    pub manifest_template: PathBuf,
}

impl ProvisionConfig {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            base_project_id: None,
            organization_id: None,
            billing_account: None,
            owners: Vec::new(),
            region: DEFAULT_REGION.to_string(),
            zone: DEFAULT_ZONE.to_string(),
            cluster_name: None,
            image: None,
            policy_template: PathBuf::from(DEFAULT_POLICY_TEMPLATE),
            manifest_template: PathBuf::from(DEFAULT_MANIFEST_TEMPLATE),
        }
    }

    /// Environment variables behind the expected values that are unset
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.base_project_id) {
            missing.push("PROVFLOW_BASE_PROJECT_ID");
        }
        if is_blank(&self.organization_id) {
            missing.push("PROVFLOW_ORGANIZATION_ID");
        }
        if is_blank(&self.billing_account) {
            missing.push("PROVFLOW_BILLING_ACCOUNT");
        }
        if self.owners.iter().all(|o| o.trim().is_empty()) {
            missing.push("PROVFLOW_OWNERS");
        }
        missing
    }

    /// `{base}-{environment}`; an unset base still yields `-{environment}`
    pub fn project_id(&self) -> String {
        format!(
            "{}-{}",
            self.base_project_id.as_deref().unwrap_or_default(),
            self.environment
        )
    }

    pub fn organization_id(&self) -> &str {
        self.organization_id.as_deref().unwrap_or_default()
    }

    pub fn billing_account(&self) -> &str {
        self.billing_account.as_deref().unwrap_or_default()
    }

    pub fn cluster_name(&self) -> String {
        self.cluster_name
            .clone()
            .unwrap_or_else(|| format!("{}-cluster", self.environment))
    }

    pub fn image(&self) -> String {
        self.image
            .clone()
            .unwrap_or_else(|| format!("gcr.io/{}/app:latest", self.project_id()))
    }

    /// Owners as a YAML flow sequence of IAM members; bare emails become `user:`
    pub fn owner_members(&self) -> String {
        let members: Vec<String> = self
            .owners
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| {
                if o.contains(':') {
                    format!("\"{}\"", o)
                } else {
                    format!("\"user:{}\"", o)
                }
            })
            .collect();
        format!("[{}]", members.join(", "))
    }

    pub fn service_account_name(&self) -> String {
        format!("{}-deployer", self.environment)
    }

    pub fn bucket_name(&self) -> String {
        format!("{}-artifacts", self.project_id())
    }

    pub fn keyring_name(&self) -> String {
        format!("{}-keyring", self.environment)
    }

    pub fn key_name(&self) -> String {
        format!("{}-secrets", self.environment)
    }

    pub fn address_name(&self) -> &'static str {
        "load-balancer-external-ip"
    }

    pub fn certificate_name(&self) -> String {
        format!("{}-certificate", self.environment)
    }

    pub fn health_check_name(&self) -> String {
        format!("{}-health-check", self.environment)
    }

    pub fn backend_service_name(&self) -> String {
        format!("{}-backend", self.environment)
    }

    pub fn url_map_name(&self) -> String {
        format!("{}-url-map", self.environment)
    }

    pub fn https_proxy_name(&self) -> String {
        format!("{}-https-proxy", self.environment)
    }

    pub fn forwarding_rule_name(&self) -> String {
        format!("{}-https", self.environment)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}
