//! Firewall rules as listed by `gcloud compute firewall-rules list --format=json`

use crate::error::{GcloudError, Result};
use provflow_core::FirewallRule;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleInfo {
    pub name: String,

    #[serde(default)]
    pub allowed: Vec<AllowedInfo>,

    #[serde(default)]
    pub source_ranges: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowedInfo {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,

    #[serde(default)]
    pub ports: Vec<String>,
}

impl AllowedInfo {
    /// `protocol:port` per port, or the bare protocol when no ports are listed
    pub fn entries(&self) -> Vec<String> {
        if self.ports.is_empty() {
            vec![self.ip_protocol.clone()]
        } else {
            self.ports
                .iter()
                .map(|port| format!("{}:{}", self.ip_protocol, port))
                .collect()
        }
    }
}

impl From<FirewallRuleInfo> for FirewallRule {
    fn from(info: FirewallRuleInfo) -> Self {
        FirewallRule::new(info.name)
            .with_allowed(info.allowed.iter().flat_map(AllowedInfo::entries))
            .with_source_ranges(info.source_ranges)
    }
}

/// Decode the JSON listing. Empty output (a failed, ignored listing) means no rules.
pub fn parse_rules(output: &str) -> Result<Vec<FirewallRule>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rules: Vec<FirewallRuleInfo> =
        serde_json::from_str(output).map_err(|source| GcloudError::Decode {
            what: "firewall rules",
            source,
        })?;
    Ok(rules.into_iter().map(FirewallRule::from).collect())
}
