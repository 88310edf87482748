//! Widening an existing firewall rule
//!
//! The cluster creates its own node firewall rule with a generated prefix, so the
//! rule is found by name suffix. Merging appends to the existing lists without
//! removing duplicates: running the merge twice grows the lists twice.

use crate::error::{ProvisionError, Result};

/// Suffix of the node firewall rule created alongside a cluster
pub const NODE_RULE_SUFFIX: &str = "-vms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub name: String,
    /// `protocol:port` entries, e.g. `tcp:80`
    pub allowed: Vec<String>,
    pub source_ranges: Vec<String>,
}

impl FirewallRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed: Vec::new(),
            source_ranges: Vec::new(),
        }
    }

    pub fn with_allowed<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_source_ranges<I, S>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_ranges.extend(ranges.into_iter().map(Into::into));
        self
    }

    /// Comma-joined allow entries, as the CLI expects them
    pub fn allow_list(&self) -> String {
        self.allowed.join(",")
    }

    pub fn source_range_list(&self) -> String {
        self.source_ranges.join(",")
    }
}

/// First rule whose name ends with `suffix`
pub fn find_rule<'a>(rules: &'a [FirewallRule], suffix: &str) -> Result<&'a FirewallRule> {
    let mut matches = rules.iter().filter(|rule| rule.name.ends_with(suffix));
    let rule = matches
        .next()
        .ok_or_else(|| ProvisionError::NoMatchingRule(suffix.to_string()))?;

    let extra: Vec<&str> = matches.map(|r| r.name.as_str()).collect();
    if !extra.is_empty() {
        tracing::warn!(
            "Several firewall rules end with {}; using {} and ignoring {}",
            suffix,
            rule.name,
            extra.join(", ")
        );
    }
    Ok(rule)
}

/// Updated copy of the matching rule with the new entries appended
pub fn merge<A, R>(
    rules: &[FirewallRule],
    suffix: &str,
    new_allowed: &[A],
    new_source_ranges: &[R],
) -> Result<FirewallRule>
where
    A: AsRef<str>,
    R: AsRef<str>,
{
    let rule = find_rule(rules, suffix)?;
    Ok(rule
        .clone()
        .with_allowed(new_allowed.iter().map(|a| a.as_ref().to_string()))
        .with_source_ranges(new_source_ranges.iter().map(|r| r.as_ref().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_rule() -> FirewallRule {
        FirewallRule::new("gke-base-dev-cluster-4f2a9c1e-vms")
            .with_allowed(["tcp:80"])
            .with_source_ranges(["10.128.0.0/9"])
    }

    #[test]
    fn test_no_rules() {
        let err = merge::<&str, &str>(&[], NODE_RULE_SUFFIX, &["tcp:10256"], &[]).unwrap_err();
        assert!(matches!(err, ProvisionError::NoMatchingRule(ref s) if s == "-vms"));
    }

    #[test]
    fn test_no_matching_suffix() {
        let rules = vec![FirewallRule::new("foo-subnet").with_allowed(["tcp:22"])];
        let err = merge(&rules, NODE_RULE_SUFFIX, &["tcp:10256"], &["130.211.0.0/22"])
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NoMatchingRule(_)));
    }

    #[test]
    fn test_merge_appends() {
        let rules = vec![FirewallRule::new("default-allow-ssh"), node_rule()];
        let merged = merge(
            &rules,
            NODE_RULE_SUFFIX,
            &["tcp:10256"],
            &["130.211.0.0/22", "35.191.0.0/16"],
        )
        .unwrap();

        assert_eq!(merged.name, "gke-base-dev-cluster-4f2a9c1e-vms");
        assert_eq!(merged.allowed, vec!["tcp:80", "tcp:10256"]);
        assert_eq!(
            merged.source_range_list(),
            "10.128.0.0/9,130.211.0.0/22,35.191.0.0/16"
        );
        // the input list is left alone
        assert_eq!(rules[1].allowed, vec!["tcp:80"]);
    }

    #[test]
    fn test_merge_twice_duplicates() {
        let once = merge(&[node_rule()], NODE_RULE_SUFFIX, &["tcp:10256"], &[] as &[&str])
            .unwrap();
        let twice = merge(&[once], NODE_RULE_SUFFIX, &["tcp:10256"], &[] as &[&str]).unwrap();

        assert_eq!(twice.allowed, vec!["tcp:80", "tcp:10256", "tcp:10256"]);
        assert_eq!(twice.allow_list(), "tcp:80,tcp:10256,tcp:10256");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            node_rule(),
            FirewallRule::new("gke-other-cluster-0000-vms").with_allowed(["udp:53"]),
        ];
        let rule = find_rule(&rules, NODE_RULE_SUFFIX).unwrap();
        assert_eq!(rule.name, "gke-base-dev-cluster-4f2a9c1e-vms");
    }
}
