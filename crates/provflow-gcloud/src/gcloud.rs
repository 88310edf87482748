//! gcloud / gsutil / kubectl CLI wrapper
//!
//! Wraps the control-plane commands used while provisioning an environment.
//! Failed calls are logged and counted but do not stop the run unless strict
//! mode is on; preflight checks and identifier lookups are always fatal.

use crate::error::Result;
use crate::firewall::parse_rules;
use provflow_core::{
    CommandExecutor, CommandOutput, CommandSpec, EXTERNAL_ADDRESS, FirewallRule, INSTANCE_GROUP,
    ProvisionError,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Binaries that must be on PATH before anything runs
pub const REQUIRED_BINARIES: &[&str] = &["gcloud", "gsutil", "kubectl"];

/// APIs enabled on every new project
pub const REQUIRED_SERVICES: &[&str] = &[
    "compute.googleapis.com",
    "container.googleapis.com",
    "cloudkms.googleapis.com",
    "iam.googleapis.com",
    "storage-component.googleapis.com",
];

/// Google front-end ranges used by load balancer health checks
pub const HEALTH_CHECK_RANGES: &[&str] = &["130.211.0.0/22", "35.191.0.0/16"];

/// kube-proxy health check port
pub const HEALTH_CHECK_ALLOW: &[&str] = &["tcp:10256"];

pub struct Gcloud {
    executor: Arc<dyn CommandExecutor>,
    strict: bool,
    ignored_failures: AtomicUsize,
}

impl Gcloud {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            strict: false,
            ignored_failures: AtomicUsize::new(0),
        }
    }

    /// Treat any non-zero exit status as fatal
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Number of failed calls that were let through
    pub fn ignored_failures(&self) -> usize {
        self.ignored_failures.load(Ordering::Relaxed)
    }

    /// Run a command, applying the fail-open policy to its status
    pub async fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        tracing::debug!("Running: {}", spec);

        let output = self.executor.run(&spec).await?;

        if !output.is_success() {
            if self.strict {
                return Err(ProvisionError::CommandFailed {
                    command: spec.to_string(),
                    status: output.status,
                    stderr: output.stderr.trim().to_string(),
                }
                .into());
            }
            self.ignored_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "`{}` exited with status {}, continuing: {}",
                spec,
                output.status,
                output.stderr.trim()
            );
        }

        Ok(output)
    }

    fn gcloud(args: &[&str]) -> CommandSpec {
        CommandSpec::new("gcloud").args(args.iter().copied())
    }

    // ========== Preflight ==========

    /// Fail unless every binary resolves through `which`
    pub async fn check_binaries(&self, binaries: &[&str]) -> Result<()> {
        for binary in binaries {
            let spec = CommandSpec::new("which").arg(*binary);
            tracing::debug!("Running: {}", spec);
            let output = self.executor.run(&spec).await?;
            if !output.is_success() {
                return Err(ProvisionError::BinaryNotFound(binary.to_string()).into());
            }
        }
        Ok(())
    }

    // ========== Project ==========

    pub async fn create_project(&self, project: &str, organization: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["projects", "create", project])
                .arg(format!("--organization={}", organization)),
        )
        .await?;
        Ok(())
    }

    pub async fn link_billing(&self, project: &str, billing_account: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["billing", "projects", "link", project])
                .arg(format!("--billing-account={}", billing_account)),
        )
        .await?;
        Ok(())
    }

    pub async fn enable_services(&self, project: &str, services: &[&str]) -> Result<()> {
        self.run(
            Self::gcloud(&["services", "enable"])
                .args(services.iter().copied())
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    // ========== IAM ==========

    /// Create a service account and return its email
    pub async fn create_service_account(
        &self,
        project: &str,
        name: &str,
        display_name: &str,
    ) -> Result<String> {
        self.run(
            Self::gcloud(&["iam", "service-accounts", "create", name])
                .arg(format!("--display-name={}", display_name))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(service_account_email(name, project))
    }

    pub async fn set_iam_policy(&self, project: &str, policy: &Path) -> Result<()> {
        self.run(
            Self::gcloud(&["projects", "set-iam-policy", project])
                .arg(policy.display().to_string()),
        )
        .await?;
        Ok(())
    }

    // ========== Storage / KMS ==========

    pub async fn create_bucket(&self, project: &str, bucket: &str, location: &str) -> Result<()> {
        self.run(
            CommandSpec::new("gsutil")
                .args(["mb", "-p", project, "-l", location])
                .arg(format!("gs://{}", bucket)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_keyring(&self, project: &str, keyring: &str, location: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["kms", "keyrings", "create", keyring])
                .arg(format!("--location={}", location))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_key(
        &self,
        project: &str,
        keyring: &str,
        key: &str,
        location: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["kms", "keys", "create", key])
                .arg(format!("--keyring={}", keyring))
                .arg(format!("--location={}", location))
                .arg("--purpose=encryption")
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    // ========== Cluster ==========

    pub async fn create_cluster(
        &self,
        project: &str,
        cluster: &str,
        zone: &str,
        service_account: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["container", "clusters", "create", cluster])
                .arg(format!("--zone={}", zone))
                .arg(format!("--service-account={}", service_account))
                .arg("--num-nodes=3")
                .arg("--enable-ip-alias")
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn get_credentials(&self, project: &str, cluster: &str, zone: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["container", "clusters", "get-credentials", cluster])
                .arg(format!("--zone={}", zone))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    /// Name of the instance group the cluster's node pool created
    pub async fn instance_group_name(&self, project: &str, cluster: &str) -> Result<String> {
        let output = self
            .run(
                Self::gcloud(&["compute", "instance-groups", "list"])
                    .arg(format!("--filter=name~{}", cluster))
                    .arg(format!("--project={}", project)),
            )
            .await?;
        Ok(INSTANCE_GROUP.resolve_output(&output.stdout)?)
    }

    pub async fn set_named_ports(
        &self,
        project: &str,
        group: &str,
        zone: &str,
        named_ports: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "instance-groups", "set-named-ports", group])
                .arg(format!("--named-ports={}", named_ports))
                .arg(format!("--zone={}", zone))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    // ========== Network ==========

    pub async fn list_firewall_rules(&self, project: &str) -> Result<Vec<FirewallRule>> {
        let output = self
            .run(
                Self::gcloud(&["compute", "firewall-rules", "list", "--format=json"])
                    .arg(format!("--project={}", project)),
            )
            .await?;
        parse_rules(&output.stdout)
    }

    pub async fn update_firewall_rule(&self, project: &str, rule: &FirewallRule) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "firewall-rules", "update", rule.name.as_str()])
                .arg(format!("--allow={}", rule.allow_list()))
                .arg(format!("--source-ranges={}", rule.source_range_list()))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn reserve_global_address(&self, project: &str, name: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "addresses", "create", name, "--global"])
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    /// Address allocated for a reserved global address
    pub async fn external_ip(&self, project: &str, name: &str) -> Result<String> {
        let output = self
            .run(
                Self::gcloud(&["compute", "addresses", "list"])
                    .arg(format!("--filter=name={}", name))
                    .arg("--format=table(name,region,address,status)")
                    .arg(format!("--project={}", project)),
            )
            .await?;
        Ok(EXTERNAL_ADDRESS.resolve_output(&output.stdout)?)
    }

    // ========== Load balancing ==========

    pub async fn create_ssl_certificate(
        &self,
        project: &str,
        name: &str,
        certificate: &Path,
        private_key: &Path,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "ssl-certificates", "create", name])
                .arg(format!("--certificate={}", certificate.display()))
                .arg(format!("--private-key={}", private_key.display()))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_health_check(&self, project: &str, name: &str, port: u16) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "health-checks", "create", "http", name])
                .arg(format!("--port={}", port))
                .arg("--request-path=/healthz")
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_backend_service(
        &self,
        project: &str,
        name: &str,
        health_check: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "backend-services", "create", name, "--global"])
                .arg("--protocol=HTTP")
                .arg("--port-name=http")
                .arg(format!("--health-checks={}", health_check))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn add_backend(
        &self,
        project: &str,
        service: &str,
        group: &str,
        zone: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "backend-services", "add-backend", service, "--global"])
                .arg(format!("--instance-group={}", group))
                .arg(format!("--instance-group-zone={}", zone))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_url_map(&self, project: &str, name: &str, service: &str) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "url-maps", "create", name])
                .arg(format!("--default-service={}", service))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_https_proxy(
        &self,
        project: &str,
        name: &str,
        url_map: &str,
        certificate: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "target-https-proxies", "create", name])
                .arg(format!("--url-map={}", url_map))
                .arg(format!("--ssl-certificates={}", certificate))
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    pub async fn create_forwarding_rule(
        &self,
        project: &str,
        name: &str,
        address: &str,
        proxy: &str,
    ) -> Result<()> {
        self.run(
            Self::gcloud(&["compute", "forwarding-rules", "create", name, "--global"])
                .arg(format!("--address={}", address))
                .arg(format!("--target-https-proxy={}", proxy))
                .arg("--ports=443")
                .arg(format!("--project={}", project)),
        )
        .await?;
        Ok(())
    }

    // ========== Workload ==========

    pub async fn kubectl_apply(&self, manifest: &Path) -> Result<()> {
        self.run(
            CommandSpec::new("kubectl")
                .args(["apply", "-f"])
                .arg(manifest.display().to_string()),
        )
        .await?;
        Ok(())
    }
}

pub fn service_account_email(name: &str, project: &str) -> String {
    format!("{}@{}.iam.gserviceaccount.com", name, project)
}
