//! Runs the provisioning sequence against the control plane

use crate::config::{NODE_PORT, ProvisionConfig};
use crate::steps::{Gate, ProvisionStep};
use anyhow::Context;
use provflow_core::firewall::{self, NODE_RULE_SUFFIX};
use provflow_core::{ContextKey, EnvironmentContext, ProvisionError, StepSequencer, with_mutation};
use provflow_gcloud::{
    Gcloud, GcloudError, HEALTH_CHECK_ALLOW, HEALTH_CHECK_RANGES, REQUIRED_BINARIES,
    REQUIRED_SERVICES,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub const SERVICE_ACCOUNT_TOKEN: &str = "@SERVICE_ACCOUNT@";
pub const OWNERS_TOKEN: &str = "@OWNERS@";
pub const IMAGE_TOKEN: &str = "@IMAGE@";
pub const PROJECT_ID_TOKEN: &str = "@PROJECT_ID@";

/// Exit status for a run that ended with `err`
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ProvisionError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<GcloudError>() {
            return e.exit_code();
        }
    }
    1
}

pub fn is_user_abort(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ProvisionError>()
            .is_some_and(ProvisionError::is_user_abort)
            || cause
                .downcast_ref::<GcloudError>()
                .is_some_and(|e| e.kind() == provflow_core::ErrorKind::UserAbort)
    })
}

pub struct Provisioner<R, W> {
    config: ProvisionConfig,
    gcloud: Gcloud,
    sequencer: StepSequencer<R, W>,
    context: EnvironmentContext,
}

impl<R: BufRead, W: Write> Provisioner<R, W> {
    pub fn new(config: ProvisionConfig, gcloud: Gcloud, sequencer: StepSequencer<R, W>) -> Self {
        Self {
            config,
            gcloud,
            sequencer,
            context: EnvironmentContext::new(),
        }
    }

    pub fn context(&self) -> &EnvironmentContext {
        &self.context
    }

    pub fn sequencer(&self) -> &StepSequencer<R, W> {
        &self.sequencer
    }

    pub fn gcloud(&self) -> &Gcloud {
        &self.gcloud
    }

    /// Preflight, every step in order, then the summary
    ///
    /// Unset configuration only warns, except in strict mode.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.gcloud.check_binaries(REQUIRED_BINARIES).await?;

        let missing = self.config.missing();
        if self.gcloud.is_strict() && !missing.is_empty() {
            return Err(ProvisionError::MissingConfig(missing.join(", ")).into());
        }
        for name in missing {
            self.sequencer.warn(&format!("{} is not set", name));
        }

        let result = self.run_steps().await;
        self.sequencer
            .print_summary(&self.config.environment, self.gcloud.ignored_failures());
        result
    }

    async fn run_steps(&mut self) -> anyhow::Result<()> {
        for step in ProvisionStep::ALL {
            let number = self.sequencer.advance(step.description());
            tracing::debug!("Step {} {:?} (gate: {:?})", number, step, step.gate());

            if let Gate::Before(prompt) = step.gate() {
                self.sequencer.gate(prompt)?;
            }

            if let Err(e) = self.execute(step).await {
                tracing::debug!("Step {} {:?} failed: {:#}", number, step, e);
                if !is_user_abort(&e) {
                    self.sequencer.halt(&format!("{:#}", e));
                }
                return Err(e.context(format!("Step {} ({}) failed", number, step.description())));
            }
        }
        self.sequencer.finish();
        Ok(())
    }

    fn project(&self) -> Result<String, ProvisionError> {
        self.context.get(ContextKey::ProjectId).map(str::to_string)
    }

    async fn execute(&mut self, step: ProvisionStep) -> anyhow::Result<()> {
        match step {
            ProvisionStep::CreateProject => {
                let project = self.config.project_id();
                self.gcloud
                    .create_project(&project, self.config.organization_id())
                    .await?;
                self.sequencer.detail(&format!("Project {}", project));
                self.context.set(ContextKey::ProjectId, project)?;
            }
            ProvisionStep::LinkBilling => {
                let project = self.project()?;
                self.gcloud
                    .link_billing(&project, self.config.billing_account())
                    .await?;
            }
            ProvisionStep::EnableApis => {
                let project = self.project()?;
                self.gcloud
                    .enable_services(&project, REQUIRED_SERVICES)
                    .await?;
            }
            ProvisionStep::CreateServiceAccount => {
                let project = self.project()?;
                let email = self
                    .gcloud
                    .create_service_account(
                        &project,
                        &self.config.service_account_name(),
                        "provflow deployer",
                    )
                    .await?;
                self.sequencer.detail(&format!("Service account {}", email));
                self.context.set(ContextKey::ServiceAccountEmail, email)?;
            }
            ProvisionStep::ApplyAccessPolicy => self.apply_access_policy(step).await?,
            ProvisionStep::CreateBucket => {
                let project = self.project()?;
                self.gcloud
                    .create_bucket(&project, &self.config.bucket_name(), &self.config.region)
                    .await?;
            }
            ProvisionStep::CreateKmsKey => {
                let project = self.project()?;
                let keyring = self.config.keyring_name();
                self.gcloud
                    .create_keyring(&project, &keyring, &self.config.region)
                    .await?;
                self.gcloud
                    .create_key(&project, &keyring, &self.config.key_name(), &self.config.region)
                    .await?;
            }
            ProvisionStep::CreateCluster => {
                let project = self.project()?;
                let account = self.context.get(ContextKey::ServiceAccountEmail)?.to_string();
                let cluster = self.config.cluster_name();
                self.gcloud
                    .create_cluster(&project, &cluster, &self.config.zone, &account)
                    .await?;
                self.context.set(ContextKey::ClusterName, cluster)?;
            }
            ProvisionStep::FetchCredentials => {
                let project = self.project()?;
                let cluster = self.context.get(ContextKey::ClusterName)?;
                self.gcloud
                    .get_credentials(&project, cluster, &self.config.zone)
                    .await?;
            }
            ProvisionStep::ResolveInstanceGroup => {
                let project = self.project()?;
                let cluster = self.context.get(ContextKey::ClusterName)?;
                let group = self
                    .gcloud
                    .instance_group_name(&project, cluster)
                    .await
                    .context("Could not determine the cluster's instance group")?;
                self.sequencer.detail(&format!("Instance group {}", group));
                self.context.set(ContextKey::InstanceGroupName, group)?;
            }
            ProvisionStep::SetNamedPorts => {
                let project = self.project()?;
                let group = self.context.get(ContextKey::InstanceGroupName)?;
                self.gcloud
                    .set_named_ports(
                        &project,
                        group,
                        &self.config.zone,
                        &format!("http:{}", NODE_PORT),
                    )
                    .await?;
            }
            ProvisionStep::WidenFirewall => {
                let project = self.project()?;
                let rules = self.gcloud.list_firewall_rules(&project).await?;
                let merged =
                    firewall::merge(&rules, NODE_RULE_SUFFIX, HEALTH_CHECK_ALLOW, HEALTH_CHECK_RANGES)?;
                self.gcloud.update_firewall_rule(&project, &merged).await?;
                self.sequencer.detail(&format!(
                    "{} allows {} from {}",
                    merged.name,
                    merged.allow_list(),
                    merged.source_range_list()
                ));
            }
            ProvisionStep::ReserveExternalIp => {
                let project = self.project()?;
                let name = self.config.address_name();
                self.gcloud.reserve_global_address(&project, name).await?;
                let ip = self
                    .gcloud
                    .external_ip(&project, name)
                    .await
                    .context("Could not determine the reserved external IP")?;
                self.sequencer.detail(&format!("External IP {}", ip));
                self.context.set(ContextKey::ExternalIpAddress, ip)?;
            }
            ProvisionStep::UploadCertificate => {
                let project = self.project()?;
                let certificate = self.prompt_existing_file("Path to the SSL certificate file")?;
                let private_key = self.prompt_existing_file("Path to the SSL private key file")?;
                let name = self.config.certificate_name();
                self.gcloud
                    .create_ssl_certificate(&project, &name, &certificate, &private_key)
                    .await?;
                self.context.set(ContextKey::CertificateName, name)?;
            }
            ProvisionStep::CreateHealthCheck => {
                let project = self.project()?;
                self.gcloud
                    .create_health_check(&project, &self.config.health_check_name(), NODE_PORT)
                    .await?;
            }
            ProvisionStep::CreateBackendService => {
                let project = self.project()?;
                let group = self.context.get(ContextKey::InstanceGroupName)?.to_string();
                let backend = self.config.backend_service_name();
                self.gcloud
                    .create_backend_service(&project, &backend, &self.config.health_check_name())
                    .await?;
                self.gcloud
                    .add_backend(&project, &backend, &group, &self.config.zone)
                    .await?;
                self.context.set(ContextKey::BackendServiceName, backend)?;
            }
            ProvisionStep::CreateUrlMap => {
                let project = self.project()?;
                let backend = self.context.get(ContextKey::BackendServiceName)?;
                let certificate = self.context.get(ContextKey::CertificateName)?;
                let url_map = self.config.url_map_name();
                self.gcloud.create_url_map(&project, &url_map, backend).await?;
                self.gcloud
                    .create_https_proxy(
                        &project,
                        &self.config.https_proxy_name(),
                        &url_map,
                        certificate,
                    )
                    .await?;
            }
            ProvisionStep::CreateForwardingRule => {
                let project = self.project()?;
                let ip = self.context.get(ContextKey::ExternalIpAddress)?.to_string();
                self.gcloud
                    .create_forwarding_rule(
                        &project,
                        &self.config.forwarding_rule_name(),
                        &ip,
                        &self.config.https_proxy_name(),
                    )
                    .await?;
                self.sequencer
                    .detail(&format!("Environment will be served at https://{}", ip));
            }
            ProvisionStep::DeployWorkload => self.deploy_workload(step).await?,
        }
        Ok(())
    }

    async fn apply_access_policy(&mut self, step: ProvisionStep) -> anyhow::Result<()> {
        let project = self.project()?;
        let account = self.context.get(ContextKey::ServiceAccountEmail)?.to_string();
        let owners = self.config.owner_members();
        let template = self.config.policy_template.clone();

        let gcloud = &self.gcloud;
        let sequencer = &mut self.sequencer;
        with_mutation(
            &template,
            &[
                (SERVICE_ACCOUNT_TOKEN, account.as_str()),
                (OWNERS_TOKEN, owners.as_str()),
            ],
            move |policy| async move {
                sequencer.detail(&format!("Rendered {}", policy.display()));
                if let Gate::InScope(prompt) = step.gate() {
                    sequencer.gate(prompt)?;
                }
                gcloud.set_iam_policy(&project, &policy).await?;
                Ok::<_, anyhow::Error>(())
            },
        )
        .await
        .with_context(|| format!("Access policy template {}", template.display()))
    }

    async fn deploy_workload(&mut self, step: ProvisionStep) -> anyhow::Result<()> {
        let project = self.project()?;
        let image = self.config.image();
        let template = self.config.manifest_template.clone();
        let rendered = format!("Image {}", image);

        let gcloud = &self.gcloud;
        let sequencer = &mut self.sequencer;
        with_mutation(
            &template,
            &[(IMAGE_TOKEN, image.as_str()), (PROJECT_ID_TOKEN, project.as_str())],
            move |manifest| async move {
                sequencer.detail(&rendered);
                if let Gate::InScope(prompt) = step.gate() {
                    sequencer.gate(prompt)?;
                }
                gcloud.kubectl_apply(&manifest).await?;
                Ok::<_, anyhow::Error>(())
            },
        )
        .await
        .with_context(|| format!("Deployment manifest {}", template.display()))
    }

    fn prompt_existing_file(&mut self, question: &str) -> Result<PathBuf, ProvisionError> {
        let path = PathBuf::from(self.sequencer.prompt(question)?);
        if !path.is_file() {
            return Err(ProvisionError::FileNotFound(path));
        }
        Ok(path)
    }
}
