//! The fixed provisioning sequence

/// Where a step asks the operator for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    None,
    /// Before the step's body runs
    Before(&'static str),
    /// Inside the template scope, once the rendered artifact is in place
    InScope(&'static str),
}

/// Provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateProject,
    LinkBilling,
    EnableApis,
    CreateServiceAccount,
    ApplyAccessPolicy,
    CreateBucket,
    CreateKmsKey,
    CreateCluster,
    FetchCredentials,
    ResolveInstanceGroup,
    SetNamedPorts,
    WidenFirewall,
    ReserveExternalIp,
    UploadCertificate,
    CreateHealthCheck,
    CreateBackendService,
    CreateUrlMap,
    CreateForwardingRule,
    DeployWorkload,
}

impl ProvisionStep {
    pub const ALL: [ProvisionStep; 19] = [
        Self::CreateProject,
        Self::LinkBilling,
        Self::EnableApis,
        Self::CreateServiceAccount,
        Self::ApplyAccessPolicy,
        Self::CreateBucket,
        Self::CreateKmsKey,
        Self::CreateCluster,
        Self::FetchCredentials,
        Self::ResolveInstanceGroup,
        Self::SetNamedPorts,
        Self::WidenFirewall,
        Self::ReserveExternalIp,
        Self::UploadCertificate,
        Self::CreateHealthCheck,
        Self::CreateBackendService,
        Self::CreateUrlMap,
        Self::CreateForwardingRule,
        Self::DeployWorkload,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Self::CreateProject => "Create project",
            Self::LinkBilling => "Link billing account",
            Self::EnableApis => "Enable APIs",
            Self::CreateServiceAccount => "Create service account",
            Self::ApplyAccessPolicy => "Apply access policy",
            Self::CreateBucket => "Create storage bucket",
            Self::CreateKmsKey => "Create KMS keyring and key",
            Self::CreateCluster => "Create cluster",
            Self::FetchCredentials => "Fetch cluster credentials",
            Self::ResolveInstanceGroup => "Look up cluster instance group",
            Self::SetNamedPorts => "Set named ports on instance group",
            Self::WidenFirewall => "Allow load balancer health checks",
            Self::ReserveExternalIp => "Reserve external IP address",
            Self::UploadCertificate => "Upload SSL certificate",
            Self::CreateHealthCheck => "Create health check",
            Self::CreateBackendService => "Create backend service",
            Self::CreateUrlMap => "Create URL map and HTTPS proxy",
            Self::CreateForwardingRule => "Create forwarding rule",
            Self::DeployWorkload => "Deploy workload",
        }
    }

    pub fn gate(&self) -> Gate {
        match self {
            Self::CreateProject => Gate::Before("Create a new project for this environment?"),
            Self::ApplyAccessPolicy => Gate::InScope("Apply this access policy to the project?"),
            Self::CreateCluster => Gate::Before("Create the cluster? This takes several minutes"),
            Self::WidenFirewall => Gate::Before("Widen the node firewall rule?"),
            Self::DeployWorkload => Gate::InScope("Submit the deployment manifest?"),
            _ => Gate::None,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        self.gate() != Gate::None
    }
}
