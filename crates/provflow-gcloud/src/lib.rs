//! Google Cloud control plane for provflow
//!
//! Typed wrapper over the `gcloud`, `gsutil` and `kubectl` CLIs, built on a
//! [`provflow_core::CommandExecutor`] so runs can be replayed in tests.
//!
//! # Requirements
//!
//! - `gcloud`, `gsutil` and `kubectl` must be installed
//! - Authentication is managed through `gcloud auth`
//!
//! # Example
//!
//! ```ignore
//! use provflow_core::ProcessExecutor;
//! use provflow_gcloud::Gcloud;
//! use std::sync::Arc;
//!
//! let gcloud = Gcloud::new(Arc::new(ProcessExecutor));
//! gcloud.check_binaries(provflow_gcloud::REQUIRED_BINARIES).await?;
//! let group = gcloud.instance_group_name("base-dev", "dev-cluster").await?;
//! ```

pub mod error;
pub mod firewall;
pub mod gcloud;

pub use error::{GcloudError, Result};
pub use firewall::{FirewallRuleInfo, parse_rules};
pub use gcloud::{
    Gcloud, HEALTH_CHECK_ALLOW, HEALTH_CHECK_RANGES, REQUIRED_BINARIES, REQUIRED_SERVICES,
    service_account_email,
};
