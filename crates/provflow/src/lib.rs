//! provflow: provision a GKE execution environment through gcloud
//!
//! The binary wires [`Provisioner`] to the real control plane and the
//! terminal; tests drive it with a scripted executor and in-memory I/O.

pub mod cli;
pub mod config;
pub mod provision;
pub mod steps;

pub use config::ProvisionConfig;
pub use provision::{Provisioner, exit_code, is_user_abort};
pub use steps::{Gate, ProvisionStep};
