//! gcloud wrapper error types

use provflow_core::{ErrorKind, ProvisionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcloudError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl GcloudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GcloudError::Provision(e) => e.kind(),
            GcloudError::Decode { .. } => ErrorKind::ResourceLookup,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<std::io::Error> for GcloudError {
    fn from(e: std::io::Error) -> Self {
        GcloudError::Provision(e.into())
    }
}

pub type Result<T> = std::result::Result<T, GcloudError>;
