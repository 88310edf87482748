//! Provisioning error types

use crate::context::ContextKey;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used to decide how a run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required binary, configuration or input file is missing
    Preflight,
    /// Operator declined a confirmation gate
    UserAbort,
    /// A derived identifier could not be recovered
    ResourceLookup,
    /// A provisioning call exited non-zero (strict mode only)
    ExternalCommand,
    /// Local I/O failure
    Io,
}

impl ErrorKind {
    /// Process exit status for a run that ended with this kind of error
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::UserAbort => 0,
            _ => 1,
        }
    }
}

/// Provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{0} not found. Please install it and make sure it is on PATH")]
    BinaryNotFound(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Aborted at step {step}: {reason}")]
    UserAbort { step: usize, reason: String },

    #[error("Command produced no output to parse")]
    EmptyOutput,

    #[error("Token index {index} is out of range ({len} tokens)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unexpected {table} table: {reason}")]
    UnexpectedTable { table: &'static str, reason: String },

    #[error("No firewall rule matching *{0}")]
    NoMatchingRule(String),

    #[error("{0} has not been resolved yet")]
    MissingContext(ContextKey),

    #[error("{0} is already set")]
    ContextAlreadySet(ContextKey),

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BinaryNotFound(_) | Self::MissingConfig(_) | Self::FileNotFound(_) => {
                ErrorKind::Preflight
            }
            Self::UserAbort { .. } => ErrorKind::UserAbort,
            Self::EmptyOutput
            | Self::IndexOutOfRange { .. }
            | Self::UnexpectedTable { .. }
            | Self::NoMatchingRule(_)
            | Self::MissingContext(_)
            | Self::ContextAlreadySet(_) => ErrorKind::ResourceLookup,
            Self::CommandFailed { .. } => ErrorKind::ExternalCommand,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    pub fn is_user_abort(&self) -> bool {
        self.kind() == ErrorKind::UserAbort
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
