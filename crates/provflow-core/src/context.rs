//! Identifiers derived while a run progresses
//!
//! Each key is written by exactly one step and read by later ones. Reading a key
//! that no step has produced yet is an ordering bug and fails loudly.

use crate::error::{ProvisionError, Result};
use std::collections::HashMap;
use std::fmt;

/// Names of the values accumulated in an [`EnvironmentContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    ProjectId,
    ServiceAccountEmail,
    ClusterName,
    InstanceGroupName,
    ExternalIpAddress,
    CertificateName,
    BackendServiceName,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextKey::ProjectId => "ProjectID",
            ContextKey::ServiceAccountEmail => "ServiceAccountEmail",
            ContextKey::ClusterName => "ClusterName",
            ContextKey::InstanceGroupName => "InstanceGroupName",
            ContextKey::ExternalIpAddress => "ExternalIPAddress",
            ContextKey::CertificateName => "CertificateName",
            ContextKey::BackendServiceName => "BackendServiceName",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
    values: HashMap<ContextKey, String>,
}

impl EnvironmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value for the first time
    pub fn set(&mut self, key: ContextKey, value: impl Into<String>) -> Result<()> {
        if self.values.contains_key(&key) {
            return Err(ProvisionError::ContextAlreadySet(key));
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: ContextKey) -> Result<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .ok_or(ProvisionError::MissingContext(key))
    }

    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
