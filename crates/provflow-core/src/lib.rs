//! provflow orchestration engine
//!
//! Building blocks for provisioning an environment through an external
//! control-plane CLI, one fixed step after another.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  provflow CLI                    │
//! │        (ProvisionStep list + Provisioner)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                provflow-core                     │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │  Sequencer   │  │  EnvironmentContext      │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! │  ┌──────────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │ Tabular +    │  │ Template │  │ Firewall  │  │
//! │  │ Resolver     │  │ Mutator  │  │ Merger    │  │
//! │  └──────────────┘  └──────────┘  └───────────┘  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait CommandExecutor { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────┐
//! │        provflow-gcloud          │
//! │   (gcloud / gsutil / kubectl)   │
//! └─────────────────────────────────┘
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod firewall;
pub mod resolver;
pub mod sequencer;
pub mod tabular;
pub mod template;

// Re-exports
pub use context::{ContextKey, EnvironmentContext};
pub use error::{ErrorKind, ProvisionError, Result};
pub use executor::{CommandExecutor, CommandOutput, CommandSpec, ProcessExecutor};
#[cfg(any(test, feature = "test-utils"))]
pub use executor::ScriptedExecutor;
pub use firewall::{FirewallRule, NODE_RULE_SUFFIX};
pub use resolver::{EXTERNAL_ADDRESS, INSTANCE_GROUP, TableShape};
pub use sequencer::{StepRecord, StepSequencer, StepState, is_affirmative};
pub use tabular::Table;
pub use template::{TemplateGuard, restore_pending, with_mutation};
