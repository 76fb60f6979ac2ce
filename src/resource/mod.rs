//! Reconciler trait and types for host provisioning
//!
//! Every managed resource is modeled as a Reconciler with:
//! - Inspection (side-effect-free view of current state)
//! - Apply function (converge current → desired, no-op when already there)
//! - Verification (independent health classification)

use anyhow::{Result, bail};
use hostkit::{Account, Backend};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{Layout, Settings};
use crate::prompt::Prompter;
use crate::session::SessionState;

/// The fixed set of resource kinds, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Account,
    SshKey,
    SshHostConfig,
    VaultSecret,
    HostFacts,
    SchedulerUnit,
}

impl ResourceKind {
    /// Label used in the health report
    pub fn label(&self) -> &'static str {
        match self {
            Self::Account => "service account",
            Self::SshKey => "ssh identity",
            Self::SshHostConfig => "ssh host config",
            Self::VaultSecret => "vault secret",
            Self::HostFacts => "host facts",
            Self::SchedulerUnit => "scheduler units",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observed state of a resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionResult {
    pub present: bool,
    pub details: BTreeMap<String, String>,
}

impl InspectionResult {
    pub fn new(present: bool) -> Self {
        Self {
            present,
            details: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Already in the desired state
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Apply was skipped
    Skipped { reason: String },
    /// Apply failed
    Failed { error: String },
}

impl ApplyResult {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

/// Outcome of the verification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warning(String),
    Fatal(String),
}

impl HealthStatus {
    pub fn missing() -> Self {
        Self::Fatal("missing".to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// healthy / degraded / missing
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "healthy",
            Self::Warning(_) => "degraded",
            Self::Fatal(_) => "missing",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Warning(reason) | Self::Fatal(reason) => Some(reason),
        }
    }
}

/// Immutable configuration threaded through every reconciler call
pub struct HostContext<'a> {
    pub settings: &'a Settings,
    pub layout: &'a Layout,
    pub backend: &'a dyn Backend,
}

impl HostContext<'_> {
    /// Look up the managed service account
    pub fn account(&self) -> Result<Option<Account>> {
        Ok(self.backend.lookup_account(&self.layout.account)?)
    }

    /// The managed service account, which later resources depend on
    pub fn require_account(&self) -> Result<Account> {
        match self.account()? {
            Some(account) => Ok(account),
            None => bail!(
                "service account '{}' does not exist; create it first",
                self.layout.account
            ),
        }
    }
}

/// Core trait for all provisioned resources
pub trait Reconciler: fmt::Debug {
    fn kind(&self) -> ResourceKind;

    /// Human-readable description
    fn description(&self) -> String;

    /// Question asked before apply runs
    fn gate_prompt(&self) -> String {
        format!("Configure {}?", self.description())
    }

    /// Warning printed when the operator declines the gate
    fn decline_notice(&self) -> Option<String> {
        None
    }

    /// Observe current state without side effects
    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult>;

    /// Converge toward the desired state
    ///
    /// Must return `NoChange` when inspect already shows the resource
    /// correctly configured.
    fn apply(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult>;

    /// Classify health from a fresh inspection
    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        match self.inspect(ctx) {
            Ok(inspection) if inspection.present => HealthStatus::Ok,
            Ok(_) => HealthStatus::missing(),
            Err(e) => HealthStatus::Warning(format!("could not inspect: {e:#}")),
        }
    }
}

/// All provisioners in dependency order
pub fn provisioners() -> Vec<Box<dyn Reconciler>> {
    vec![
        Box::new(ServiceAccount),
        Box::new(SshIdentity),
        Box::new(SshHostConfig),
        Box::new(VaultSecret),
        Box::new(HostFacts),
        Box::new(SchedulerUnit),
    ]
}

pub mod account;
pub mod facts;
pub mod files;
pub mod scheduler;
pub mod ssh_config;
pub mod ssh_key;
pub mod vault;

pub use account::ServiceAccount;
pub use facts::HostFacts;
pub use scheduler::SchedulerUnit;
pub use ssh_config::SshHostConfig;
pub use ssh_key::SshIdentity;
pub use vault::VaultSecret;
