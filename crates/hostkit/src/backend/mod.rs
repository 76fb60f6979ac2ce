//! Backend abstraction for host operations.
//!
//! The [`Backend`] trait defines every interaction with the operating system
//! that is not plain file IO, allowing for different implementations (real
//! system tools, in-memory fakes for testing).

pub mod system;

use crate::error::Result;
use crate::types::{Account, CommandOutput, OsFamily, SshProbe};
use std::path::Path;

/// Backend trait for host operations.
///
/// Runs are single-threaded, so implementations need not be `Sync`.
pub trait Backend {
    /// Look up an account in the identity database.
    ///
    /// Returns `Ok(None)` when the account does not exist.
    fn lookup_account(&self, name: &str) -> Result<Option<Account>>;

    /// Create a login account with a home directory and shell.
    fn create_account(&self, name: &str, home: &Path, shell: &str) -> Result<()>;

    /// Give `path` to the account and its primary group.
    fn set_owner(&self, path: &Path, account: &Account) -> Result<()>;

    /// Short hostname of this machine.
    fn hostname(&self) -> Result<String>;

    /// Generate an ed25519 key pair without passphrase at `private_key`.
    ///
    /// The public half is written next to it with a `.pub` suffix.
    fn generate_keypair(&self, private_key: &Path, comment: &str) -> Result<()>;

    /// Reload the service manager's unit cache.
    fn reload_units(&self) -> Result<()>;

    /// Enable a unit and start it immediately.
    fn enable_now(&self, unit: &str) -> Result<()>;

    /// Whether a unit is currently active.
    fn unit_active(&self, unit: &str) -> Result<bool>;

    /// Attempt a non-interactive SSH handshake and capture its output.
    fn probe_ssh(&self, probe: &SshProbe) -> Result<CommandOutput>;

    /// Install packages with the family's package manager.
    fn install_packages(&self, family: OsFamily, packages: &[String]) -> Result<()>;

    /// Check if a command exists on `PATH`.
    fn command_exists(&self, cmd: &str) -> bool;
}

/// Get the default backend (real system tools).
pub fn default_backend() -> system::SystemBackend {
    system::SystemBackend::new()
}
