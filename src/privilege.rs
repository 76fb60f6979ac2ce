//! Privilege gate
//!
//! Every resource lives in root-owned locations (`/etc`, other users' homes,
//! the systemd unit directory), so the whole run requires euid 0.

use hostkit::{Error, Result};

/// Effective uid of this process
#[allow(unsafe_code)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() }
}

/// Fail unless running as root
pub fn require_root() -> Result<()> {
    check_euid(effective_uid())
}

fn check_euid(euid: u32) -> Result<()> {
    if euid == 0 {
        Ok(())
    } else {
        Err(Error::NotPrivileged { euid })
    }
}
