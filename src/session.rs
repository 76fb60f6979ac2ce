//! Operator answers collected during one run. Never persisted.

use std::fmt;

#[derive(Clone, Default)]
pub struct SessionState {
    pub git_host: Option<String>,
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub playbook: Option<String>,
    pub vault_password: Option<String>,
    pub role: Option<String>,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("git_host", &self.git_host)
            .field("repo_url", &self.repo_url)
            .field("branch", &self.branch)
            .field("playbook", &self.playbook)
            .field(
                "vault_password",
                &self.vault_password.as_ref().map(|_| "<redacted>"),
            )
            .field("role", &self.role)
            .finish()
    }
}
