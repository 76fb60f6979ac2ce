//! Service account resource - login account plus passwordless sudo grant

use anyhow::{Context, Result};

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::prompt::Prompter;
use crate::session::SessionState;
use crate::ui;

const GRANT_MODE: u32 = 0o440;
const SUDOERS_DIR_MODE: u32 = 0o750;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccount;

impl ServiceAccount {
    /// Content of the sudoers drop-in for `account`
    pub fn grant_line(account: &str) -> String {
        format!("{account} ALL=(ALL) NOPASSWD:ALL\n")
    }

    /// Write the grant only when the file is missing.
    ///
    /// An existing file is never touched, even if its content is stale.
    fn ensure_grant(&self, ctx: &HostContext) -> Result<bool> {
        let path = &ctx.layout.sudoers_file;
        if files::exists(path)? {
            log::debug!("Sudoers grant already present at {}", path.display());
            return Ok(false);
        }

        if let Some(dir) = path.parent() {
            files::ensure_dir(dir, SUDOERS_DIR_MODE)?;
        }
        files::write_atomic(
            path,
            Self::grant_line(&ctx.layout.account).as_bytes(),
            GRANT_MODE,
        )
        .context("Failed to write sudoers grant")?;
        ui::success(&format!("Wrote sudoers grant {}", path.display()));
        Ok(true)
    }
}

impl Reconciler for ServiceAccount {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Account
    }

    fn description(&self) -> String {
        "service account and sudo grant".to_string()
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let account = ctx.account()?;
        let grant = files::exists(&ctx.layout.sudoers_file)?;

        let mut result = InspectionResult::new(account.is_some() && grant)
            .with("grant", if grant { "present" } else { "absent" });
        result = match account {
            Some(account) => result
                .with("account", "present")
                .with("uid", account.uid.to_string())
                .with("home", account.home.to_string_lossy()),
            None => result.with("account", "absent"),
        };
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &HostContext,
        _session: &mut SessionState,
        _prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        let layout = ctx.layout;

        let created = if ctx.account()?.is_none() {
            ctx.backend
                .create_account(&layout.account, &layout.home, &layout.shell)
                .with_context(|| format!("Failed to create account '{}'", layout.account))?;
            ui::success(&format!(
                "Created account '{}' with home {}",
                layout.account,
                layout.home.display()
            ));
            true
        } else {
            ui::info(&format!("Account '{}' already exists", layout.account));
            false
        };

        let granted = self.ensure_grant(ctx)?;

        Ok(match (created, granted) {
            (true, _) => ApplyResult::Created,
            (false, true) => ApplyResult::Modified,
            (false, false) => ApplyResult::NoChange,
        })
    }

    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        let account = match ctx.account() {
            Ok(Some(account)) => account,
            Ok(None) => return HealthStatus::missing(),
            Err(e) => return HealthStatus::Warning(format!("could not inspect: {e:#}")),
        };

        let grant = &ctx.layout.sudoers_file;
        match files::mode_of(grant) {
            Ok(None) => HealthStatus::Warning(format!("no sudoers grant at {}", grant.display())),
            Ok(Some(mode)) if mode != GRANT_MODE => HealthStatus::Warning(format!(
                "sudoers grant has mode {mode:04o}, expected {GRANT_MODE:04o}"
            )),
            Err(e) => HealthStatus::Warning(format!("could not inspect grant: {e:#}")),
            Ok(Some(_)) if account.home != ctx.layout.home => HealthStatus::Warning(format!(
                "home is {}, expected {}",
                account.home.display(),
                ctx.layout.home.display()
            )),
            Ok(Some(_)) => HealthStatus::Ok,
        }
    }
}
