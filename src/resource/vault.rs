//! Vault secret resource - password file used to decrypt vaulted variables

use anyhow::{Context, Result};

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::prompt::Prompter;
use crate::session::SessionState;
use crate::ui;

const SECRET_MODE: u32 = 0o400;
const VAULT_DIR_MODE: u32 = 0o700;

#[derive(Debug, Clone, Copy, Default)]
pub struct VaultSecret;

impl VaultSecret {
    /// Read a non-empty secret, or `None` when the operator gives up
    fn read_secret(&self, prompter: &mut dyn Prompter) -> Result<Option<String>> {
        loop {
            let secret = prompter.secret("Vault password")?;
            if !secret.trim().is_empty() {
                return Ok(Some(secret));
            }
            ui::warn("Vault password must not be empty");
            if !prompter.confirm("Try again?", true)? {
                return Ok(None);
            }
        }
    }
}

impl Reconciler for VaultSecret {
    fn kind(&self) -> ResourceKind {
        ResourceKind::VaultSecret
    }

    fn description(&self) -> String {
        "vault password file".to_string()
    }

    fn decline_notice(&self) -> Option<String> {
        Some("No vault password file; scheduled pulls will not decrypt vaulted data".to_string())
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let present = files::exists(&ctx.layout.vault_file)?;
        let mut result = InspectionResult::new(present);
        if let Some(mode) = files::mode_of(&ctx.layout.vault_file)? {
            result = result.with("mode", format!("{mode:04o}"));
        }
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        let layout = ctx.layout;

        if let Some(mode) = files::mode_of(&layout.vault_file)? {
            if mode == SECRET_MODE {
                ui::info("Vault password file already present");
                return Ok(ApplyResult::NoChange);
            }
            files::set_mode(&layout.vault_file, SECRET_MODE)?;
            ui::success(&format!(
                "Tightened {} from {mode:04o} to {SECRET_MODE:04o}",
                layout.vault_file.display()
            ));
            return Ok(ApplyResult::Modified);
        }

        let account = ctx.require_account()?;
        let Some(secret) = self.read_secret(prompter)? else {
            if let Some(notice) = self.decline_notice() {
                ui::warn(&notice);
            }
            return Ok(ApplyResult::Skipped {
                reason: "no password entered".to_string(),
            });
        };

        if files::ensure_dir(&layout.vault_dir, VAULT_DIR_MODE)? {
            ctx.backend.set_owner(&layout.vault_dir, &account)?;
        }
        files::write_atomic(&layout.vault_file, secret.as_bytes(), SECRET_MODE)
            .context("Failed to write vault password file")?;
        ctx.backend.set_owner(&layout.vault_file, &account)?;

        session.vault_password = Some(secret);
        ui::success(&format!("Wrote {}", layout.vault_file.display()));
        Ok(ApplyResult::Created)
    }

    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        match files::mode_of(&ctx.layout.vault_file) {
            Ok(None) => HealthStatus::missing(),
            Ok(Some(mode)) if mode != SECRET_MODE => HealthStatus::Warning(format!(
                "mode {mode:04o}, expected {SECRET_MODE:04o}"
            )),
            Ok(Some(_)) => HealthStatus::Ok,
            Err(e) => HealthStatus::Warning(format!("could not inspect: {e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Answer, Fixture, ScriptedPrompter};
    use std::fs;

    #[test]
    fn test_writes_owner_read_only_secret() {
        let fixture = Fixture::with_account();
        let mut session = SessionState::default();
        let mut prompter = ScriptedPrompter::new(vec![Answer::text("hunter2")]);

        let result = VaultSecret
            .apply(&fixture.ctx(), &mut session, &mut prompter)
            .unwrap();
        assert_eq!(result, ApplyResult::Created);
        assert_eq!(
            fs::read_to_string(&fixture.layout.vault_file).unwrap(),
            "hunter2"
        );
        assert_eq!(
            files::mode_of(&fixture.layout.vault_file).unwrap(),
            Some(0o400)
        );
        assert_eq!(
            files::mode_of(&fixture.layout.vault_dir).unwrap(),
            Some(0o700)
        );
        assert_eq!(session.vault_password.as_deref(), Some("hunter2"));
        assert_eq!(VaultSecret.verify(&fixture.ctx(), &session), HealthStatus::Ok);
    }

    #[test]
    fn test_rejects_empty_input_until_non_empty() {
        let fixture = Fixture::with_account();
        let mut prompter = ScriptedPrompter::new(vec![
            Answer::text(""),
            Answer::Yes,
            Answer::text("  "),
            Answer::Yes,
            Answer::text("s3cret"),
        ]);

        let result = VaultSecret
            .apply(&fixture.ctx(), &mut SessionState::default(), &mut prompter)
            .unwrap();
        assert_eq!(result, ApplyResult::Created);
        assert_eq!(prompter.remaining(), 0);
        assert_eq!(
            prompter.asked().iter().filter(|p| *p == "Try again?").count(),
            2
        );
    }

    #[test]
    fn test_giving_up_is_a_skip() {
        let fixture = Fixture::with_account();
        let before = VaultSecret.inspect(&fixture.ctx()).unwrap();
        let mut prompter = ScriptedPrompter::new(vec![Answer::text(""), Answer::No]);

        let result = VaultSecret
            .apply(&fixture.ctx(), &mut SessionState::default(), &mut prompter)
            .unwrap();
        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert_eq!(VaultSecret.inspect(&fixture.ctx()).unwrap(), before);
        assert!(!fixture.layout.vault_dir.exists());
    }

    #[test]
    fn test_existing_secret_is_kept_and_tightened() {
        let fixture = Fixture::with_account();
        fs::create_dir_all(&fixture.layout.vault_dir).unwrap();
        fs::write(&fixture.layout.vault_file, "old").unwrap();
        files::set_mode(&fixture.layout.vault_file, 0o644).unwrap();
        assert!(matches!(
            VaultSecret.verify(&fixture.ctx(), &SessionState::default()),
            HealthStatus::Warning(_)
        ));

        let mut prompter = ScriptedPrompter::default();
        let mut session = SessionState::default();
        let first = VaultSecret
            .apply(&fixture.ctx(), &mut session, &mut prompter)
            .unwrap();
        let second = VaultSecret
            .apply(&fixture.ctx(), &mut session, &mut prompter)
            .unwrap();

        assert_eq!(first, ApplyResult::Modified);
        assert_eq!(second, ApplyResult::NoChange);
        assert_eq!(fs::read_to_string(&fixture.layout.vault_file).unwrap(), "old");
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_owner_writable_secret_is_degraded() {
        let fixture = Fixture::with_account();
        fs::create_dir_all(&fixture.layout.vault_dir).unwrap();
        fs::write(&fixture.layout.vault_file, "old").unwrap();
        files::set_mode(&fixture.layout.vault_file, 0o600).unwrap();

        let session = SessionState::default();
        assert!(matches!(
            VaultSecret.verify(&fixture.ctx(), &session),
            HealthStatus::Warning(ref r) if r.contains("0600")
        ));

        let mut prompter = ScriptedPrompter::default();
        let result = VaultSecret
            .apply(&fixture.ctx(), &mut SessionState::default(), &mut prompter)
            .unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(VaultSecret.verify(&fixture.ctx(), &session), HealthStatus::Ok);
    }
}
