//! SSH identity resource - ed25519 key pair for pulling from the git host

use anyhow::{Context, Result, bail};
use hostkit::Account;
use std::fs;

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::prompt::Prompter;
use crate::session::SessionState;
use crate::{progress, ui};

const SSH_DIR_MODE: u32 = 0o700;
const PRIVATE_MODE: u32 = 0o600;
const PUBLIC_MODE: u32 = 0o644;

#[derive(Debug, Clone, Copy, Default)]
pub struct SshIdentity;

impl SshIdentity {
    fn generate(&self, ctx: &HostContext, account: &Account) -> Result<()> {
        let layout = ctx.layout;

        if files::ensure_dir(&layout.ssh_dir, SSH_DIR_MODE)? {
            ctx.backend.set_owner(&layout.ssh_dir, account)?;
        }

        let hostname = ctx.backend.hostname().context("Failed to read hostname")?;
        let comment = format!("{}@{}", layout.account, hostname);

        let pb = progress::spinner("Generating ed25519 key pair...");
        let generated = ctx.backend.generate_keypair(&layout.private_key, &comment);
        progress::finish_clear(&pb);
        generated.context("ssh-keygen failed")?;

        files::set_mode(&layout.private_key, PRIVATE_MODE)?;
        files::set_mode(&layout.public_key, PUBLIC_MODE)?;
        ctx.backend.set_owner(&layout.private_key, account)?;
        ctx.backend.set_owner(&layout.public_key, account)?;
        Ok(())
    }

    /// Remove whatever half of a pair a failed generation left behind
    fn remove_partial(&self, ctx: &HostContext) {
        for path in [&ctx.layout.private_key, &ctx.layout.public_key] {
            if let Err(e) = fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("Could not remove {}: {e}", path.display());
            }
        }
    }

    fn print_public_key(&self, ctx: &HostContext) -> Result<()> {
        let public = fs::read_to_string(&ctx.layout.public_key)
            .with_context(|| format!("Failed to read {}", ctx.layout.public_key.display()))?;
        ui::section("Public key");
        println!("{}", public.trim());
        println!();
        ui::info("Register this key with your git host (for example as a read-only deploy key)");
        ui::info("before the first scheduled pull runs.");
        Ok(())
    }
}

impl Reconciler for SshIdentity {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SshKey
    }

    fn description(&self) -> String {
        "SSH key pair".to_string()
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let private = files::exists(&ctx.layout.private_key)?;
        let public = files::exists(&ctx.layout.public_key)?;

        let mut result = InspectionResult::new(private && public)
            .with("private", if private { "present" } else { "absent" })
            .with("public", if public { "present" } else { "absent" });

        if public
            && let Some(comment) = files::read_if_exists(&ctx.layout.public_key)?
                .as_deref()
                .and_then(|line| line.split_whitespace().nth(2))
        {
            result = result.with("comment", comment);
        }
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &HostContext,
        _session: &mut SessionState,
        _prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        let inspection = self.inspect(ctx)?;
        if inspection.present {
            ui::warn(&format!(
                "SSH key pair already exists at {}, not overwriting",
                ctx.layout.private_key.display()
            ));
            return Ok(ApplyResult::NoChange);
        }
        if inspection.detail("private") == Some("present")
            || inspection.detail("public") == Some("present")
        {
            bail!(
                "incomplete key pair in {}; restore or remove it before generating a new one",
                ctx.layout.ssh_dir.display()
            );
        }

        let account = ctx.require_account()?;
        if let Err(e) = self.generate(ctx, &account) {
            self.remove_partial(ctx);
            return Err(e);
        }

        ui::success(&format!("Generated {}", ctx.layout.private_key.display()));
        self.print_public_key(ctx)?;
        Ok(ApplyResult::Created)
    }

    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        let inspection = match self.inspect(ctx) {
            Ok(inspection) => inspection,
            Err(e) => return HealthStatus::Warning(format!("could not inspect: {e:#}")),
        };

        if !inspection.present {
            let half = inspection.detail("private") == Some("present")
                || inspection.detail("public") == Some("present");
            return if half {
                HealthStatus::Warning("incomplete key pair".to_string())
            } else {
                HealthStatus::missing()
            };
        }

        match files::mode_of(&ctx.layout.private_key) {
            Ok(Some(mode)) if mode & 0o077 != 0 => HealthStatus::Warning(format!(
                "private key has mode {mode:04o}, expected {PRIVATE_MODE:04o}"
            )),
            Ok(_) => HealthStatus::Ok,
            Err(e) => HealthStatus::Warning(format!("could not inspect: {e:#}")),
        }
    }
}
