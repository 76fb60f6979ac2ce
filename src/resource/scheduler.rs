//! Scheduler resource - systemd service and timer running the pull client
//!
//! The service is a oneshot invocation of the pull client as the service
//! account; the timer fires it after boot and then on a fixed interval with
//! randomized jitter so a fleet does not hit the git host in lockstep.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::config::TimerSettings;
use crate::prompt::{Prompter, required_input};
use crate::session::SessionState;
use crate::ui;

const UNIT_MODE: u32 = 0o644;
const VAULT_FLAG: &str = "--vault-password-file";

/// Everything the two unit files are composed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitParams {
    pub account: String,
    pub home: PathBuf,
    pub pull_binary: PathBuf,
    pub repo_url: String,
    pub branch: String,
    pub playbook: String,
    /// Passed to the pull client only when set
    pub vault_file: Option<PathBuf>,
}

/// Escape systemd specifiers (`%`) and variable expansion (`$`) in an
/// `ExecStart=` argument
fn escape_exec(value: &str) -> String {
    value.replace('%', "%%").replace('$', "$$")
}

pub fn compose_service(params: &UnitParams) -> String {
    let mut exec = format!(
        "{} --url {} --checkout {} --inventory localhost,",
        params.pull_binary.display(),
        escape_exec(&params.repo_url),
        escape_exec(&params.branch)
    );
    if let Some(vault) = &params.vault_file {
        exec.push_str(&format!(
            " {VAULT_FLAG} {}",
            escape_exec(&vault.to_string_lossy())
        ));
    }
    exec.push(' ');
    exec.push_str(&escape_exec(&params.playbook));

    format!(
        "[Unit]
Description=Pull and apply host configuration from {repo}
Wants=network-online.target
After=network-online.target

[Service]
Type=oneshot
User={account}
WorkingDirectory={home}
ExecStart={exec}
",
        repo = params.repo_url.replace('%', "%%"),
        account = params.account,
        home = params.home.display(),
    )
}

pub fn compose_timer(service_name: &str, timer: &TimerSettings) -> String {
    format!(
        "[Unit]
Description=Periodic configuration pull

[Timer]
OnBootSec={boot}
OnUnitActiveSec={interval}
RandomizedDelaySec={jitter}
Unit={service_name}

[Install]
WantedBy=timers.target
",
        boot = timer.boot_delay,
        interval = timer.interval,
        jitter = timer.jitter,
    )
}

fn uses_vault(service: &str) -> bool {
    service
        .lines()
        .any(|line| line.starts_with("ExecStart=") && line.contains(VAULT_FLAG))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerUnit;

/// Ask until the answer is one non-empty word, since whitespace would split
/// the `ExecStart=` argument
fn unit_word(prompter: &mut dyn Prompter, prompt: &str, default: Option<&str>) -> Result<String> {
    loop {
        let answer = required_input(prompter, prompt, default)?;
        if !answer.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Ok(answer);
        }
        ui::warn(&format!("{prompt}: must not contain spaces"));
    }
}

impl SchedulerUnit {
    fn collect_params(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<UnitParams> {
        let layout = ctx.layout;
        let git = &ctx.settings.git;

        let repo_url = unit_word(prompter, "Repository URL", session.repo_url.as_deref())?;
        let branch = unit_word(
            prompter,
            "Branch",
            Some(session.branch.as_deref().unwrap_or(&git.branch)),
        )?;
        let playbook = unit_word(
            prompter,
            "Playbook",
            Some(session.playbook.as_deref().unwrap_or(&git.playbook)),
        )?;

        session.repo_url = Some(repo_url.clone());
        session.branch = Some(branch.clone());
        session.playbook = Some(playbook.clone());

        let vault_file = if files::exists(&layout.vault_file)? {
            Some(layout.vault_file.clone())
        } else {
            ui::warn("No vault password file; the pull will run without vault decryption");
            None
        };

        Ok(UnitParams {
            account: layout.account.clone(),
            home: layout.home.clone(),
            pull_binary: ctx.settings.pull_binary.clone(),
            repo_url,
            branch,
            playbook,
            vault_file,
        })
    }

    fn write_unit(&self, path: &Path, content: &str) -> Result<bool> {
        let written = files::write_if_changed(path, content, UNIT_MODE)
            .with_context(|| format!("Failed to install {}", path.display()))?;
        if written {
            ui::success(&format!("Installed {}", path.display()));
        }
        Ok(written)
    }
}

impl Reconciler for SchedulerUnit {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SchedulerUnit
    }

    fn description(&self) -> String {
        "scheduled pull timer".to_string()
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let layout = ctx.layout;
        let service = files::read_if_exists(&layout.service_unit)?;
        let timer = files::exists(&layout.timer_unit)?;
        let active = ctx.backend.unit_active(&layout.timer_name)?;

        let mut result = InspectionResult::new(service.is_some() && timer)
            .with(
                "service",
                if service.is_some() { "present" } else { "absent" },
            )
            .with("timer", if timer { "present" } else { "absent" })
            .with("active", if active { "yes" } else { "no" });
        if let Some(service) = service {
            result = result.with("vault", if uses_vault(&service) { "yes" } else { "no" });
        }
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        ctx.require_account()?;
        let layout = ctx.layout;
        let existed = files::exists(&layout.service_unit)? || files::exists(&layout.timer_unit)?;

        let params = self.collect_params(ctx, session, prompter)?;
        let service_written = self.write_unit(&layout.service_unit, &compose_service(&params))?;
        let timer_written = self.write_unit(
            &layout.timer_unit,
            &compose_timer(&layout.service_name, &ctx.settings.timer),
        )?;
        let written = service_written || timer_written;

        if written {
            ctx.backend.reload_units()?;
        }
        let active = ctx.backend.unit_active(&layout.timer_name)?;
        if written || !active {
            ctx.backend.enable_now(&layout.timer_name)?;
            ui::success(&format!("Enabled and started {}", layout.timer_name));
        }

        Ok(match (written || !active, existed) {
            (false, _) => {
                ui::info(&format!("{} already up to date", layout.timer_name));
                ApplyResult::NoChange
            }
            (true, false) => ApplyResult::Created,
            (true, true) => ApplyResult::Modified,
        })
    }

    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        let inspection = match self.inspect(ctx) {
            Ok(inspection) => inspection,
            Err(e) => return HealthStatus::Warning(format!("could not inspect: {e:#}")),
        };
        if !inspection.present {
            return HealthStatus::missing();
        }

        let vault_present = files::exists(&ctx.layout.vault_file).unwrap_or(false);
        match (vault_present, inspection.detail("vault")) {
            (true, Some("no")) => HealthStatus::Warning(
                "vault file exists but the service does not use it".to_string(),
            ),
            (false, Some("yes")) => {
                HealthStatus::Warning("service references a missing vault file".to_string())
            }
            _ => HealthStatus::Ok,
        }
    }
}
