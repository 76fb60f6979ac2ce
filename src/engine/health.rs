//! Health checker - independent verification pass over every resource
//!
//! Runs after the configuration pass whether or not anything was applied.
//! Never mutates host state, with one exception: the git probe connects with
//! `StrictHostKeyChecking=accept-new`, so the first successful contact pins
//! the git host's key in the service account's `known_hosts`. The managed
//! SSH config stanza sets the same policy, and the timer's first pull would
//! record the key anyway.

use colored::Colorize;
use hostkit::SshProbe;
use std::time::Duration;

use crate::resource::ssh_config::host_for_identity;
use crate::resource::{HealthStatus, HostContext, Reconciler, files};
use crate::session::SessionState;
use crate::ui;

pub const TIMER_CHECK: &str = "timer activation";
pub const GIT_CHECK: &str = "git connectivity";
pub const PULL_CHECK: &str = "pull client";

const PULL_CLIENT: &str = "ansible-pull";

/// Greetings git hosts print after a successful key handshake
const GREETINGS: &[&str] = &[
    "successfully authenticated",
    "welcome to gitlab",
    "authenticated via ssh key",
    "logged in as",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthEntry {
    pub label: String,
    pub status: HealthStatus,
}

#[derive(Debug, Default)]
pub struct HealthReport {
    pub entries: Vec<HealthEntry>,
}

impl HealthReport {
    pub fn healthy(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_ok()).count()
    }

    fn push(&mut self, label: &str, status: HealthStatus) {
        self.entries.push(HealthEntry {
            label: label.to_string(),
            status,
        });
    }
}

/// Verify every resource plus the live timer, git and pull-client checks
pub fn check(
    resources: &[Box<dyn Reconciler>],
    ctx: &HostContext,
    session: &SessionState,
) -> HealthReport {
    let mut report = HealthReport::default();

    for resource in resources {
        report.push(resource.kind().label(), resource.verify(ctx, session));
    }
    report.push(TIMER_CHECK, check_timer(ctx));
    report.push(GIT_CHECK, check_git(ctx, session));
    report.push(PULL_CHECK, check_pull_client(ctx));

    report
}

fn check_timer(ctx: &HostContext) -> HealthStatus {
    let layout = ctx.layout;
    let installed = files::exists(&layout.service_unit).unwrap_or(false)
        && files::exists(&layout.timer_unit).unwrap_or(false);

    match ctx.backend.unit_active(&layout.timer_name) {
        Ok(true) => HealthStatus::Ok,
        Ok(false) if installed => {
            HealthStatus::Warning(format!("{} is installed but inactive", layout.timer_name))
        }
        Ok(false) => HealthStatus::Fatal("inactive (units not installed)".to_string()),
        Err(e) => HealthStatus::Warning(format!("could not query systemd: {e}")),
    }
}

fn check_git(ctx: &HostContext, session: &SessionState) -> HealthStatus {
    let layout = ctx.layout;

    if !files::exists(&layout.private_key).unwrap_or(false) {
        return HealthStatus::Fatal("no ssh identity to authenticate with".to_string());
    }
    match ctx.account() {
        Ok(Some(_)) => {}
        Ok(None) => return HealthStatus::Fatal("service account missing".to_string()),
        Err(e) => return HealthStatus::Warning(format!("could not look up account: {e:#}")),
    }

    let configured = || {
        files::read_if_exists(&layout.ssh_config)
            .ok()
            .flatten()
            .and_then(|config| host_for_identity(&config, &layout.private_key))
    };
    let Some(host) = session.git_host.clone().or_else(configured) else {
        return HealthStatus::Warning("no git host configured for the identity".to_string());
    };

    let probe = SshProbe {
        account: layout.account.clone(),
        host: host.clone(),
        remote_user: "git".to_string(),
        identity: layout.private_key.clone(),
        connect_timeout: Duration::from_secs(ctx.settings.git.probe_timeout_secs),
    };
    log::debug!("Probing {host} as {}", layout.account);

    let output = match ctx.backend.probe_ssh(&probe) {
        Ok(output) => output,
        Err(e) => return HealthStatus::Warning(format!("probe could not run: {e}")),
    };
    let text = output.combined();
    if matches_greeting(&text) {
        return HealthStatus::Ok;
    }

    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("no response");
    if text.to_lowercase().contains("permission denied") {
        HealthStatus::Warning(format!(
            "{host} rejected the key; register the public key with the git host"
        ))
    } else {
        HealthStatus::Warning(format!("{host}: {}", first_line.trim()))
    }
}

/// Whether ssh output contains a known successful-auth greeting
pub fn matches_greeting(output: &str) -> bool {
    let lower = output.to_lowercase();
    GREETINGS.iter().any(|g| lower.contains(g))
}

fn check_pull_client(ctx: &HostContext) -> HealthStatus {
    if ctx.backend.command_exists(PULL_CLIENT) {
        HealthStatus::Ok
    } else {
        HealthStatus::Fatal(format!("{PULL_CLIENT} not found on PATH"))
    }
}

pub fn print_report(report: &HealthReport) {
    ui::header("Health Report");

    let width = report
        .entries
        .iter()
        .map(|e| e.label.len())
        .max()
        .unwrap_or(0);

    for entry in &report.entries {
        let tag = match entry.status {
            HealthStatus::Ok => "[ OK ]".green().bold(),
            HealthStatus::Warning(_) => "[WARN]".yellow().bold(),
            HealthStatus::Fatal(_) => "[FAIL]".red().bold(),
        };
        let state = entry.status.label();
        match entry.status.reason() {
            Some(reason) if reason != state => println!(
                "  {tag} {:<width$}  {state} {}",
                entry.label,
                format!("({reason})").dimmed()
            ),
            _ => println!("  {tag} {:<width$}  {state}", entry.label),
        }
    }

    println!();
    let total = report.entries.len();
    let healthy = report.healthy();
    if healthy == total {
        ui::success("All checks passed");
    } else {
        ui::warn(&format!("{healthy}/{total} checks healthy"));
    }
}
