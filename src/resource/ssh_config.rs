//! SSH client config resource - per-host stanza binding the git host to the
//! managed identity

use anyhow::Result;
use std::path::Path;

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::prompt::{Prompter, required_input};
use crate::session::SessionState;
use crate::ui;

const CONFIG_MODE: u32 = 0o600;
const SSH_DIR_MODE: u32 = 0o700;

#[derive(Debug, Clone, Copy, Default)]
pub struct SshHostConfig;

/// Render the stanza for `host` using `identity`
pub fn render_stanza(host: &str, identity: &Path) -> String {
    format!(
        "Host {host}\n    HostName {host}\n    User git\n    IdentityFile {}\n    IdentitiesOnly yes\n    StrictHostKeyChecking accept-new\n",
        identity.display()
    )
}

/// One `Host`/`Match` block, or the preamble before the first one
#[derive(Debug, Default)]
struct Block {
    /// Comment lines sitting directly above the block keyword
    lead: String,
    body: String,
}

impl Block {
    fn is_empty(&self) -> bool {
        self.lead.trim().is_empty() && self.body.trim().is_empty()
    }

    fn render(&self) -> String {
        [trim_blank_lines(&self.lead), trim_blank_lines(&self.body)]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}

/// Split a config into blocks, each starting at a `Host` or `Match` line.
/// Comments directly above a keyword belong to the block that follows.
/// Lines before the first such keyword form a leading block.
fn split_blocks(config: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current = Block::default();
    let mut pending = String::new();

    for line in config.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            pending.push_str(line);
            pending.push('\n');
            continue;
        }

        let keyword = trimmed.split_whitespace().next().unwrap_or_default();
        if keyword.eq_ignore_ascii_case("host") || keyword.eq_ignore_ascii_case("match") {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            current.lead = std::mem::take(&mut pending);
        } else {
            current.body.push_str(&std::mem::take(&mut pending));
        }
        current.body.push_str(line);
        current.body.push('\n');
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    // Trailing comments stand alone so replacing the last block keeps them
    if !pending.trim().is_empty() {
        blocks.push(Block {
            lead: String::new(),
            body: pending,
        });
    }
    blocks
}

/// Patterns of a `Host` block, empty for anything else
fn host_patterns(body: &str) -> Vec<&str> {
    let Some(first) = body.lines().next() else {
        return Vec::new();
    };
    let mut tokens = first.split_whitespace();
    match tokens.next() {
        Some(keyword) if keyword.eq_ignore_ascii_case("host") => tokens.collect(),
        _ => Vec::new(),
    }
}

/// Rewrite the `Host` line of `body` to list only `patterns`
fn with_patterns(body: &str, patterns: &[String]) -> String {
    let mut lines = body.lines();
    let first = lines.next().unwrap_or_default();
    let indent = &first[..first.len() - first.trim_start().len()];
    let keyword = first.split_whitespace().next().unwrap_or("Host");

    let mut out = format!("{indent}{keyword} {}\n", patterns.join(" "));
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn block_value<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    block.lines().skip(1).find_map(|line| {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(k) if k.eq_ignore_ascii_case(key) => tokens.next(),
            _ => None,
        }
    })
}

/// Replace the stanza for `host` in `existing`, or append one.
///
/// Other hosts keep their bindings: a block listing several patterns only
/// loses `host` from its `Host` line, and comments above a replaced block
/// stay in place.
pub fn merge_stanza(existing: &str, host: &str, stanza: &str) -> String {
    let mut placed = false;
    let mut rendered: Vec<String> = Vec::new();

    for block in split_blocks(existing) {
        let patterns = host_patterns(&block.body);
        if !patterns.iter().any(|p| p.eq_ignore_ascii_case(host)) {
            rendered.push(block.render());
            continue;
        }
        let others: Vec<String> = patterns
            .into_iter()
            .filter(|p| !p.eq_ignore_ascii_case(host))
            .map(str::to_string)
            .collect();

        let mut lead = block.lead;
        if !others.is_empty() {
            let rest = Block {
                lead: std::mem::take(&mut lead),
                body: with_patterns(&block.body, &others),
            };
            rendered.push(rest.render());
        }
        let body = if placed {
            String::new()
        } else {
            placed = true;
            stanza.to_string()
        };
        rendered.push(Block { lead, body }.render());
    }
    if !placed {
        rendered.push(trim_blank_lines(stanza));
    }

    let parts: Vec<&str> = rendered
        .iter()
        .map(String::as_str)
        .filter(|part| !part.is_empty())
        .collect();
    format!("{}\n", parts.join("\n\n"))
}

/// First concrete host whose stanza uses `identity`
pub fn host_for_identity(config: &str, identity: &Path) -> Option<String> {
    let identity = identity.to_string_lossy();
    split_blocks(config).iter().find_map(|block| {
        if block_value(&block.body, "IdentityFile") != Some(&*identity) {
            return None;
        }
        host_patterns(&block.body)
            .into_iter()
            .find(|p| !p.contains(['*', '?', '!']))
            .map(str::to_string)
    })
}

impl Reconciler for SshHostConfig {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SshHostConfig
    }

    fn description(&self) -> String {
        "SSH client config for the git host".to_string()
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let Some(config) = files::read_if_exists(&ctx.layout.ssh_config)? else {
            return Ok(InspectionResult::new(false));
        };

        let patterns: Vec<String> = split_blocks(&config)
            .iter()
            .flat_map(|b| {
                host_patterns(&b.body)
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut result = InspectionResult::new(true).with("hosts", patterns.join(" "));
        if let Some(host) = host_for_identity(&config, &ctx.layout.private_key) {
            result = result.with("git_host", host);
        }
        Ok(result)
    }

    fn apply(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        let account = ctx.require_account()?;
        let layout = ctx.layout;

        let default_host = session
            .git_host
            .clone()
            .unwrap_or_else(|| ctx.settings.git.host.clone());
        let host = required_input(prompter, "Git host domain", Some(&default_host))?;

        let existing = files::read_if_exists(&layout.ssh_config)?;
        let stanza = render_stanza(&host, &layout.private_key);
        let merged = merge_stanza(existing.as_deref().unwrap_or_default(), &host, &stanza);
        session.git_host = Some(host.clone());

        if files::ensure_dir(&layout.ssh_dir, SSH_DIR_MODE)? {
            ctx.backend.set_owner(&layout.ssh_dir, &account)?;
        }
        if !files::write_if_changed(&layout.ssh_config, &merged, CONFIG_MODE)? {
            ui::info(&format!("SSH config already has a stanza for {host}"));
            return Ok(ApplyResult::NoChange);
        }
        ctx.backend.set_owner(&layout.ssh_config, &account)?;

        ui::success(&format!(
            "Wrote stanza for {host} to {}",
            layout.ssh_config.display()
        ));
        Ok(if existing.is_some() {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
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

        match files::mode_of(&ctx.layout.ssh_config) {
            Ok(Some(mode)) if mode != CONFIG_MODE => {
                return HealthStatus::Warning(format!(
                    "config has mode {mode:04o}, expected {CONFIG_MODE:04o}"
                ));
            }
            Err(e) => return HealthStatus::Warning(format!("could not inspect: {e:#}")),
            Ok(_) => {}
        }

        if inspection.detail("git_host").is_none() {
            return HealthStatus::Warning("no stanza uses the managed identity".to_string());
        }
        HealthStatus::Ok
    }
}
