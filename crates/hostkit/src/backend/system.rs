//! Real backend using system tools (`getent`, `useradd`, `ssh-keygen`,
//! `systemctl`, `ssh` and the distribution package manager).

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::packages;
use crate::types::{Account, CommandOutput, OsFamily, SshProbe};
use std::path::Path;
use std::process::{Command, Stdio};

/// Exit status of `getent` when the key is not in the database.
const GETENT_NOT_FOUND: i32 = 2;

/// Backend that executes real system commands.
#[derive(Debug, Default)]
pub struct SystemBackend;

impl SystemBackend {
    /// Create a new SystemBackend.
    pub fn new() -> Self {
        Self
    }

    /// Run a command and capture its output.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<std::process::Output> {
        log::debug!("Running: {} {}", cmd, args.join(" "));
        Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::CommandFailed {
                command: cmd.to_string(),
                stderr: format!("failed to execute: {e}"),
            })
    }

    /// Run a command and check for success.
    fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.run(cmd, args)?;

        if !output.status.success() {
            return Err(Error::command(cmd, args, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a command with inherited stdio so long installs show progress.
    fn run_inherit(&self, cmd: &str, args: &[&str]) -> Result<()> {
        log::debug!("Running: {} {}", cmd, args.join(" "));
        let status = Command::new(cmd)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::CommandFailed {
                command: cmd.to_string(),
                stderr: format!("failed to execute: {e}"),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                command: format!("{} {}", cmd, args.join(" ")),
                stderr: format!("exited with {status}"),
            })
        }
    }
}

impl Backend for SystemBackend {
    fn lookup_account(&self, name: &str) -> Result<Option<Account>> {
        let output = self.run("getent", &["passwd", name])?;

        if output.status.code() == Some(GETENT_NOT_FOUND) {
            return Ok(None);
        }
        if !output.status.success() {
            return Err(Error::command("getent", &["passwd", name], &output.stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().next() {
            Some(line) => Account::from_passwd_line(line).map(Some),
            None => Ok(None),
        }
    }

    fn create_account(&self, name: &str, home: &Path, shell: &str) -> Result<()> {
        let home = home.to_string_lossy();
        self.run_checked(
            "useradd",
            &["--create-home", "--home-dir", &home, "--shell", shell, name],
        )?;
        Ok(())
    }

    fn set_owner(&self, path: &Path, account: &Account) -> Result<()> {
        std::os::unix::fs::chown(path, Some(account.uid), Some(account.gid))?;
        Ok(())
    }

    fn hostname(&self) -> Result<String> {
        if let Ok(name) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
            let name = name.trim();
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }
        self.run_checked("hostname", &[])
    }

    fn generate_keypair(&self, private_key: &Path, comment: &str) -> Result<()> {
        let key = private_key.to_string_lossy();
        self.run_checked(
            "ssh-keygen",
            &["-q", "-t", "ed25519", "-N", "", "-C", comment, "-f", &key],
        )?;
        Ok(())
    }

    fn reload_units(&self) -> Result<()> {
        self.run_checked("systemctl", &["daemon-reload"])?;
        Ok(())
    }

    fn enable_now(&self, unit: &str) -> Result<()> {
        self.run_checked("systemctl", &["enable", "--now", unit])?;
        Ok(())
    }

    fn unit_active(&self, unit: &str) -> Result<bool> {
        let output = self.run("systemctl", &["is-active", "--quiet", unit])?;
        Ok(output.status.success())
    }

    fn probe_ssh(&self, probe: &SshProbe) -> Result<CommandOutput> {
        let identity = probe.identity.to_string_lossy();
        let timeout = format!("ConnectTimeout={}", probe.connect_timeout.as_secs().max(1));
        let target = format!("{}@{}", probe.remote_user, probe.host);
        let output = self.run(
            "runuser",
            &[
                "-u",
                &probe.account,
                "--",
                "ssh",
                "-T",
                "-o",
                "BatchMode=yes",
                "-o",
                &timeout,
                // Pins the host key on first contact, as the managed stanza does
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-i",
                &identity,
                &target,
            ],
        )?;
        Ok(output.into())
    }

    fn install_packages(&self, family: OsFamily, packages: &[String]) -> Result<()> {
        for command in packages::install_commands(family, packages) {
            let Some((cmd, args)) = command.split_first() else {
                continue;
            };
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            self.run_inherit(cmd, &args)?;
        }
        Ok(())
    }

    fn command_exists(&self, cmd: &str) -> bool {
        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}
