//! Core types for host management.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

/// Linux distribution family, which selects the package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Debian, Ubuntu and derivatives (apt)
    Debian,
    /// Fedora, RHEL, CentOS, Rocky, Alma (dnf)
    RedHat,
    /// Arch and derivatives (pacman)
    Arch,
    /// openSUSE and SLES (zypper)
    Suse,
    /// Alpine (apk)
    Alpine,
}

impl OsFamily {
    /// Map an os-release identifier to a family.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => Some(Self::Debian),
            "rhel" | "fedora" | "centos" | "rocky" | "almalinux" | "ol" | "amzn" => {
                Some(Self::RedHat)
            }
            "arch" | "manjaro" | "endeavouros" => Some(Self::Arch),
            "suse" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" => {
                Some(Self::Suse)
            }
            "alpine" => Some(Self::Alpine),
            _ => None,
        }
    }

    /// Name of the package manager binary for this family.
    pub fn package_manager(&self) -> &'static str {
        match self {
            Self::Debian => "apt-get",
            Self::RedHat => "dnf",
            Self::Arch => "pacman",
            Self::Suse => "zypper",
            Self::Alpine => "apk",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::RedHat => "redhat",
            Self::Arch => "arch",
            Self::Suse => "suse",
            Self::Alpine => "alpine",
        };
        write!(f, "{name}")
    }
}

/// Detected platform information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// os-release `ID`
    pub id: String,
    /// os-release `PRETTY_NAME`, falling back to `ID`
    pub name: String,
    /// Distribution family
    pub family: OsFamily,
}

/// An entry of the system identity database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name
    pub name: String,
    /// Numeric user id
    pub uid: u32,
    /// Primary group id
    pub gid: u32,
    /// Home directory
    pub home: PathBuf,
    /// Login shell
    pub shell: String,
}

impl Account {
    /// Parse a `passwd(5)` line as printed by `getent passwd`.
    pub fn from_passwd_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end().split(':').collect();
        if fields.len() != 7 {
            return Err(Error::Parse {
                what: "passwd entry",
                line: line.to_string(),
            });
        }

        let parse_id = |raw: &str| {
            raw.parse::<u32>().map_err(|_| Error::Parse {
                what: "passwd entry",
                line: line.to_string(),
            })
        };

        Ok(Self {
            name: fields[0].to_string(),
            uid: parse_id(fields[2])?,
            gid: parse_id(fields[3])?,
            home: PathBuf::from(fields[5]),
            shell: fields[6].to_string(),
        })
    }
}

/// A non-interactive SSH authentication probe against a git host.
#[derive(Debug, Clone)]
pub struct SshProbe {
    /// Local account the probe runs as
    pub account: String,
    /// Remote host to contact
    pub host: String,
    /// Remote user (`git` for every major forge)
    pub remote_user: String,
    /// Private key to authenticate with
    pub identity: PathBuf,
    /// Upper bound for establishing the connection
    pub connect_timeout: Duration,
}

/// Output from an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
    /// Whether the command exited with status zero
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Stdout and stderr joined; ssh prints forge greetings on stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout_str(), self.stderr_str())
    }
}
