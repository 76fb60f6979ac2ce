//! Error types for host operations.
//!
//! Errors are categorized so the caller can tell setup failures, which abort
//! a run before anything is touched, apart from failures that only affect a
//! single resource.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of host errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Process lacks the privilege to manage the host
    Privilege,
    /// Operating system family is not supported
    Platform,
    /// An external command could not run or exited non-zero
    Command,
    /// Filesystem access failed
    Io,
    /// Output of a system tool could not be understood
    Parse,
}

impl ErrorCategory {
    /// Whether errors of this category must abort the run before any mutation.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(self, Self::Privilege | Self::Platform)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Privilege => "Insufficient privilege",
            Self::Platform => "Unsupported platform",
            Self::Command => "Command failed",
            Self::Io => "Filesystem error",
            Self::Parse => "Unexpected tool output",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Privilege => "Re-run as root, for example with sudo",
            Self::Platform => "Supported families: Debian, Red Hat, Arch, SUSE, Alpine",
            Self::Command => "Check the command output above for details",
            Self::Io => "Check directory permissions and free space",
            Self::Parse => "Check the system tool version",
        }
    }
}

/// Errors that can occur while inspecting or changing the host.
#[derive(Debug, Error)]
pub enum Error {
    /// The effective user is not root
    #[error("must be run as root (effective uid {euid})")]
    NotPrivileged {
        /// Effective uid of the current process
        euid: u32,
    },

    /// The OS family could not be mapped to a package manager
    #[error("unsupported operating system: {id}")]
    UnsupportedPlatform {
        /// `ID` field of os-release (and `ID_LIKE`, when present)
        id: String,
    },

    /// os-release could not be read
    #[error("could not read {path}: {source}")]
    OsRelease {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Command execution failed
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// Command line that failed
        command: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Output of a system tool was malformed
    #[error("could not parse {what}: {line}")]
    Parse {
        /// What was being parsed
        what: &'static str,
        /// Offending input
        line: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotPrivileged { .. } => ErrorCategory::Privilege,
            Error::UnsupportedPlatform { .. } | Error::OsRelease { .. } => ErrorCategory::Platform,
            Error::CommandFailed { .. } => ErrorCategory::Command,
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error must abort the run.
    pub fn is_fatal_setup(&self) -> bool {
        self.category().is_fatal_setup()
    }

    /// Build a command failure from captured stderr.
    pub fn command(command: &str, args: &[&str], stderr: &[u8]) -> Self {
        Error::CommandFailed {
            command: format!("{} {}", command, args.join(" ")).trim_end().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_are_fatal() {
        assert!(Error::NotPrivileged { euid: 1000 }.is_fatal_setup());
        assert!(
            Error::UnsupportedPlatform {
                id: "plan9".to_string()
            }
            .is_fatal_setup()
        );
    }

    #[test]
    fn test_command_errors_are_contained() {
        let err = Error::command("useradd", &["-m", "ansible"], b"useradd: cannot lock\n");
        assert_eq!(err.category(), ErrorCategory::Command);
        assert!(!err.is_fatal_setup());
        assert_eq!(
            err.to_string(),
            "useradd -m ansible failed: useradd: cannot lock"
        );
    }

    #[test]
    fn test_privilege_message() {
        let err = Error::NotPrivileged { euid: 1000 };
        assert_eq!(err.to_string(), "must be run as root (effective uid 1000)");
        assert_eq!(err.category().advice(), "Re-run as root, for example with sudo");
    }
}
