//! Settings and derived host layout
//!
//! Settings are read from TOML. Resolution order:
//! 1. `--config <path>` flag
//! 2. `PULLSTRAP_CONFIG` environment variable
//! 3. `/etc/pullstrap/config.toml`
//!
//! A missing file at the default location means built-in defaults; a file that
//! was asked for explicitly must exist.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "PULLSTRAP_CONFIG";

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pullstrap/config.toml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid account name '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidAccount(String),

    #[error("invalid unit name '{0}'")]
    InvalidUnitName(String),

    #[error("timer field '{0}' must not be empty")]
    EmptyTimer(&'static str),

    #[error("{0} must be an absolute path")]
    RelativePath(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service account the pull agent runs as
    pub account: String,
    pub shell: String,
    /// Parent of the account's home directory
    pub home_root: PathBuf,
    pub sudoers_dir: PathBuf,
    pub facts_dir: PathBuf,
    pub unit_dir: PathBuf,
    /// Base name shared by the `.service` and `.timer` units
    pub unit_name: String,
    pub pull_binary: PathBuf,
    pub git: GitSettings,
    pub timer: TimerSettings,
    /// Installed in addition to the fixed dependency set
    pub extra_packages: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            account: "ansible".to_string(),
            shell: "/bin/bash".to_string(),
            home_root: PathBuf::from("/home"),
            sudoers_dir: PathBuf::from("/etc/sudoers.d"),
            facts_dir: PathBuf::from("/etc/ansible/facts.d"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            unit_name: "ansible-pull".to_string(),
            pull_binary: PathBuf::from("/usr/bin/ansible-pull"),
            git: GitSettings::default(),
            timer: TimerSettings::default(),
            extra_packages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub host: String,
    pub branch: String,
    pub playbook: String,
    pub probe_timeout_secs: u64,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            branch: "main".to_string(),
            playbook: "local.yml".to_string(),
            probe_timeout_secs: 10,
        }
    }
}

/// systemd time spans, passed through verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub boot_delay: String,
    pub interval: String,
    pub jitter: String,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            boot_delay: "5min".to_string(),
            interval: "10min".to_string(),
            jitter: "2min".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, honoring the flag and environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(ENV_CONFIG) {
            log::debug!("Using config from {ENV_CONFIG}: {path}");
            return Self::load_from(Path::new(&path));
        }

        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            Self::load_from(default)
        } else {
            log::debug!("No config at {DEFAULT_CONFIG_PATH}, using defaults");
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation beyond what TOML parsing enforces
    pub fn validate(&self) -> Result<()> {
        let account_re = Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$")?;
        if !account_re.is_match(&self.account) {
            return Err(SettingsError::InvalidAccount(self.account.clone()).into());
        }

        let unit_re = Regex::new(r"^[A-Za-z0-9:_.@-]+$")?;
        if !unit_re.is_match(&self.unit_name) {
            return Err(SettingsError::InvalidUnitName(self.unit_name.clone()).into());
        }

        for (field, value) in [
            ("boot_delay", &self.timer.boot_delay),
            ("interval", &self.timer.interval),
            ("jitter", &self.timer.jitter),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::EmptyTimer(field).into());
            }
        }

        for (field, path) in [
            ("home_root", &self.home_root),
            ("sudoers_dir", &self.sudoers_dir),
            ("facts_dir", &self.facts_dir),
            ("unit_dir", &self.unit_dir),
            ("pull_binary", &self.pull_binary),
        ] {
            if !path.is_absolute() {
                return Err(SettingsError::RelativePath(field).into());
            }
        }

        Ok(())
    }
}

/// Every path the provisioners own, derived once from [`Settings`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub account: String,
    pub shell: String,
    pub home: PathBuf,
    pub sudoers_file: PathBuf,
    pub ssh_dir: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub ssh_config: PathBuf,
    pub vault_dir: PathBuf,
    pub vault_file: PathBuf,
    pub facts_dir: PathBuf,
    pub facts_file: PathBuf,
    pub service_name: String,
    pub timer_name: String,
    pub service_unit: PathBuf,
    pub timer_unit: PathBuf,
}

impl Layout {
    pub fn from_settings(settings: &Settings) -> Self {
        let home = settings.home_root.join(&settings.account);
        let ssh_dir = home.join(".ssh");
        let vault_dir = home.join(".ansible");
        let service_name = format!("{}.service", settings.unit_name);
        let timer_name = format!("{}.timer", settings.unit_name);

        Self {
            account: settings.account.clone(),
            shell: settings.shell.clone(),
            sudoers_file: settings.sudoers_dir.join(&settings.account),
            private_key: ssh_dir.join("id_ed25519"),
            public_key: ssh_dir.join("id_ed25519.pub"),
            ssh_config: ssh_dir.join("config"),
            ssh_dir,
            vault_file: vault_dir.join("vault_pass"),
            vault_dir,
            facts_dir: settings.facts_dir.clone(),
            facts_file: settings.facts_dir.join("host.fact"),
            service_unit: settings.unit_dir.join(&service_name),
            timer_unit: settings.unit_dir.join(&timer_name),
            service_name,
            timer_name,
            home,
        }
    }
}
