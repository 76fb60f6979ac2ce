use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pullstrap")]
#[command(version)]
#[command(
    about = "Prepare a host to run ansible-pull unattended on a systemd timer",
    long_about = "Creates the service account, SSH identity, vault password file, host \
facts and systemd units needed for scheduled ansible-pull runs, asking before each \
step, then reports the health of every piece. Must run as root."
)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Only run the health report; change nothing
    #[arg(long)]
    pub check: bool,

    /// Settings file (default: $PULLSTRAP_CONFIG or /etc/pullstrap/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
