//! Dependency set and package manager invocations per OS family.

use crate::types::OsFamily;

/// Packages the pull agent needs: ansible, git, an ssh client and sudo.
pub fn dependency_set(family: OsFamily) -> &'static [&'static str] {
    match family {
        OsFamily::Debian => &["ansible", "git", "openssh-client", "sudo"],
        OsFamily::RedHat => &["ansible-core", "git", "openssh-clients", "sudo"],
        OsFamily::Arch => &["ansible", "git", "openssh", "sudo"],
        OsFamily::Suse => &["ansible", "git", "openssh-clients", "sudo"],
        OsFamily::Alpine => &["ansible", "git", "openssh-client", "sudo"],
    }
}

/// Command lines that install `packages`, in execution order.
///
/// Every command is non-interactive; Debian needs a cache refresh first.
pub fn install_commands(family: OsFamily, packages: &[String]) -> Vec<Vec<String>> {
    let pm = family.package_manager().to_string();
    let with = |prefix: &[&str]| -> Vec<String> {
        std::iter::once(pm.clone())
            .chain(prefix.iter().map(|s| (*s).to_string()))
            .chain(packages.iter().cloned())
            .collect()
    };

    match family {
        OsFamily::Debian => vec![
            vec![pm.clone(), "update".to_string()],
            with(&["install", "-y", "--no-install-recommends"]),
        ],
        OsFamily::RedHat => vec![with(&["install", "-y"])],
        OsFamily::Arch => vec![with(&["-Sy", "--noconfirm", "--needed"])],
        OsFamily::Suse => vec![with(&["--non-interactive", "install"])],
        OsFamily::Alpine => vec![with(&["add", "--no-cache"])],
    }
}
