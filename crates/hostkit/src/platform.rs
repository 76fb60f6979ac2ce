//! Platform detection for package installation.
//!
//! The distribution is read from `os-release(5)`. `ID` is tried first, then
//! every entry of `ID_LIKE`, so derivatives resolve to their parent family.
//!
//! # Example
//!
//! ```no_run
//! use hostkit::platform;
//!
//! let platform = platform::detect().expect("unsupported platform");
//! println!("Running on: {} ({})", platform.name, platform.family);
//! ```

use crate::error::{Error, Result};
use crate::types::{OsFamily, Platform};
use std::fs;
use std::path::Path;

/// Primary location of os-release.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Fallback location of os-release.
pub const OS_RELEASE_FALLBACK: &str = "/usr/lib/os-release";

/// Detect the current platform.
///
/// # Errors
///
/// Returns `Error::UnsupportedPlatform` if the family is unknown, or
/// `Error::OsRelease` if neither os-release file can be read.
pub fn detect() -> Result<Platform> {
    if Path::new(OS_RELEASE).exists() {
        detect_from(Path::new(OS_RELEASE))
    } else {
        detect_from(Path::new(OS_RELEASE_FALLBACK))
    }
}

/// Detect the platform from a specific os-release file.
pub fn detect_from(path: &Path) -> Result<Platform> {
    let content = fs::read_to_string(path).map_err(|source| Error::OsRelease {
        path: path.to_path_buf(),
        source,
    })?;
    parse_os_release(&content)
}

/// Parse os-release content into a [`Platform`].
pub fn parse_os_release(content: &str) -> Result<Platform> {
    let mut id = String::new();
    let mut id_like = String::new();
    let mut pretty = None;

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value);
        match key.trim() {
            "ID" => id = value,
            "ID_LIKE" => id_like = value,
            "PRETTY_NAME" => pretty = Some(value),
            _ => {}
        }
    }

    let family = std::iter::once(id.as_str())
        .chain(id_like.split_whitespace())
        .find_map(OsFamily::from_id);

    match family {
        Some(family) => {
            log::debug!("Detected {id} (family {family})");
            Ok(Platform {
                name: pretty.unwrap_or_else(|| id.clone()),
                id,
                family,
            })
        }
        None => Err(Error::UnsupportedPlatform {
            id: if id_like.is_empty() {
                id
            } else {
                format!("{id} (like {id_like})")
            },
        }),
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ubuntu() {
        let content = r#"PRETTY_NAME="Ubuntu 24.04 LTS"
NAME="Ubuntu"
ID=ubuntu
ID_LIKE=debian
"#;
        let platform = parse_os_release(content).unwrap();
        assert_eq!(platform.id, "ubuntu");
        assert_eq!(platform.name, "Ubuntu 24.04 LTS");
        assert_eq!(platform.family, OsFamily::Debian);
    }

    #[test]
    fn test_parse_derivative_via_id_like() {
        let content = "ID=\"pika\"\nID_LIKE=\"rhel centos fedora\"\n";
        let platform = parse_os_release(content).unwrap();
        assert_eq!(platform.family, OsFamily::RedHat);
        assert_eq!(platform.name, "pika");
    }

    #[test]
    fn test_parse_unsupported() {
        let err = parse_os_release("ID=haiku\n").unwrap_err();
        assert!(err.is_fatal_setup());
        assert_eq!(err.to_string(), "unsupported operating system: haiku");
    }

    #[test]
    fn test_detect_from_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = detect_from(&tmp.path().join("os-release")).unwrap_err();
        assert!(matches!(err, Error::OsRelease { .. }));
    }

    #[test]
    fn test_detect_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("os-release");
        fs::write(&path, "ID=arch\n").unwrap();
        assert_eq!(detect_from(&path).unwrap().family, OsFamily::Arch);
    }
}
