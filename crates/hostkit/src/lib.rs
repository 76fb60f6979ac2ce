//! # hostkit
//!
//! Linux host primitives for provisioning a pull-based configuration agent.
//!
//! This crate provides functionality for:
//! - Detecting the distribution family from os-release
//! - Selecting and invoking the family's package manager
//! - Looking up and creating accounts
//! - Generating SSH identities and probing git hosts
//! - Driving systemd units
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::backend::{self, Backend};
//! use hostkit::{packages, platform};
//!
//! let platform = platform::detect().expect("unsupported platform");
//! let backend = backend::default_backend();
//!
//! let wanted: Vec<String> = packages::dependency_set(platform.family)
//!     .iter()
//!     .map(|p| p.to_string())
//!     .collect();
//! backend.install_packages(platform.family, &wanted).expect("install failed");
//!
//! if backend.lookup_account("ansible").expect("getent failed").is_none() {
//!     println!("account missing");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod packages;
pub mod platform;
pub mod types;

pub use backend::Backend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{Account, CommandOutput, OsFamily, Platform, SshProbe};
