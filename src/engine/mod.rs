//! Run engine for pullstrap
//!
//! The engine drives two passes over the fixed provisioner list:
//! 1. Executing - gated apply of each resource, failures contained
//! 2. Health - independent verification of the resulting host state

pub mod executor;
pub mod health;

pub use executor::execute;
pub use health::{check, print_report};
