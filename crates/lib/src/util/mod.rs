//! Shared utilities.
//!
//! YAML tree helpers used when re-emitting filtered buildspecs, and test helpers.

pub mod yaml;

#[cfg(test)]
pub mod testutil;
