//! Command implementations for the presspool CLI
//!
//! Each command is organized into its own module.

pub mod compress;
pub mod config;
pub mod version;
