//! CLI command implementations

pub mod album;
