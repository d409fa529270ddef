//! # Configuration Modules
//!
//! This module aggregates the configuration providers used by the SkySpark
//! bridge binaries.

/// Loads the SkySpark host and authentication settings from `spyspark.cfg`.
pub mod config_sys;
