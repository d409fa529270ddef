//! # lib_common
//!
//! Shared building blocks for the SkySpark historian bridge. Every top-level
//! module sits behind a cargo feature of the same name so that binaries only
//! pull the dependencies they use.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Configuration loading (`spyspark.cfg`).
#[cfg(feature = "configs")]
pub mod configs;

/// Local logger with TTY and file output.
#[cfg(feature = "loggers")]
pub mod loggers;

/// Generic HTTP retrieval client.
#[cfg(feature = "retrieve")]
pub mod retrieve;

/// SkySpark Axon query client.
#[cfg(feature = "skyspark")]
pub mod skyspark;
