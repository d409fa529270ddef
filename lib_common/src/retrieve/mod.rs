//! # Data Retrieval Module
//!
//! Generic HTTP retrieval used by the SkySpark client. `ky_http` owns request
//! building and transport errors so that callers only deal with status codes
//! and bodies.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with optional retry middleware.
pub mod ky_http;
