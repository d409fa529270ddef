//! # SkySpark Axon Client
//!
//! Queries a SkySpark historian through its `eval` REST endpoint and returns
//! typed tables.
//!
//! ```text
//! AxonQuery ─ compose_url ─▶ ApiClient ─▶ classify ─▶ ResultParser ─▶ AxonResult
//!                               ▲            │ 403
//!                               └─ resend ◀──┴─ Credential::refresh (once)
//! ```

pub mod analysis;
pub mod auth;
pub mod cell;
pub mod classify;
pub mod client;
pub mod error;
pub mod parse;
pub mod query;
pub mod table;

/// An `eval` response as read off the wire.
pub type RawResponse = crate::retrieve::ky_http::ApiResponse;

pub use auth::{Credential, FileTokenStore, TokenStore};
pub use cell::{CellDecoder, HaystackCellDecoder, ZoneHandling};
pub use client::{Backoff, RetryPolicy, SkysparkClient};
pub use error::AxonError;
pub use parse::{AxonResult, ResultFormat, ResultKind, ResultParser};
pub use query::{AxonQuery, HisRange, TagFilter};
pub use table::{MetadataTable, TimeSeriesTable};
