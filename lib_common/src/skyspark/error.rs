use thiserror::Error;

use crate::retrieve::ky_http::TransportError;

/// Failures of an Axon request.
///
/// Every variant except `AuthExpired` reaches the caller; `AuthExpired` is
/// consumed by the retry loop after the token has been refreshed.
#[derive(Debug, Error)]
pub enum AxonError {
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Empty result, check query")]
    EmptyResult,

    #[error("HTTP request is missing a required header")]
    MalformedRequest,

    #[error("URI does not map to a valid operation URI")]
    InvalidEndpoint,

    #[error("Unsupported MIME type requested")]
    UnsupportedFormat,

    #[error("HTTP error: {status}")]
    UnknownHttp { status: u16 },

    #[error("No time series data returned from query: {0}")]
    NoTimeSeriesData(String),

    #[error("Authorization expired, token refreshed")]
    AuthExpired,

    #[error("Response body could not be decoded: {0}")]
    InvalidPayload(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl AxonError {
    /// Stable short label for the error kind.
    pub fn label(&self) -> &'static str {
        match self {
            AxonError::NetworkFailure(_) => "NetworkFailure",
            AxonError::EmptyResult => "EmptyResultError",
            AxonError::MalformedRequest => "MalformedRequestError",
            AxonError::InvalidEndpoint => "InvalidEndpointError",
            AxonError::UnsupportedFormat => "UnsupportedFormatError",
            AxonError::UnknownHttp { .. } => "UnknownHttpError",
            AxonError::NoTimeSeriesData(_) => "NoTimeSeriesDataError",
            AxonError::AuthExpired => "AuthExpiredError",
            AxonError::InvalidPayload(_) => "InvalidPayloadError",
            AxonError::Authentication(_) => "AuthenticationError",
            AxonError::InvalidQuery(_) => "InvalidQueryError",
        }
    }
}

impl From<TransportError> for AxonError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(msg) => AxonError::NetworkFailure(msg),
            TransportError::Url(e) => AxonError::InvalidQuery(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for AxonError {
    fn from(err: serde_json::Error) -> Self {
        AxonError::InvalidPayload(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AxonError>;
