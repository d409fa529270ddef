//! # Response Classifier
//!
//! Maps an `eval` response onto success or a typed failure. A 403 refreshes
//! the credential (once per request) and reports `AuthExpired` so the retry
//! loop can resend.

use super::auth::Credential;
use super::error::{AxonError, Result};
use super::RawResponse;

/// Body SkySpark returns when a query matched nothing.
pub const EMPTY_SENTINEL: &str = "empty\n";

/// Status-only classification; never touches the credential.
///
/// A 403 maps to `AuthExpired` here; whether it is retried is up to the caller.
pub fn classify_status(response: &RawResponse) -> Result<()> {
    match response.status {
        200 if response.body == EMPTY_SENTINEL || response.body.is_empty() => Err(AxonError::EmptyResult),
        200 => Ok(()),
        400 => Err(AxonError::MalformedRequest),
        403 => Err(AxonError::AuthExpired),
        404 => Err(AxonError::InvalidEndpoint),
        406 => Err(AxonError::UnsupportedFormat),
        status => Err(AxonError::UnknownHttp { status }),
    }
}

/// Classifies `response`, refreshing `credential` on a 403.
///
/// `reauth_available` is false once the request has already re-authenticated;
/// a further 403 is then final and reported as `UnknownHttp { 403 }`.
pub async fn classify(response: &RawResponse, credential: &mut Credential, reauth_available: bool) -> Result<()> {
    match classify_status(response) {
        Err(AxonError::AuthExpired) if reauth_available => {
            credential.refresh().await?;
            Err(AxonError::AuthExpired)
        }
        Err(AxonError::AuthExpired) => Err(AxonError::UnknownHttp { status: 403 }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skyspark::auth::tests::CountingStore;
    use std::sync::atomic::Ordering;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse::from_parts(status, body, Some("application/json"))
    }

    #[test]
    fn test_status_table() {
        assert!(classify_status(&response(200, "{\"rows\":[]}")).is_ok());
        assert!(matches!(classify_status(&response(200, "empty\n")), Err(AxonError::EmptyResult)));
        assert!(matches!(classify_status(&response(200, "")), Err(AxonError::EmptyResult)));
        assert!(matches!(classify_status(&response(400, "x")), Err(AxonError::MalformedRequest)));
        assert!(matches!(classify_status(&response(404, "x")), Err(AxonError::InvalidEndpoint)));
        assert!(matches!(classify_status(&response(406, "x")), Err(AxonError::UnsupportedFormat)));
        assert!(matches!(classify_status(&response(403, "x")), Err(AxonError::AuthExpired)));
        assert!(matches!(
            classify_status(&response(500, "x")),
            Err(AxonError::UnknownHttp { status: 500 })
        ));
    }

    #[test]
    fn test_empty_sentinel_must_match_exactly() {
        assert!(classify_status(&response(200, "empty")).is_ok());
        assert!(classify_status(&response(200, "not empty\n")).is_ok());
    }

    #[tokio::test]
    async fn test_forbidden_refreshes_once() {
        let store = CountingStore::with_token("stale");
        let mut credential = Credential::from_store(store.clone()).unwrap();

        let err = classify(&response(403, ""), &mut credential, true).await.unwrap_err();
        assert!(matches!(err, AxonError::AuthExpired));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
        assert_eq!(credential.token(), "token-1");

        let err = classify(&response(403, ""), &mut credential, false).await.unwrap_err();
        assert!(matches!(err, AxonError::UnknownHttp { status: 403 }));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_statuses_leave_credential_alone() {
        let store = CountingStore::with_token("t");
        let mut credential = Credential::from_store(store.clone()).unwrap();
        assert!(classify(&response(404, ""), &mut credential, true).await.is_err());
        assert!(classify(&response(200, "ok"), &mut credential, true).await.is_ok());
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }
}
