//! HTTP surface of the bridge: one data endpoint and a health probe.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lib_common::configs::config_sys::SysConfig;
use lib_common::loggers::loggerlocal::LoggerLocal;
use lib_common::skyspark::{AxonError, Credential, FileTokenStore, SkysparkClient, TimeSeriesTable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const EMPTY_QUERY_MESSAGE: &str = "invalid request, query parameter empty";
pub const QUERY_FAILED_MESSAGE: &str = "Invalid query or failure in skyspark connection";
pub const INVALID_BODY_MESSAGE: &str = "invalid request, expected a JSON body with a query field";

/// The client plus the one credential every request shares.
pub struct AppState {
    client: SkysparkClient,
    credential: Mutex<Credential>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(client: SkysparkClient, credential: Credential) -> Self {
        Self {
            client,
            credential: Mutex::new(credential),
        }
    }

    /// Builds the client and loads the token named by `spyspark.cfg`.
    pub fn from_sys_config(sys: &SysConfig, transient_retries: u32, logger: Arc<LoggerLocal>) -> anyhow::Result<Self> {
        let store = FileTokenStore::new(&sys.token_file, sys.refresh_command.clone());
        let credential = Credential::from_store(Arc::new(store))?;
        let client = SkysparkClient::from_config(sys, logger).with_transient_retries(transient_retries);
        Ok(Self::new(client, credential))
    }
}

#[derive(Debug, Deserialize)]
pub struct DataRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DataPoint {
    pub time: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct DataReply {
    pub data: Vec<DataPoint>,
}

#[derive(Debug)]
pub enum ServiceError {
    InvalidBody(JsonRejection),
    EmptyQuery,
    Query(AxonError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match self {
            ServiceError::InvalidBody(rejection) => {
                log::warn!("Rejected malformed request body: {}", rejection.body_text());
                INVALID_BODY_MESSAGE
            }
            ServiceError::EmptyQuery => {
                log::warn!("Rejected request with empty query");
                EMPTY_QUERY_MESSAGE
            }
            ServiceError::Query(e) => {
                log::error!("Query failed ({}): {}", e.label(), e);
                QUERY_FAILED_MESSAGE
            }
        };
        (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/skyspark/data", post(get_data))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_data(
    State(state): State<SharedState>,
    payload: Result<Json<DataRequest>, JsonRejection>,
) -> Result<Json<DataReply>, ServiceError> {
    let Json(request) = payload.map_err(ServiceError::InvalidBody)?;
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ServiceError::EmptyQuery);
    }
    log::info!("Received query (length: {} chars)", query.len());
    log::debug!("Query: {}", query);

    let table = {
        let mut credential = state.credential.lock().await;
        state
            .client
            .query(&mut credential, query)
            .await
            .and_then(|result| result.into_time_series())
            .map_err(ServiceError::Query)?
    };

    let data = to_points(&table);
    log::info!("Returning {} points", data.len());
    Ok(Json(DataReply { data }))
}

/// `(time, value)` of the first column; non-finite values are replaced so they survive JSON.
pub fn to_points(table: &TimeSeriesTable) -> Vec<DataPoint> {
    let Some(first) = table.columns().first() else {
        return Vec::new();
    };
    table
        .series(first)
        .unwrap_or_default()
        .into_iter()
        .map(|(ts, value)| DataPoint {
            time: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            value: finite_or_clamped(value),
        })
        .collect()
}

pub fn finite_or_clamped(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        f64::MAX
    } else if value == f64::NEG_INFINITY {
        f64::MIN
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use lib_common::configs::config_sys::parse_host_address;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn state_for(host: &str, dir: &tempfile::TempDir) -> SharedState {
        let token = dir.path().join("spyspark.token");
        std::fs::write(&token, "abc").unwrap();
        let credential = Credential::from_store(Arc::new(FileTokenStore::new(&token, None))).unwrap();
        let client = SkysparkClient::new(
            parse_host_address(host).unwrap(),
            Arc::new(LoggerLocal::silent("server_skyspark_test")),
        );
        Arc::new(AppState::new(client, credential))
    }

    #[test]
    fn test_non_finite_values() {
        assert_eq!(finite_or_clamped(f64::NAN), 0.0);
        assert_eq!(finite_or_clamped(f64::INFINITY), f64::MAX);
        assert_eq!(finite_or_clamped(f64::NEG_INFINITY), f64::MIN);
        assert_eq!(finite_or_clamped(-2.5), -2.5);
    }

    #[test]
    fn test_points_use_first_column() {
        let mut table = TimeSeriesTable::new(vec!["r:a".into(), "r:b".into()]);
        table.push_row(ts("2019-06-30 00:15:00"), vec![f64::NAN, 9.0]).unwrap();
        table.push_row(ts("2019-06-30 00:30:00"), vec![3.5, 9.0]).unwrap();

        let points = to_points(&table);
        assert_eq!(
            points,
            vec![
                DataPoint {
                    time: "2019-06-30 00:15:00".to_string(),
                    value: 0.0
                },
                DataPoint {
                    time: "2019-06-30 00:30:00".to_string(),
                    value: 3.5
                },
            ]
        );
        assert!(to_points(&TimeSeriesTable::default()).is_empty());
    }

    #[test]
    fn test_errors_are_bad_request() {
        assert_eq!(ServiceError::EmptyQuery.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::Query(AxonError::EmptyResult).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_empty_query_never_reaches_skyspark() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens here; the handler must reject before sending.
        let state = state_for("http://127.0.0.1:9/api/demo/", &dir);
        let result = get_data(State(state), Ok(Json(DataRequest { query: "  ".to_string() }))).await;
        assert!(matches!(result, Err(ServiceError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::{Request, header::CONTENT_TYPE};

        let dir = tempfile::tempdir().unwrap();
        let state = state_for("http://127.0.0.1:9/api/demo/", &dir);
        let request = Request::builder()
            .method("POST")
            .uri("/skyspark/data")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"query\": 42"))
            .unwrap();
        let payload = Json::<DataRequest>::from_request(request, &()).await;
        assert!(payload.is_err());

        let err = get_data(State(state), payload).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidBody(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_data_round_trip() {
        let body = json!({
            "cols": [{"name": "ts"}, {"name": "v0", "id": "r:216fce5f-0d543013 Power"}],
            "rows": [
                {"ts": "t:2019-06-30T00:15:00-07:00 Los_Angeles", "v0": "n:12.5 kW"},
                {"ts": "t:2019-06-30T00:30:00-07:00 Los_Angeles", "v0": "m:"}
            ]
        })
        .to_string();

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&format!("http://127.0.0.1:{}/api/demo/", port), &dir);
        let request = DataRequest {
            query: "readAll(id==@216fce5f-0d543013).hisRead(date(2019,06,30)..date(2019,07,01), {limit: null})"
                .to_string(),
        };
        let Json(reply) = get_data(State(state), Ok(Json(request))).await.unwrap();
        handle.join().unwrap();

        assert_eq!(reply.data.len(), 2);
        assert_eq!(reply.data[0].time, "2019-06-30 00:15:00");
        assert_eq!(reply.data[0].value, 12.5);
        assert_eq!(reply.data[1].value, 0.0);
    }
}
