use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current UTC time formatted as an RFC 9557 timestamp with millisecond precision.
pub fn current_datetime_rfc9557() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Human-readable name of a numeric log level.
pub fn level_name(loglevel: i64) -> &'static str {
    match loglevel {
        6 => "FATAL",
        5 => "ERROR",
        4 => "WARN",
        3 => "INFO",
        2 => "DEBUG",
        1 => "TRACE",
        _ => "SILLY",
    }
}

/// # Logrecord
///
/// A single log entry as written to the log file, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logrecord {
    /// RFC 9557 formatted timestamp string.
    pub rfc9557: String,
    /// The severity level of the log (0 Silly ... 6 Fatal).
    pub loglevel: i64,
    /// Name of `loglevel`.
    pub level: String,
    /// Information about the application generating the log.
    pub app: App,
    /// The message text.
    pub message: String,
    /// Flexible JSON value for arbitrary tags or additional metadata.
    pub tags: Value,
}

impl Logrecord {
    pub fn new(app_name: &str, loglevel: i64, message: &str, tags: Option<Value>) -> Self {
        Self {
            rfc9557: current_datetime_rfc9557(),
            loglevel,
            level: level_name(loglevel).to_string(),
            app: App {
                name: app_name.to_string(),
                pid: std::process::id() as i64,
            },
            message: message.to_string(),
            tags: tags.unwrap_or_else(|| serde_json::json!([])),
        }
    }

    /// True when the record carries structured extras.
    pub fn has_tags(&self) -> bool {
        self.tags != serde_json::json!([]) && !self.tags.is_null()
    }
}

/// # App
///
/// Contains information about the application that generated the log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    /// The process ID (PID) of the application.
    pub pid: i64,
    /// The name of the application.
    pub name: String,
}
