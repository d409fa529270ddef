//! # Cell Decoding
//!
//! SkySpark's JSON encoding prefixes scalar cells with a type tag:
//! `t:2017-11-26T00:25:00-08:00 Los_Angeles` for timestamps and
//! `n:74.5999984741211 °F` for numbers. All knowledge of that format lives
//! behind `CellDecoder`.

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What to do with the UTC offset that follows a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZoneHandling {
    /// Keep the wall-clock time and drop offset and zone name.
    ///
    /// Timestamps from different zones collapse onto one naive axis.
    #[default]
    DiscardOffset,
    /// Apply the offset and keep UTC wall-clock time.
    ConvertToUtc,
}

pub trait CellDecoder: Send + Sync {
    /// The row's time key, `None` if the cell is not a timestamp.
    fn decode_timestamp(&self, cell: &Value) -> Option<NaiveDateTime>;

    /// A numeric reading; anything unparseable is `NaN`.
    fn decode_number(&self, cell: &Value) -> f64;
}

/// Decoder for Haystack-style `t:` / `n:` literals.
#[derive(Debug, Clone)]
pub struct HaystackCellDecoder {
    zone: ZoneHandling,
    timestamp_re: Regex,
    number_re: Regex,
}

impl HaystackCellDecoder {
    pub fn new(zone: ZoneHandling) -> Self {
        Self {
            zone,
            timestamp_re: Regex::new(r"^t:([0-9T:\-]{19})(?:\.[0-9]+)?(Z|[+\-][0-9]{2}:[0-9]{2})?")
                .expect("timestamp pattern is valid"),
            number_re: Regex::new(r"^n:(-?[0-9.]+(?:[eE][+\-]?[0-9]+)?)").expect("number pattern is valid"),
        }
    }

    pub fn zone_handling(&self) -> ZoneHandling {
        self.zone
    }

    /// The 19-character `YYYY-MM-DDTHH:MM:SS` part of a `t:` cell.
    pub fn time_key<'a>(&self, raw: &'a str) -> Option<&'a str> {
        self.timestamp_re
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    fn offset_seconds(offset: &str) -> Option<i64> {
        if offset == "Z" {
            return Some(0);
        }
        let sign = if offset.starts_with('-') { -1 } else { 1 };
        let (hours, minutes) = offset.get(1..)?.split_once(':')?;
        let hours: i64 = hours.parse().ok()?;
        let minutes: i64 = minutes.parse().ok()?;
        Some(sign * (hours * 3600 + minutes * 60))
    }
}

impl Default for HaystackCellDecoder {
    fn default() -> Self {
        Self::new(ZoneHandling::default())
    }
}

impl CellDecoder for HaystackCellDecoder {
    fn decode_timestamp(&self, cell: &Value) -> Option<NaiveDateTime> {
        let raw = cell.as_str()?;
        let caps = self.timestamp_re.captures(raw)?;
        let local = NaiveDateTime::parse_from_str(caps.get(1)?.as_str(), TIMESTAMP_FORMAT).ok()?;

        match self.zone {
            ZoneHandling::DiscardOffset => Some(local),
            ZoneHandling::ConvertToUtc => match caps.get(2).and_then(|m| Self::offset_seconds(m.as_str())) {
                Some(offset) => local.checked_sub_signed(Duration::seconds(offset)),
                None => Some(local),
            },
        }
    }

    fn decode_number(&self, cell: &Value) -> f64 {
        match cell {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(raw) => self
                .number_re
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }
}
