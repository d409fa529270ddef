//! # Result Parser
//!
//! Turns a classified `eval` body into an `AxonResult`, dispatching on the
//! declared MIME type.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::cell::{CellDecoder, HaystackCellDecoder};
use super::error::{AxonError, Result};
use super::table::{MetadataTable, TimeSeriesTable};
use super::RawResponse;

/// Representation requested through the `accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Csv,
    Zinc,
}

impl ResultFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ResultFormat::Json => "application/json",
            ResultFormat::Csv => "text/csv",
            ResultFormat::Zinc => "text/zinc",
        }
    }

    /// Format named by a `content-type` value; parameters such as `charset` are ignored.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/json" => Some(ResultFormat::Json),
            "text/csv" => Some(ResultFormat::Csv),
            "text/zinc" => Some(ResultFormat::Zinc),
            _ => None,
        }
    }
}

/// What a JSON body is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Metadata,
    TimeSeries,
    Both,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AxonResult {
    Csv(String),
    Zinc(String),
    Metadata(MetadataTable),
    TimeSeries(TimeSeriesTable),
    /// Column metadata of a `hisRead` response plus its series.
    Both(MetadataTable, TimeSeriesTable),
}

impl AxonResult {
    pub fn into_metadata(self) -> Result<MetadataTable> {
        match self {
            AxonResult::Metadata(meta) | AxonResult::Both(meta, _) => Ok(meta),
            other => Err(AxonError::InvalidPayload(format!("expected metadata, got {}", other.kind_name()))),
        }
    }

    pub fn into_time_series(self) -> Result<TimeSeriesTable> {
        match self {
            AxonResult::TimeSeries(ts) | AxonResult::Both(_, ts) => Ok(ts),
            other => Err(AxonError::InvalidPayload(format!(
                "expected time series, got {}",
                other.kind_name()
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            AxonResult::Csv(_) => "csv",
            AxonResult::Zinc(_) => "zinc",
            AxonResult::Metadata(_) => "metadata",
            AxonResult::TimeSeries(_) => "time series",
            AxonResult::Both(_, _) => "metadata and time series",
        }
    }
}

/// Repairs the glyphs SkySpark's CSV export mangles when UTF-8 is read as Latin-1.
pub fn normalize_csv(body: &str) -> String {
    body.replace("â\u{9c}\u{93}", "True").replace('Â', "")
}

pub struct ResultParser {
    decoder: Arc<dyn CellDecoder>,
}

impl Default for ResultParser {
    fn default() -> Self {
        Self::new(Arc::new(HaystackCellDecoder::default()))
    }
}

impl ResultParser {
    pub fn new(decoder: Arc<dyn CellDecoder>) -> Self {
        Self { decoder }
    }

    /// Parses a successful response.
    ///
    /// The declared `content-type` wins; `requested` is used when the server
    /// did not declare a known one.
    pub fn parse(&self, response: &RawResponse, requested: ResultFormat, kind: ResultKind) -> Result<AxonResult> {
        let format = response
            .content_type
            .as_deref()
            .and_then(ResultFormat::from_mime)
            .unwrap_or(requested);

        match format {
            ResultFormat::Csv => Ok(AxonResult::Csv(normalize_csv(&response.body))),
            ResultFormat::Zinc => Ok(AxonResult::Zinc(response.body.clone())),
            ResultFormat::Json => {
                let grid = Self::decode_json(&response.body)?;
                self.parse_grid(&grid, kind)
            }
        }
    }

    pub fn decode_json(body: &str) -> Result<Value> {
        Ok(serde_json::from_str(body)?)
    }

    /// Reads a decoded Haystack JSON grid (`meta`, `cols`, `rows`).
    pub fn parse_grid(&self, grid: &Value, kind: ResultKind) -> Result<AxonResult> {
        match kind {
            ResultKind::Metadata => Ok(AxonResult::Metadata(MetadataTable::from_json_rows(rows_of(grid)?)?)),
            ResultKind::TimeSeries => Ok(AxonResult::TimeSeries(self.time_series(grid)?)),
            ResultKind::Both => {
                let cols = value_cols(grid)?;
                let meta = MetadataTable::from_json_rows(cols)?;
                Ok(AxonResult::Both(meta, self.time_series(grid)?))
            }
        }
    }

    fn time_series(&self, grid: &Value) -> Result<TimeSeriesTable> {
        let time_col = time_col_name(grid)?;
        let cols = value_cols(grid)?;
        let rows = rows_of(grid)?;

        let mut names = Vec::with_capacity(cols.len());
        let mut name_to_id = HashMap::new();
        for col in cols {
            let Some(name) = col.get("name").and_then(Value::as_str) else {
                return Err(AxonError::InvalidPayload("column without a name".to_string()));
            };
            names.push(name.to_string());
            if let Some(id) = col.get("id").and_then(Value::as_str) {
                name_to_id.insert(name.to_string(), id.to_string());
            }
        }

        if rows.is_empty() {
            return Err(AxonError::NoTimeSeriesData("response has no rows".to_string()));
        }

        let mut table = TimeSeriesTable::new(names.clone());
        for (i, row) in rows.iter().enumerate() {
            let ts_cell = row.get(time_col.as_str()).unwrap_or(&Value::Null);
            let ts = self.decoder.decode_timestamp(ts_cell).ok_or_else(|| {
                AxonError::NoTimeSeriesData(format!("row {} has no valid timestamp: {}", i, ts_cell))
            })?;
            let values = names
                .iter()
                .map(|name| row.get(name.as_str()).map_or(f64::NAN, |cell| self.decoder.decode_number(cell)))
                .collect();
            table.push_row(ts, values)?;
        }
        table.rename_columns(&name_to_id);
        Ok(table)
    }
}

fn rows_of(grid: &Value) -> Result<&[Value]> {
    grid.get("rows")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| AxonError::InvalidPayload("grid has no rows array".to_string()))
}

fn cols_of(grid: &Value) -> Result<&[Value]> {
    grid.get("cols")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| AxonError::InvalidPayload("grid has no cols array".to_string()))
}

fn time_col_name(grid: &Value) -> Result<String> {
    cols_of(grid)?
        .first()
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AxonError::NoTimeSeriesData("grid has no time column".to_string()))
}

/// `cols[1:]`, the value columns of a `hisRead` grid.
fn value_cols(grid: &Value) -> Result<&[Value]> {
    let cols = cols_of(grid)?;
    Ok(cols.get(1..).unwrap_or(&[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skyspark::cell::ZoneHandling;
    use serde_json::json;

    fn his_grid() -> Value {
        json!({
            "meta": {"ver": "2.0", "hisStart": "t:2017-11-26T00:00:00-08:00 Los_Angeles"},
            "cols": [
                {"name": "ts"},
                {"name": "v0", "id": "r:1eeb3c3a-d4e0a1b2 Meter 1", "dis": "Meter 1"},
                {"name": "v1", "id": "r:1eeb3c3a-ffff0000 Meter 2"}
            ],
            "rows": [
                {"ts": "t:2017-11-26T00:25:00-08:00 Los_Angeles", "v0": "n:74.5999984741211 °F", "v1": "n:1 kWh"},
                {"ts": "t:2017-11-26T00:40:00-08:00 Los_Angeles", "v0": "n:75 °F"}
            ]
        })
    }

    fn json_response(body: &str) -> RawResponse {
        RawResponse::from_parts(200, body, Some("application/json; charset=utf-8"))
    }

    #[test]
    fn test_mime_round_trip() {
        for format in [ResultFormat::Json, ResultFormat::Csv, ResultFormat::Zinc] {
            assert_eq!(ResultFormat::from_mime(format.mime()), Some(format));
        }
        assert_eq!(ResultFormat::from_mime("text/plain"), None);
    }

    #[test]
    fn test_time_series_columns_are_point_ids() {
        let parser = ResultParser::default();
        let table = parser
            .parse_grid(&his_grid(), ResultKind::TimeSeries)
            .unwrap()
            .into_time_series()
            .unwrap();

        assert_eq!(
            table.columns(),
            &["r:1eeb3c3a-d4e0a1b2 Meter 1".to_string(), "r:1eeb3c3a-ffff0000 Meter 2".to_string()]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.index()[0].format("%Y-%m-%dT%H:%M:%S").to_string(), "2017-11-26T00:25:00");

        let v0 = table.column("r:1eeb3c3a-d4e0a1b2 Meter 1").unwrap();
        assert_eq!(v0, vec![74.5999984741211, 75.0]);
        let v1 = table.column("r:1eeb3c3a-ffff0000 Meter 2").unwrap();
        assert_eq!(v1[0], 1.0);
        assert!(v1[1].is_nan());
    }

    #[test]
    fn test_column_without_id_keeps_name() {
        let grid = json!({
            "cols": [{"name": "ts"}, {"name": "val"}],
            "rows": [{"ts": "t:2020-01-01T00:00:00Z UTC", "val": "n:3"}]
        });
        let table = ResultParser::default()
            .parse_grid(&grid, ResultKind::TimeSeries)
            .unwrap()
            .into_time_series()
            .unwrap();
        assert_eq!(table.columns(), &["val".to_string()]);
    }

    #[test]
    fn test_unparseable_timestamp_rejects_response() {
        let grid = json!({
            "cols": [{"name": "ts"}, {"name": "v0"}],
            "rows": [
                {"ts": "t:2020-01-01T00:00:00Z UTC", "v0": "n:1"},
                {"ts": "garbage", "v0": "n:2"}
            ]
        });
        let err = ResultParser::default().parse_grid(&grid, ResultKind::TimeSeries).unwrap_err();
        assert!(matches!(err, AxonError::NoTimeSeriesData(_)));
    }

    #[test]
    fn test_no_rows_is_no_time_series_data() {
        let grid = json!({"cols": [{"name": "ts"}, {"name": "v0"}], "rows": []});
        let err = ResultParser::default().parse_grid(&grid, ResultKind::TimeSeries).unwrap_err();
        assert!(matches!(err, AxonError::NoTimeSeriesData(_)));
    }

    #[test]
    fn test_metadata_mode_reads_rows() {
        let grid = json!({
            "cols": [{"name": "id"}, {"name": "dis"}],
            "rows": [{"id": "r:a Meter", "dis": "Meter", "elec": "m:"}]
        });
        let meta = ResultParser::default()
            .parse_grid(&grid, ResultKind::Metadata)
            .unwrap()
            .into_metadata()
            .unwrap();
        assert_eq!(meta.ids(), vec!["r:a Meter"]);
        assert_eq!(meta.get(0, "elec"), Some(&json!("m:")));
    }

    #[test]
    fn test_both_returns_column_metadata() {
        let result = ResultParser::default().parse_grid(&his_grid(), ResultKind::Both).unwrap();
        let AxonResult::Both(meta, ts) = result else {
            panic!("expected both");
        };
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.name_to_id()["v0"], "r:1eeb3c3a-d4e0a1b2 Meter 1");
        assert_eq!(ts.columns().len(), 2);
    }

    #[test]
    fn test_zone_handling_flows_through_parser() {
        let parser = ResultParser::new(Arc::new(HaystackCellDecoder::new(ZoneHandling::ConvertToUtc)));
        let table = parser
            .parse_grid(&his_grid(), ResultKind::TimeSeries)
            .unwrap()
            .into_time_series()
            .unwrap();
        assert_eq!(table.index()[0].format("%H:%M").to_string(), "08:25");
    }

    #[test]
    fn test_parse_dispatches_on_declared_mime() {
        let parser = ResultParser::default();

        let csv = RawResponse::from_parts(200, "ok,Â100\nâ\u{9c}\u{93},x\n", Some("text/csv"));
        assert_eq!(
            parser.parse(&csv, ResultFormat::Json, ResultKind::Metadata).unwrap(),
            AxonResult::Csv("ok,100\nTrue,x\n".to_string())
        );

        let zinc = RawResponse::from_parts(200, "ver:\"3.0\"\nid\n", Some("text/zinc"));
        assert_eq!(
            parser.parse(&zinc, ResultFormat::Zinc, ResultKind::Metadata).unwrap(),
            AxonResult::Zinc("ver:\"3.0\"\nid\n".to_string())
        );

        let body = his_grid().to_string();
        let parsed = parser.parse(&json_response(&body), ResultFormat::Json, ResultKind::TimeSeries);
        assert!(matches!(parsed, Ok(AxonResult::TimeSeries(_))));
    }

    #[test]
    fn test_malformed_json_is_invalid_payload() {
        let parser = ResultParser::default();
        let err = parser
            .parse(&json_response("<html>login</html>"), ResultFormat::Json, ResultKind::Metadata)
            .unwrap_err();
        assert!(matches!(err, AxonError::InvalidPayload(_)));
    }

    #[test]
    fn test_wrong_variant_accessors() {
        assert!(AxonResult::Csv(String::new()).into_time_series().is_err());
        assert!(AxonResult::Zinc(String::new()).into_metadata().is_err());
    }
}
