//! # Axon Query Composer
//!
//! Builds Axon expressions (`readAll(...)`, `.hisRead(...)`) and turns them
//! into `eval` request URLs. Query syntax is never validated here; SkySpark
//! reports malformed expressions itself.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use url::{form_urlencoded, Url};

use super::error::{AxonError, Result};

/// Start of the window used when reading a point's full history.
pub const HISTORY_START: (i32, u32, u32) = (2010, 1, 1);

/// An Axon expression. Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxonQuery(String);

impl AxonQuery {
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(AxonError::InvalidQuery("query string is empty".to_string()));
        }
        Ok(Self(query))
    }

    /// `readAll(<filter>)` for a raw Axon filter expression.
    pub fn read_all_expr(filter: &str) -> Result<Self> {
        if filter.trim().is_empty() {
            return Err(AxonError::InvalidQuery("readAll filter is empty".to_string()));
        }
        Ok(Self(format!("readAll({})", filter)))
    }

    /// `readAll(<filter>)` for a tag filter.
    pub fn read_all(filter: &TagFilter) -> Result<Self> {
        Self::read_all_expr(&filter.render())
    }

    /// Chains `.hisRead(<range>, {limit: null})`.
    pub fn his_read(self, range: &HisRange) -> Self {
        Self(format!("{}.hisRead({}, {{limit: null}})", self.0, range))
    }

    /// True if the expression reads history rather than point records.
    pub fn is_his_read(&self) -> bool {
        self.0.contains(".hisRead")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AxonQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AxonQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AxonQuery {
    type Err = AxonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// `host` with a trailing `/` on its path, so joins stay under the project.
pub fn project_root(host: &Url) -> Url {
    let mut root = host.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root
}

/// Builds `{host}/eval?expr=<percent-encoded query>`.
///
/// Spaces are written as `%20` rather than `+`, matching what SkySpark
/// expects from a path-style encoder.
pub fn compose_url(host: &Url, query: &AxonQuery) -> Result<Url> {
    let mut url = project_root(host)
        .join("eval")
        .map_err(|e| AxonError::InvalidQuery(format!("cannot join host {}: {}", host, e)))?;
    let encoded: String = form_urlencoded::byte_serialize(query.as_str().as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    url.set_query(Some(&format!("expr={}", encoded)));
    Ok(url)
}

/// Time window for `hisRead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HisRange {
    Now,
    Yesterday,
    Dates(NaiveDate, NaiveDate),
}

impl HisRange {
    /// `date(2010,01,01)..date(<until>)`.
    pub fn full_history(until: NaiveDate) -> Self {
        let (y, m, d) = HISTORY_START;
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(until);
        HisRange::Dates(start, until)
    }
}

impl fmt::Display for HisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HisRange::Now => f.write_str("now"),
            HisRange::Yesterday => f.write_str("yesterday"),
            HisRange::Dates(start, end) => write!(
                f,
                "date({})..date({})",
                start.format("%Y,%m,%d"),
                end.format("%Y,%m,%d")
            ),
        }
    }
}

/// Value side of a tag filter entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    /// Marker present (`true`) or absent (`false`).
    Marker(bool),
    /// Compared against a string, ref or number depending on the tag.
    Str(String),
}

/// Ordered tag constraints rendered into a `readAll` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: Vec<(String, TagValue)>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(mut self, tag: &str, present: bool) -> Self {
        self.tags.push((tag.to_string(), TagValue::Marker(present)));
        self
    }

    pub fn value(mut self, tag: &str, value: &str) -> Self {
        self.tags.push((tag.to_string(), TagValue::Str(value.to_string())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Renders the constraints joined with ` and `.
    pub fn render(&self) -> String {
        self.tags
            .iter()
            .map(|(tag, value)| render_tag(tag, value))
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

fn render_tag(tag: &str, value: &TagValue) -> String {
    let either_fuel = tag.contains("elec or gas") || tag.contains("gas or elec");
    match value {
        TagValue::Marker(true) if either_fuel => "(elec or gas)".to_string(),
        TagValue::Marker(false) if either_fuel => "not (elec or gas)".to_string(),
        TagValue::Marker(true) => tag.to_string(),
        TagValue::Marker(false) => format!("not {}", tag),
        // Refs
        TagValue::Str(v) if tag.contains("id") || tag.contains("siteRef") => format!("{}=={}", tag, as_ref_literal(v)),
        // Numbers
        TagValue::Str(v) if tag.contains("combustionVolume") => format!("{}=={}", tag, v),
        TagValue::Str(v) => format!("{}==\"{}\"", tag, v.replace('"', "\\\"")),
    }
}

fn as_ref_literal(value: &str) -> String {
    if value.starts_with('@') {
        value.to_string()
    } else {
        format!("@{}", value)
    }
}

/// Extracts the bare ref from a point id cell.
///
/// `"r:216fce5f-0d543013 Building 77 AHU-33"` → `"216fce5f-0d543013"`.
pub fn point_ref(id: &str) -> &str {
    let first = id.split_whitespace().next().unwrap_or("");
    first
        .strip_prefix("r:")
        .or_else(|| first.strip_prefix('@'))
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Url {
        Url::parse("http://skyspark.example.org/api/demo/").unwrap()
    }

    fn decoded_expr(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "expr")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_empty_query_is_rejected() {
        assert!(matches!(AxonQuery::new(""), Err(AxonError::InvalidQuery(_))));
        assert!(matches!(AxonQuery::new("   "), Err(AxonError::InvalidQuery(_))));
    }

    #[test]
    fn test_compose_url_round_trips_expr() {
        let queries = [
            "readAll(id==@216fce5f-0d543013).hisRead(date(2019,06,30)..date(2019,07,01), {limit: null})",
            r#"read(point and siteRef->dis=="Building 77" and equipRef->dis=="AHU-33").hisRead(yesterday)"#,
            "readAll(equipRef->link==\"28.75\" and a+b & c=d ? 100% °F)",
        ];
        for q in queries {
            let query = AxonQuery::new(q).unwrap();
            let url = compose_url(&host(), &query).unwrap();
            assert!(url.as_str().starts_with("http://skyspark.example.org/api/demo/eval?expr="));
            assert_eq!(decoded_expr(&url), q);
        }
    }

    #[test]
    fn test_compose_url_percent_encodes() {
        let query = AxonQuery::new("readAll(point and his)").unwrap();
        let url = compose_url(&host(), &query).unwrap();
        let raw = url.query().unwrap();
        assert_eq!(raw, "expr=readAll%28point%20and%20his%29");
        assert!(!raw.contains(' '));
        assert!(!raw.contains('+'));
    }

    #[test]
    fn test_compose_url_keeps_last_segment_without_slash() {
        let bare = Url::parse("http://skyspark.example.org/api/demo").unwrap();
        let query = AxonQuery::new("readAll(point)").unwrap();
        let url = compose_url(&bare, &query).unwrap();
        assert_eq!(url.as_str(), "http://skyspark.example.org/api/demo/eval?expr=readAll%28point%29");
        assert_eq!(project_root(&host()), host());
    }

    #[test]
    fn test_his_read_chaining() {
        let start = NaiveDate::from_ymd_opt(2019, 6, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2019, 7, 1).unwrap();
        let query = AxonQuery::read_all_expr("id==@abcd1234")
            .unwrap()
            .his_read(&HisRange::Dates(start, end));
        assert_eq!(
            query.as_str(),
            "readAll(id==@abcd1234).hisRead(date(2019,06,30)..date(2019,07,01), {limit: null})"
        );
        assert!(query.is_his_read());
        assert_eq!(
            AxonQuery::read_all_expr("x").unwrap().his_read(&HisRange::Now).as_str(),
            "readAll(x).hisRead(now, {limit: null})"
        );
    }

    #[test]
    fn test_full_history_starts_in_2010() {
        let until = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(HisRange::full_history(until).to_string(), "date(2010,01,01)..date(2024,03,09)");
    }

    #[test]
    fn test_tag_filter_rendering() {
        let filter = TagFilter::new()
            .marker("elec or gas", true)
            .marker("meter", true)
            .marker("virtual", false)
            .value("siteRef", "site-77")
            .value("link", "28.75")
            .value("navName", "Main")
            .value("combustionVolume", "12");
        assert_eq!(
            filter.render(),
            "(elec or gas) and meter and not virtual and siteRef==@site-77 and link==\"28.75\" and navName==\"Main\" and combustionVolume==12"
        );
        assert_eq!(
            AxonQuery::read_all(&TagFilter::new().marker("gas or elec", false)).unwrap().as_str(),
            "readAll(not (elec or gas))"
        );
    }

    #[test]
    fn test_empty_tag_filter_is_rejected() {
        assert!(AxonQuery::read_all(&TagFilter::new()).is_err());
    }

    #[test]
    fn test_point_ref() {
        assert_eq!(point_ref("r:216fce5f-0d543013 Building 77 AHU-33"), "216fce5f-0d543013");
        assert_eq!(point_ref("@abc"), "abc");
        assert_eq!(point_ref("plain"), "plain");
    }
}
