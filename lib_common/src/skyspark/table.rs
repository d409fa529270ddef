//! # Result Tables
//!
//! `TimeSeriesTable` holds numeric readings keyed by a naive timestamp, one
//! column per point id. `MetadataTable` holds the tag records of points.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::error::{AxonError, Result};

/// Rows of (timestamp, readings) with a fixed column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesTable {
    columns: Vec<String>,
    index: Vec<NaiveDateTime>,
    values: Vec<Vec<f64>>,
}

impl TimeSeriesTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            index: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends one row. The row must have exactly one value per column.
    pub fn push_row(&mut self, ts: NaiveDateTime, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(AxonError::InvalidPayload(format!(
                "row at {} has {} values for {} columns",
                ts,
                row.len(),
                self.columns.len()
            )));
        }
        self.index.push(ts);
        self.values.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Iterates `(timestamp, row)` in stored order.
    pub fn rows(&self) -> impl Iterator<Item = (&NaiveDateTime, &[f64])> {
        self.index.iter().zip(self.values.iter().map(Vec::as_slice))
    }

    /// Readings of one column, aligned with `index()`.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let pos = self.columns.iter().position(|c| c == name)?;
        Some(self.values.iter().map(|row| row[pos]).collect())
    }

    /// `(timestamp, value)` pairs of one column.
    pub fn series(&self, name: &str) -> Option<Vec<(NaiveDateTime, f64)>> {
        let values = self.column(name)?;
        Some(self.index.iter().copied().zip(values).collect())
    }

    /// Renames columns through `mapping`; names without an entry are kept.
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) {
        for column in self.columns.iter_mut() {
            if let Some(new_name) = mapping.get(column) {
                *column = new_name.clone();
            }
        }
    }

    /// Appends the rows of `other`.
    ///
    /// The column set becomes the union of both tables (this table's order
    /// first); cells a table does not have are `NaN`.
    pub fn append(&mut self, other: TimeSeriesTable) {
        let mut positions = Vec::with_capacity(other.columns.len());
        for column in &other.columns {
            match self.columns.iter().position(|c| c == column) {
                Some(pos) => positions.push(pos),
                None => {
                    self.columns.push(column.clone());
                    for row in self.values.iter_mut() {
                        row.push(f64::NAN);
                    }
                    positions.push(self.columns.len() - 1);
                }
            }
        }

        let width = self.columns.len();
        for (ts, row) in other.index.into_iter().zip(other.values) {
            let mut widened = vec![f64::NAN; width];
            for (value, pos) in row.into_iter().zip(&positions) {
                widened[*pos] = value;
            }
            self.index.push(ts);
            self.values.push(widened);
        }
    }
}

impl fmt::Display for TimeSeriesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<19}", "ts")?;
        for column in &self.columns {
            write!(f, "  {}", column)?;
        }
        writeln!(f)?;
        for (ts, row) in self.rows() {
            write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))?;
            for value in row {
                write!(f, "  {}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Tag records, one row per point. Nested objects are flattened into dotted keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<BTreeMap<String, Value>>,
}

impl MetadataTable {
    /// Builds a table from JSON objects; non-object rows are rejected.
    pub fn from_json_rows(rows: &[Value]) -> Result<Self> {
        let mut table = MetadataTable::default();
        for (i, row) in rows.iter().enumerate() {
            let object = row
                .as_object()
                .ok_or_else(|| AxonError::InvalidPayload(format!("row {} is not an object", i)))?;
            let mut flat = BTreeMap::new();
            flatten_into(&mut flat, None, object);
            table.push(flat);
        }
        Ok(table)
    }

    /// Adds a record, extending the column list with unseen keys.
    pub fn push(&mut self, row: BTreeMap<String, Value>) {
        for key in row.keys() {
            if !self.columns.contains(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[BTreeMap<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// String values of a column, in row order; rows without it are skipped.
    pub fn column_strings(&self, column: &str) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Point ids (`id` column).
    pub fn ids(&self) -> Vec<String> {
        self.column_strings("id")
    }

    /// `name → id` for rows carrying both.
    pub fn name_to_id(&self) -> HashMap<String, String> {
        self.rows
            .iter()
            .filter_map(|r| {
                let name = r.get("name")?.as_str()?;
                let id = r.get("id")?.as_str()?;
                Some((name.to_string(), id.to_string()))
            })
            .collect()
    }

    /// Rows for which `keep` returns true, with the same column list.
    pub fn filter<F>(&self, keep: F) -> MetadataTable
    where
        F: Fn(&BTreeMap<String, Value>) -> bool,
    {
        MetadataTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

impl fmt::Display for MetadataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let full_key = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, Some(&full_key), inner),
            other => {
                out.insert(full_key, other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_push_row_enforces_width() {
        let mut table = TimeSeriesTable::new(vec!["a".into(), "b".into()]);
        assert!(table.push_row(ts("2020-01-01 00:00:00"), vec![1.0, 2.0]).is_ok());
        assert!(table.push_row(ts("2020-01-01 00:15:00"), vec![1.0]).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_append_unions_columns_with_nan() {
        let mut left = TimeSeriesTable::new(vec!["a".into()]);
        left.push_row(ts("2020-01-01 00:00:00"), vec![1.0]).unwrap();
        let mut right = TimeSeriesTable::new(vec!["b".into(), "a".into()]);
        right.push_row(ts("2020-01-01 00:15:00"), vec![5.0, 2.0]).unwrap();

        left.append(right);

        assert_eq!(left.columns(), &["a".to_string(), "b".to_string()]);
        let a = left.column("a").unwrap();
        let b = left.column("b").unwrap();
        assert_eq!(a, vec![1.0, 2.0]);
        assert!(b[0].is_nan());
        assert_eq!(b[1], 5.0);
    }

    #[test]
    fn test_rename_columns_keeps_unmapped() {
        let mut table = TimeSeriesTable::new(vec!["v0".into(), "v1".into()]);
        let mapping = HashMap::from([("v0".to_string(), "r:abc".to_string())]);
        table.rename_columns(&mapping);
        assert_eq!(table.columns(), &["r:abc".to_string(), "v1".to_string()]);
    }

    #[test]
    fn test_metadata_flattens_nested_objects() {
        let rows = vec![
            json!({"id": "r:p1 Meter 1", "dis": "Meter 1", "siteRef": {"val": "r:s1", "dis": "Site"}}),
            json!({"id": "r:p2 Meter 2", "link": "28.75"}),
        ];
        let table = MetadataTable::from_json_rows(&rows).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &["dis", "id", "siteRef.dis", "siteRef.val", "link"].map(String::from)
        );
        assert_eq!(table.get(0, "siteRef.val"), Some(&json!("r:s1")));
        assert_eq!(table.get(1, "dis"), None);
        assert_eq!(table.ids(), vec!["r:p1 Meter 1", "r:p2 Meter 2"]);
    }

    #[test]
    fn test_metadata_rejects_non_objects() {
        assert!(MetadataTable::from_json_rows(&[json!("x")]).is_err());
    }

    #[test]
    fn test_name_to_id_and_filter() {
        let rows = vec![
            json!({"name": "v0", "id": "r:a"}),
            json!({"name": "v1", "id": "r:b", "gas": "m:"}),
            json!({"name": "v2"}),
        ];
        let table = MetadataTable::from_json_rows(&rows).unwrap();
        let mapping = table.name_to_id();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["v1"], "r:b");

        let gas = table.filter(|r| r.contains_key("gas"));
        assert_eq!(gas.len(), 1);
        assert_eq!(gas.columns(), table.columns());
    }
}
