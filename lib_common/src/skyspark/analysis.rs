//! Interval checks for accumulator (pulse) meter series.
//!
//! A gas meter's raw accumulator should arrive at a fixed interval and move on
//! every sample. When neither holds, the series is laid on a regular grid at
//! the smallest observed gap so the missing slots become visible as `NaN`.

use chrono::{Duration, NaiveDateTime};

use super::table::TimeSeriesTable;

#[derive(Debug, Clone, PartialEq)]
pub struct RawAnalysis {
    /// Every successive gap between timestamps is the same.
    pub timestamps_consistent: bool,
    /// No two successive readings are equal.
    pub pulses_consistent: bool,
    /// Grid step used when the series was reindexed.
    pub assumed_interval: Option<Duration>,
    /// NaN-free input, or the reindexed series.
    pub series: Vec<(NaiveDateTime, f64)>,
}

impl RawAnalysis {
    pub fn reindexed(&self) -> bool {
        self.assumed_interval.is_some()
    }
}

/// Runs the checks on one column. `None` if the column does not exist.
pub fn raw_analysis(table: &TimeSeriesTable, column: &str) -> Option<RawAnalysis> {
    let series = table.series(column)?;
    Some(analyze_series(series))
}

pub fn analyze_series(series: Vec<(NaiveDateTime, f64)>) -> RawAnalysis {
    let series: Vec<_> = series.into_iter().filter(|(_, v)| !v.is_nan()).collect();

    let gaps: Vec<Duration> = series.windows(2).map(|w| w[1].0 - w[0].0).collect();
    let timestamps_consistent = gaps.windows(2).all(|w| w[0] == w[1]);

    let min_step = series
        .windows(2)
        .map(|w| w[1].1 - w[0].1)
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))));
    let pulses_consistent = min_step != Some(0.0);

    let mut analysis = RawAnalysis {
        timestamps_consistent,
        pulses_consistent,
        assumed_interval: None,
        series,
    };

    if !timestamps_consistent && !pulses_consistent {
        if let Some(step) = gaps.iter().copied().filter(|g| *g > Duration::zero()).min() {
            analysis.series = reindex(&analysis.series, step);
            analysis.assumed_interval = Some(step);
        }
    }
    analysis
}

/// Places `series` on a grid from its first to its last timestamp.
///
/// Readings that fall exactly on a slot keep their value; every other slot is `NaN`.
pub fn reindex(series: &[(NaiveDateTime, f64)], step: Duration) -> Vec<(NaiveDateTime, f64)> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Vec::new();
    };
    if step <= Duration::zero() {
        return series.to_vec();
    }

    let mut out = Vec::new();
    let mut cursor = 0;
    let mut slot = first.0;
    while slot <= last.0 {
        while cursor < series.len() && series[cursor].0 < slot {
            cursor += 1;
        }
        let value = match series.get(cursor) {
            Some((ts, v)) if *ts == slot => *v,
            _ => f64::NAN,
        };
        out.push((slot, value));
        slot += step;
    }
    out
}
