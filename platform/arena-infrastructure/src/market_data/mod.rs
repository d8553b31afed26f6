use arena_domain::repositories::market_window::{MarketDataError, MarketWindowSource};
use arena_domain::services::market_window::{bars_in_range, normalize_bars};
use arena_domain::value_objects::bar::Bar;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvBarRecord {
    timestamp_utc: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

fn parse_timestamp(raw: &str) -> Result<i64, MarketDataError> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Ok(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc().timestamp());
    }
    Err(MarketDataError::Backend(format!(
        "unparseable timestamp: {raw}"
    )))
}

/// Bar source backed by a CSV file with columns
/// `timestamp_utc,open,high,low,close,volume`. Rows are sorted and
/// deduplicated by timestamp on load.
pub struct CsvWindowSource {
    bars: Vec<Bar>,
}

impl CsvWindowSource {
    pub fn from_path(path: &Path, symbol: &str) -> Result<Self, MarketDataError> {
        let file = File::open(path).map_err(|err| {
            MarketDataError::Backend(format!("failed to open {}: {}", path.display(), err))
        })?;
        let mut reader = csv::Reader::from_reader(file);
        let mut bars = Vec::new();
        for record in reader.deserialize::<CsvBarRecord>() {
            let record = record.map_err(|err| {
                MarketDataError::Backend(format!("bad row in {}: {}", path.display(), err))
            })?;
            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp: parse_timestamp(&record.timestamp_utc)?,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }
        let bars = normalize_bars(bars);
        tracing::info!(path = %path.display(), bars = bars.len(), "loaded market data");
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl MarketWindowSource for CsvWindowSource {
    fn bars(
        &self,
        symbol: &str,
        _interval_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<Bar>, MarketDataError> {
        bars_in_range(&self.bars, symbol, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    #[test]
    fn timestamps_parse_from_epoch_and_rfc3339() {
        assert_eq!(parse_timestamp("1704067200").unwrap(), 1_704_067_200);
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            1_704_067_200
        );
        assert_eq!(
            parse_timestamp("2024-01-01 00:00:00").unwrap(),
            1_704_067_200
        );
        assert!(parse_timestamp("yesterday").is_err());
    }
}
