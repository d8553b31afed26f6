use crate::repositories::market_window::{MarketDataError, MarketWindowSource};
use crate::value_objects::bar::Bar;

/// Filters bars to the requested symbol and inclusive range. Fails with
/// `DataGap` only when nothing at all falls inside the range; sparse
/// coverage is the caller's problem.
pub fn bars_in_range(
    bars: &[Bar],
    symbol: &str,
    start: i64,
    end: i64,
) -> Result<Vec<Bar>, MarketDataError> {
    let selected: Vec<Bar> = bars
        .iter()
        .filter(|bar| bar.symbol == symbol && bar.timestamp >= start && bar.timestamp <= end)
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(MarketDataError::DataGap {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    Ok(selected)
}

/// Sorts ascending and drops duplicate timestamps, keeping the first seen.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|bar| bar.timestamp);
    bars.dedup_by_key(|bar| bar.timestamp);
    bars
}

/// In-memory bar source, normalized on construction.
pub struct VecWindowSource {
    bars: Vec<Bar>,
}

impl VecWindowSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars: normalize_bars(bars),
        }
    }
}

impl MarketWindowSource for VecWindowSource {
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
