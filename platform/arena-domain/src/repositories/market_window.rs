use crate::value_objects::bar::Bar;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketDataError {
    #[error("no bars for {symbol} between {start} and {end}")]
    DataGap { symbol: String, start: i64, end: i64 },
    #[error("market data backend: {0}")]
    Backend(String),
}

/// Ordered historical bars for a symbol/interval/range. Implementations
/// must return ascending timestamps with duplicates removed; partial
/// coverage is returned as-is (a live store may still be backfilling).
/// Read-only: no side effects on the store.
pub trait MarketWindowSource {
    fn bars(
        &self,
        symbol: &str,
        interval_minutes: u32,
        start: i64,
        end: i64,
    ) -> Result<Vec<Bar>, MarketDataError>;
}
