use crate::value_objects::bar::Bar;
use serde::Serialize;

/// Precomputed technical indicators over a close series.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorSnapshot {
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub momentum: Option<f64>,
}

/// Coarse summary of a longer horizon of bars.
#[derive(Debug, Clone, Serialize)]
pub struct HorizonSummary {
    pub bars: usize,
    pub first_close: f64,
    pub last_close: f64,
    pub high: f64,
    pub low: f64,
    pub change_pct: f64,
}

pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let slice = &closes[closes.len() - window..];
    Some(slice.iter().sum::<f64>() / window as f64)
}

/// Percent change over `lookback` bars.
pub fn momentum(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || closes.len() <= lookback {
        return None;
    }
    let past = closes[closes.len() - 1 - lookback];
    if past <= 0.0 {
        return None;
    }
    Some(closes[closes.len() - 1] / past - 1.0)
}

pub fn indicator_snapshot(
    closes: &[f64],
    fast_window: usize,
    slow_window: usize,
    momentum_lookback: usize,
) -> IndicatorSnapshot {
    IndicatorSnapshot {
        sma_fast: sma(closes, fast_window),
        sma_slow: sma(closes, slow_window),
        momentum: momentum(closes, momentum_lookback),
    }
}

pub fn horizon_summary(bars: &[Bar]) -> Option<HorizonSummary> {
    let first = bars.first()?;
    let last = bars.last()?;
    let mut high = f64::MIN;
    let mut low = f64::MAX;
    for bar in bars {
        high = high.max(bar.high);
        low = low.min(bar.low);
    }
    let change_pct = if first.close > 0.0 {
        last.close / first.close - 1.0
    } else {
        0.0
    };
    Some(HorizonSummary {
        bars: bars.len(),
        first_close: first.close,
        last_close: last.close,
        high,
        low,
        change_pct,
    })
}
