use crate::engine::RunState;
use arena_domain::services::run_log::{LogEntry, RunLog};
use arena_domain::value_objects::equity_point::EquityPoint;
use arena_domain::value_objects::trade::Trade;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ContestantSummary {
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub trades: usize,
    pub max_drawdown: f64,
}

#[derive(Debug, Serialize)]
pub struct ContestantReport {
    pub id: String,
    pub name: String,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub logs: Vec<LogEntry>,
    pub summary: ContestantSummary,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub symbol: String,
    pub state: RunState,
    pub ticks_processed: u64,
    pub contestants: usize,
    pub best_contestant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BacktestResult {
    pub contestants: Vec<ContestantReport>,
    pub summary: RunSummary,
    /// Complete run log, including entries not tied to a contestant.
    pub run_log: Vec<LogEntry>,
}

/// Raw per-contestant material handed over by the engine.
pub struct ContestantPart {
    pub id: String,
    pub name: String,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

pub fn summarize(
    initial_capital: f64,
    equity_curve: &[EquityPoint],
    trades: &[Trade],
) -> ContestantSummary {
    let final_equity = equity_curve
        .last()
        .map(|point| point.equity)
        .unwrap_or(initial_capital);
    let total_return_pct = if initial_capital > 0.0 {
        final_equity / initial_capital - 1.0
    } else {
        0.0
    };

    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;
    for point in equity_curve {
        if peak == 0.0 || point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let drawdown = (peak - point.equity) / peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    ContestantSummary {
        final_equity,
        total_return_pct,
        trades: trades.len(),
        max_drawdown,
    }
}

/// Folds the engine's per-tick output into the final report. Pure and
/// post-hoc: nothing here feeds back into ledgers or the loop.
pub fn aggregate(
    run_id: &str,
    symbol: &str,
    state: RunState,
    ticks_processed: u64,
    initial_capital: f64,
    parts: Vec<ContestantPart>,
    log: RunLog,
) -> BacktestResult {
    let contestants: Vec<ContestantReport> = parts
        .into_iter()
        .map(|part| {
            let summary = summarize(initial_capital, &part.equity_curve, &part.trades);
            ContestantReport {
                logs: log.entries_for(&part.id),
                id: part.id,
                name: part.name,
                equity_curve: part.equity_curve,
                trades: part.trades,
                summary,
            }
        })
        .collect();

    let best_contestant = contestants
        .iter()
        .max_by(|a, b| {
            a.summary
                .final_equity
                .partial_cmp(&b.summary.final_equity)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|report| report.id.clone());

    BacktestResult {
        summary: RunSummary {
            run_id: run_id.to_string(),
            symbol: symbol.to_string(),
            state,
            ticks_processed,
            contestants: contestants.len(),
            best_contestant,
        },
        contestants,
        run_log: log.into_entries(),
    }
}
