use crate::report::{self, BacktestResult};
use crate::request::{self, BacktestRequest, ConfigError};
use arena_domain::entities::ledger::{BuySpend, LedgerError, PortfolioLedger};
use arena_domain::repositories::decision_oracle::{DecisionOracle, OracleError};
use arena_domain::repositories::market_window::{MarketDataError, MarketWindowSource};
use arena_domain::services::contestants::{Contestant, ContestantKind, TickContext};
use arena_domain::services::run_log::{LogLevel, RunLog};
use arena_domain::value_objects::action::{Action, ActionKind, ActionSize};
use arena_domain::value_objects::bar::Bar;
use arena_domain::value_objects::equity_point::EquityPoint;
use arena_domain::value_objects::trade::Trade;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub decision_timeout_ms: u64,
    pub fee_rate: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            decision_timeout_ms: 5_000,
            fee_rate: 0.001,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] MarketDataError),
}

struct ContestantRun {
    contestant: ContestantKind,
    ledger: PortfolioLedger,
    equity_curve: Vec<EquityPoint>,
}

/// Drives one backtest run from `Idle` to a terminal state. Ticks are
/// strictly sequential; within a tick all contestants decide concurrently
/// and the tick advances only after every decision (or its timeout)
/// resolves. Each ledger is exclusively owned by its contestant's slot,
/// so no cross-contestant locking exists anywhere.
pub struct StepLoop {
    run_id: String,
    request: BacktestRequest,
    settings: EngineSettings,
    runs: Vec<ContestantRun>,
    log: RunLog,
    state: RunState,
    cancel: Arc<AtomicBool>,
    ticks_processed: u64,
}

impl StepLoop {
    /// Validates and resolves the request. A malformed request never
    /// constructs a loop, so no ticks can run against it.
    pub fn new(
        run_id: impl Into<String>,
        request: BacktestRequest,
        settings: EngineSettings,
        oracle: Arc<dyn DecisionOracle>,
    ) -> Result<Self, ConfigError> {
        request::validate(&request)?;
        let contestants = request::resolve_contestants(&request, &oracle)?;
        let run_id = run_id.into();
        let runs = contestants
            .into_iter()
            .map(|contestant| ContestantRun {
                contestant,
                ledger: PortfolioLedger::new(request.initial_capital),
                equity_curve: Vec::new(),
            })
            .collect();
        Ok(Self {
            run_id: run_id.clone(),
            request,
            settings,
            runs,
            log: RunLog::new(run_id),
            state: RunState::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
            ticks_processed: 0,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Cooperative cancellation handle, checked at tick boundaries.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(mut self, source: &dyn MarketWindowSource) -> Result<BacktestResult, RunError> {
        self.state = RunState::Running;
        let symbol = self.request.symbol.clone();
        let start_ts = self.request.start.timestamp();
        let end_ts = self.request.end.timestamp();
        let step_secs = i64::from(self.request.step_minutes) * 60;
        let timeout = Duration::from_millis(self.settings.decision_timeout_ms);

        info!(
            run_id = %self.run_id,
            symbol = %symbol,
            contestants = self.runs.len(),
            step_minutes = self.request.step_minutes,
            "backtest run started"
        );

        let bars = match source.bars(&symbol, self.request.step_minutes, start_ts, end_ts) {
            Ok(bars) => bars,
            Err(err) => {
                self.state = RunState::Failed;
                self.log.append(
                    start_ts,
                    LogLevel::Warn,
                    "data",
                    None,
                    "load_failed",
                    Some(err.to_string()),
                    json!({ "symbol": symbol }),
                );
                return Err(err.into());
            }
        };

        let engine_start = Instant::now();
        let mut clock = start_ts;
        let mut cancelled = false;

        while clock + step_secs <= end_ts {
            if self.cancel.load(Ordering::Relaxed) {
                cancelled = true;
                self.log.append(
                    clock,
                    LogLevel::Warn,
                    "engine",
                    None,
                    "cancelled",
                    None,
                    json!({ "ticks_processed": self.ticks_processed }),
                );
                break;
            }

            clock += step_secs;
            let visible_len = bars.partition_point(|bar| bar.timestamp <= clock);
            if visible_len == 0 {
                // Coverage starts later in the range; nothing priced yet.
                continue;
            }
            let visible = &bars[..visible_len];
            let tick_price = visible[visible_len - 1].close;

            self.process_tick(visible, clock, start_ts, tick_price, timeout)
                .await;
            self.ticks_processed += 1;

            if visible_len == bars.len() {
                // Every remaining tick would replay the same final bar.
                break;
            }
        }

        self.state = if self.ticks_processed == 0 {
            RunState::Failed
        } else {
            RunState::Completed
        };

        let engine_ms = engine_start.elapsed().as_millis() as f64;
        metrics::histogram!("arena.backtest.engine_ms").record(engine_ms);
        metrics::gauge!("arena.backtest.ticks_processed").set(self.ticks_processed as f64);

        self.log.append(
            clock,
            LogLevel::Info,
            "engine",
            None,
            "complete",
            None,
            json!({
                "state": self.state,
                "ticks_processed": self.ticks_processed,
                "cancelled": cancelled,
            }),
        );
        info!(
            run_id = %self.run_id,
            ticks = self.ticks_processed,
            state = ?self.state,
            "backtest run finished"
        );

        let parts: Vec<report::ContestantPart> = self
            .runs
            .into_iter()
            .map(|run| report::ContestantPart {
                id: run.contestant.id().to_string(),
                name: run.contestant.name().to_string(),
                equity_curve: run.equity_curve,
                trades: run.ledger.trades().to_vec(),
            })
            .collect();
        Ok(report::aggregate(
            &self.run_id,
            &symbol,
            self.state,
            self.ticks_processed,
            self.request.initial_capital,
            parts,
            self.log,
        ))
    }

    /// One tick: concurrent decisions behind a barrier, then sequential
    /// application in registration order for reproducible logs.
    async fn process_tick(
        &mut self,
        visible: &[Bar],
        clock: i64,
        start_ts: i64,
        tick_price: f64,
        timeout: Duration,
    ) {
        let ctx = TickContext {
            start_timestamp: start_ts,
            tick_timestamp: clock,
            step_minutes: self.request.step_minutes,
        };
        let timeout_ms = self.settings.decision_timeout_ms;
        let snapshots: Vec<_> = self.runs.iter().map(|run| run.ledger.snapshot()).collect();

        let decisions: Vec<Result<Vec<Action>, OracleError>> =
            join_all(self.runs.iter().zip(snapshots.iter()).map(|(run, snapshot)| {
                let contestant = &run.contestant;
                async move {
                    match tokio::time::timeout(timeout, contestant.decide(visible, snapshot, &ctx))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(OracleError::Timeout(timeout_ms)),
                    }
                }
            }))
            .await;

        let symbol = self.request.symbol.clone();
        let fee_rate = self.settings.fee_rate;
        let mut prices = BTreeMap::new();
        prices.insert(symbol.clone(), tick_price);

        for (run, decision) in self.runs.iter_mut().zip(decisions) {
            let contestant_id = run.contestant.id().to_string();
            match decision {
                Ok(actions) if actions.is_empty() => {
                    self.log.append(
                        clock,
                        LogLevel::Info,
                        "tick",
                        Some(&contestant_id),
                        "hold",
                        None,
                        json!({ "implicit": true }),
                    );
                }
                Ok(actions) => {
                    for action in actions {
                        apply_action(
                            &mut self.log,
                            &mut run.ledger,
                            &contestant_id,
                            &symbol,
                            clock,
                            tick_price,
                            fee_rate,
                            action,
                        );
                    }
                }
                Err(err) => {
                    // Decision failure degrades to an implicit hold; it
                    // never aborts the tick or the run.
                    warn!(
                        run_id = %self.run_id,
                        contestant = %contestant_id,
                        tick = clock,
                        error = %err,
                        "decision degraded to hold"
                    );
                    metrics::counter!("arena.backtest.decision_failures").increment(1);
                    self.log.append(
                        clock,
                        LogLevel::Warn,
                        "decision",
                        Some(&contestant_id),
                        "hold",
                        Some(err.to_string()),
                        json!({ "degraded": true }),
                    );
                }
            }

            let equity = run.ledger.mark_to_market(&prices);
            let unrealized: f64 = run
                .ledger
                .positions()
                .map(|pos| pos.unrealized_pnl)
                .sum();
            run.equity_curve.push(EquityPoint {
                timestamp: clock,
                equity,
                balance: run.ledger.balance(),
                position_qty: run.ledger.position_qty(&symbol),
                unrealized_pnl: unrealized,
                realized_pnl: run.ledger.realized_pnl(),
            });
        }
    }
}

/// Applies one action to one ledger. Invalid actions are dropped and
/// logged, never retried; the tick continues.
#[allow(clippy::too_many_arguments)]
fn apply_action(
    log: &mut RunLog,
    ledger: &mut PortfolioLedger,
    contestant_id: &str,
    symbol: &str,
    timestamp: i64,
    price: f64,
    fee_rate: f64,
    action: Action,
) {
    let detail = json!({
        "confidence": action.confidence,
        "reasoning": action.reasoning,
    });

    match action.kind {
        ActionKind::Hold => {
            log.append(
                timestamp,
                LogLevel::Info,
                "tick",
                Some(contestant_id),
                "hold",
                None,
                detail,
            );
        }
        ActionKind::Buy => {
            let spend = match action.size {
                ActionSize::Notional(notional) => Ok(BuySpend::Notional(notional)),
                ActionSize::Quantity(quantity) => Ok(BuySpend::Quantity(quantity)),
                ActionSize::PctBalance(pct) if pct > 0.0 && pct <= 1.0 => {
                    Ok(BuySpend::Notional(ledger.balance() * pct))
                }
                ActionSize::PctBalance(_) => Err("pct_balance out of range"),
                ActionSize::PctPosition(_) => Err("buy cannot be sized by position"),
            };
            match spend {
                Ok(spend) => {
                    record_fill(
                        log,
                        ledger.buy(symbol, timestamp, spend, price, fee_rate),
                        contestant_id,
                        timestamp,
                        "buy",
                        detail,
                    );
                }
                Err(reason) => {
                    log_reject(log, contestant_id, timestamp, "buy", reason);
                }
            }
        }
        ActionKind::Sell | ActionKind::Reduce => {
            let label = if action.kind == ActionKind::Sell {
                "sell"
            } else {
                "reduce"
            };
            let quantity = match action.size {
                ActionSize::Quantity(quantity) => Ok(quantity),
                ActionSize::Notional(notional) if price > 0.0 => Ok(notional / price),
                ActionSize::Notional(_) => Err("notional sell needs a positive price"),
                ActionSize::PctPosition(pct) if pct > 0.0 && pct <= 1.0 => {
                    Ok(ledger.position_qty(symbol) * pct)
                }
                ActionSize::PctPosition(_) => Err("pct_position out of range"),
                ActionSize::PctBalance(_) => Err("sell cannot be sized by balance"),
            };
            match quantity {
                Ok(quantity) => {
                    record_fill(
                        log,
                        ledger.sell(symbol, timestamp, quantity, price, fee_rate),
                        contestant_id,
                        timestamp,
                        label,
                        detail,
                    );
                }
                Err(reason) => {
                    log_reject(log, contestant_id, timestamp, label, reason);
                }
            }
        }
    }
}

fn record_fill(
    log: &mut RunLog,
    result: Result<Trade, LedgerError>,
    contestant_id: &str,
    timestamp: i64,
    label: &str,
    detail: serde_json::Value,
) {
    match result {
        Ok(trade) => {
            log.append(
                timestamp,
                LogLevel::Info,
                "tick",
                Some(contestant_id),
                label,
                None,
                json!({
                    "quantity": trade.quantity,
                    "price": trade.price,
                    "fee": trade.fee,
                    "total": trade.total,
                    "action": detail,
                }),
            );
        }
        Err(err) => {
            log.append(
                timestamp,
                LogLevel::Warn,
                "tick",
                Some(contestant_id),
                "reject",
                Some(err.to_string()),
                json!({ "attempted": label, "action": detail }),
            );
        }
    }
}

fn log_reject(log: &mut RunLog, contestant_id: &str, timestamp: i64, label: &str, reason: &str) {
    log.append(
        timestamp,
        LogLevel::Warn,
        "tick",
        Some(contestant_id),
        "reject",
        Some(reason.to_string()),
        json!({ "attempted": label }),
    );
}
