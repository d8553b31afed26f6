use arena_application::engine::{EngineSettings, RunError, RunState, StepLoop};
use arena_application::request::BacktestRequest;
use arena_domain::repositories::decision_oracle::{
    DecisionOracle, IntelligenceLevel, OracleDecision, OracleError, OraclePayload,
};
use arena_domain::services::market_window::VecWindowSource;
use arena_domain::services::run_log::LogLevel;
use arena_domain::value_objects::bar::Bar;
use arena_infrastructure::market_data::CsvWindowSource;
use arena_infrastructure::oracle::HoldDecisionOracle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-01-01T00:00:00Z
const START: i64 = 1_704_067_200;

fn bar(ts: i64, close: f64) -> Bar {
    Bar {
        symbol: "BTCUSD".to_string(),
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

fn hourly_bars(hours: i64, price: impl Fn(i64) -> f64) -> Vec<Bar> {
    (0..=hours).map(|h| bar(START + h * 3600, price(h))).collect()
}

fn request(contestants: &str, end: &str) -> BacktestRequest {
    let raw = format!(
        r#"{{
            "start": "2024-01-01T00:00:00Z",
            "end": "{end}",
            "symbol": "BTCUSD",
            "step_minutes": 60,
            "initial_capital": 10000.0,
            "contestants": {contestants}
        }}"#
    );
    serde_json::from_str(&raw).expect("request should parse")
}

fn settings(decision_timeout_ms: u64) -> EngineSettings {
    EngineSettings {
        decision_timeout_ms,
        fee_rate: 0.001,
    }
}

struct SleepyOracle {
    delay: Duration,
}

#[async_trait]
impl DecisionOracle for SleepyOracle {
    async fn infer(
        &self,
        _payload: &OraclePayload,
        _level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError> {
        tokio::time::sleep(self.delay).await;
        Ok(OracleDecision {
            action: "hold".to_string(),
            percentage: 0.0,
            confidence: None,
            reasoning: None,
        })
    }
}

/// Decides from the payload timestamp alone, so identical runs see
/// identical decisions.
struct ScriptedOracle;

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn infer(
        &self,
        payload: &OraclePayload,
        _level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError> {
        let hour = (payload.timestamp - START) / 3600;
        let (action, percentage) = match hour % 7 {
            1 => ("buy", 0.2),
            4 => ("sell", 0.5),
            _ => ("hold", 0.0),
        };
        Ok(OracleDecision {
            action: action.to_string(),
            percentage,
            confidence: Some(0.8),
            reasoning: None,
        })
    }
}

/// Flips the run's cancellation flag from inside the first decision.
#[derive(Default)]
struct CancelOnFirstCall {
    flag: Mutex<Option<Arc<AtomicBool>>>,
}

impl CancelOnFirstCall {
    fn arm(&self, handle: Arc<AtomicBool>) {
        *self.flag.lock().expect("flag lock") = Some(handle);
    }
}

#[async_trait]
impl DecisionOracle for CancelOnFirstCall {
    async fn infer(
        &self,
        _payload: &OraclePayload,
        _level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError> {
        if let Some(handle) = self.flag.lock().expect("flag lock").as_ref() {
            handle.store(true, Ordering::Relaxed);
        }
        Ok(OracleDecision {
            action: "hold".to_string(),
            percentage: 0.0,
            confidence: None,
            reasoning: None,
        })
    }
}

#[tokio::test]
async fn accumulator_buys_once_per_interval() {
    let source = VecWindowSource::new(hourly_bars(72, |_| 100.0));
    let oracle: Arc<dyn DecisionOracle> = Arc::new(HoldDecisionOracle);
    let step_loop = StepLoop::new(
        "run-accum",
        request(r#"["dca-daily"]"#, "2024-01-04T00:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();

    let result = step_loop.run(&source).await.unwrap();
    assert_eq!(result.summary.state, RunState::Completed);
    assert_eq!(result.summary.ticks_processed, 72);

    let report = &result.contestants[0];
    assert_eq!(report.trades.len(), 3);
    for trade in &report.trades {
        assert!((trade.quantity - 1.0).abs() < 1e-9);
        assert!((trade.fee - 0.1).abs() < 1e-9);
    }

    // 3 buys of 100 notional at 10 bps each.
    let last = report.equity_curve.last().unwrap();
    assert!((last.balance - 9_699.7).abs() < 1e-6);
    assert!((last.position_qty - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn slow_oracle_degrades_every_tick_to_hold() {
    let source = VecWindowSource::new(hourly_bars(3, |_| 100.0));
    let oracle: Arc<dyn DecisionOracle> = Arc::new(SleepyOracle {
        delay: Duration::from_millis(500),
    });
    let step_loop = StepLoop::new(
        "run-timeout",
        request(r#"["agent-lite"]"#, "2024-01-01T03:00:00Z"),
        settings(50),
        oracle,
    )
    .unwrap();

    let result = step_loop.run(&source).await.unwrap();
    assert_eq!(result.summary.state, RunState::Completed);
    assert_eq!(result.summary.ticks_processed, 3);

    let report = &result.contestants[0];
    assert!(report.trades.is_empty());

    let degraded: Vec<_> = report
        .logs
        .iter()
        .filter(|entry| entry.level == LogLevel::Warn && entry.action == "hold")
        .collect();
    assert_eq!(degraded.len(), 3);
    for entry in degraded {
        assert!(entry.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(entry.details["degraded"], serde_json::json!(true));
    }
}

#[tokio::test]
async fn identical_runs_replay_identically() {
    let contestants = r#"[{"id": "scripted", "type": "model-agent",
        "settings": {"intelligence_level": "lite"}}]"#;
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let source = VecWindowSource::new(hourly_bars(48, |h| 100.0 + (h % 10) as f64));
        let oracle: Arc<dyn DecisionOracle> = Arc::new(ScriptedOracle);
        let step_loop = StepLoop::new(
            "run-replay",
            request(contestants, "2024-01-03T00:00:00Z"),
            settings(5_000),
            oracle,
        )
        .unwrap();
        let result = step_loop.run(&source).await.unwrap();
        let report = &result.contestants[0];
        assert!(!report.trades.is_empty());
        outputs.push((
            serde_json::to_string(&report.equity_curve).unwrap(),
            serde_json::to_string(&report.trades).unwrap(),
            serde_json::to_string(&report.logs).unwrap(),
        ));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn equity_always_equals_balance_plus_position_value() {
    let price = |h: i64| 100.0 + (h % 10) as f64;
    let source = VecWindowSource::new(hourly_bars(48, price));
    let oracle: Arc<dyn DecisionOracle> = Arc::new(ScriptedOracle);
    let step_loop = StepLoop::new(
        "run-identity",
        request(r#"["agent-lite"]"#, "2024-01-03T00:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();

    let result = step_loop.run(&source).await.unwrap();
    let report = &result.contestants[0];
    assert!(!report.equity_curve.is_empty());
    for point in &report.equity_curve {
        let tick_price = price((point.timestamp - START) / 3600);
        let expected = point.balance + point.position_qty * tick_price;
        assert!(
            (point.equity - expected).abs() < 1e-6,
            "equity {} != balance {} + qty {} * price {}",
            point.equity,
            point.balance,
            point.position_qty,
            tick_price
        );
    }
}

#[tokio::test]
async fn mixed_bare_and_configured_contestants_share_a_run() {
    let contestants = r#"["dca-daily", {"id": "smart", "type": "model-agent",
        "settings": {"intelligence_level": "indicator", "lookback": 12}}]"#;
    let source = VecWindowSource::new(hourly_bars(48, |_| 100.0));
    let oracle: Arc<dyn DecisionOracle> = Arc::new(HoldDecisionOracle);
    let step_loop = StepLoop::new(
        "run-mixed",
        request(contestants, "2024-01-03T00:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();

    let result = step_loop.run(&source).await.unwrap();
    assert_eq!(result.summary.state, RunState::Completed);
    assert_eq!(result.summary.contestants, 2);
    assert_eq!(result.contestants[0].id, "dca-daily");
    assert_eq!(result.contestants[1].id, "smart");

    // Accumulator trades; the holding agent never does.
    assert_eq!(result.contestants[0].trades.len(), 2);
    assert!(result.contestants[1].trades.is_empty());

    for pair in result.run_log.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
    }
}

#[tokio::test]
async fn pre_cancelled_run_fails_before_any_tick() {
    let source = VecWindowSource::new(hourly_bars(10, |_| 100.0));
    let oracle: Arc<dyn DecisionOracle> = Arc::new(HoldDecisionOracle);
    let step_loop = StepLoop::new(
        "run-precancel",
        request(r#"["dca-daily"]"#, "2024-01-01T10:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();

    step_loop.cancel_handle().store(true, Ordering::Relaxed);
    let result = step_loop.run(&source).await.unwrap();

    assert_eq!(result.summary.state, RunState::Failed);
    assert_eq!(result.summary.ticks_processed, 0);
    assert!(result.contestants[0].equity_curve.is_empty());
    assert!(result
        .run_log
        .iter()
        .any(|entry| entry.action == "cancelled"));
}

#[tokio::test]
async fn mid_run_cancellation_completes_with_partial_data() {
    let source = VecWindowSource::new(hourly_bars(10, |_| 100.0));
    let oracle = Arc::new(CancelOnFirstCall::default());
    let step_loop = StepLoop::new(
        "run-midcancel",
        request(r#"["agent-lite"]"#, "2024-01-01T10:00:00Z"),
        settings(5_000),
        Arc::clone(&oracle) as Arc<dyn DecisionOracle>,
    )
    .unwrap();
    oracle.arm(step_loop.cancel_handle());

    let result = step_loop.run(&source).await.unwrap();
    assert_eq!(result.summary.state, RunState::Completed);
    assert_eq!(result.summary.ticks_processed, 1);
    assert_eq!(result.contestants[0].equity_curve.len(), 1);
}

#[tokio::test]
async fn missing_data_fails_the_run() {
    // All bars live a year after the requested range.
    let bars: Vec<Bar> = (0..10)
        .map(|h| bar(START + 365 * 86_400 + h * 3600, 100.0))
        .collect();
    let source = VecWindowSource::new(bars);
    let oracle: Arc<dyn DecisionOracle> = Arc::new(HoldDecisionOracle);
    let step_loop = StepLoop::new(
        "run-gap",
        request(r#"["dca-daily"]"#, "2024-01-02T00:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();

    let err = step_loop.run(&source).await.unwrap_err();
    assert!(matches!(err, RunError::Data(_)));
}

#[tokio::test]
async fn csv_backed_source_runs_end_to_end() {
    let path = std::env::temp_dir().join(format!(
        "arena_bars_{}_{}.csv",
        std::process::id(),
        START
    ));
    let mut contents = String::from("timestamp_utc,open,high,low,close,volume\n");
    for h in 0..=48i64 {
        let ts = START + h * 3600;
        contents.push_str(&format!("{ts},100,100,100,100,1\n"));
    }
    std::fs::write(&path, contents).unwrap();

    let source = CsvWindowSource::from_path(&path, "BTCUSD").unwrap();
    assert_eq!(source.len(), 49);

    let oracle: Arc<dyn DecisionOracle> = Arc::new(HoldDecisionOracle);
    let step_loop = StepLoop::new(
        "run-csv",
        request(r#"["dca-daily"]"#, "2024-01-03T00:00:00Z"),
        settings(5_000),
        oracle,
    )
    .unwrap();
    let result = step_loop.run(&source).await.unwrap();

    assert_eq!(result.summary.state, RunState::Completed);
    assert_eq!(result.contestants[0].trades.len(), 2);

    let _ = std::fs::remove_file(&path);
}
