use arena_application::engine::{EngineSettings, StepLoop};
use arena_application::report::BacktestResult;
use arena_application::request;
use arena_domain::repositories::artifacts::ReportWriter;
use arena_domain::repositories::decision_oracle::DecisionOracle;
use arena_infrastructure::market_data::CsvWindowSource;
use arena_infrastructure::oracle::{HoldDecisionOracle, HttpDecisionOracle};
use arena_infrastructure::reports::FilesystemReportWriter;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "arena-cli")]
#[command(about = "Runs a deterministic backtest arena from a request file.", version)]
struct Cli {
    /// Backtest request file (TOML or JSON).
    #[arg(long)]
    request: PathBuf,

    /// Market data CSV (timestamp_utc,open,high,low,close,volume).
    #[arg(long)]
    bars: PathBuf,

    /// Output directory for run artifacts.
    #[arg(long, default_value = "runs")]
    out: PathBuf,

    /// Decision oracle endpoint. When omitted, model agents degrade to
    /// an offline oracle that always holds.
    #[arg(long)]
    oracle_url: Option<String>,

    /// Per-decision timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    decision_timeout_ms: u64,

    /// Taker fee in basis points applied to every fill.
    #[arg(long, default_value_t = 10.0)]
    fee_bps: f64,

    /// Run identifier. Defaults to a UTC timestamp.
    #[arg(long)]
    run_id: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<(), String> {
    let filter = std::env::var("ARENA_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

async fn run(args: Cli) -> Result<(), String> {
    let request = request::load_request(&args.request)?;
    let source = CsvWindowSource::from_path(&args.bars, &request.symbol)
        .map_err(|err| err.to_string())?;
    if source.is_empty() {
        return Err(format!("no bars loaded from {}", args.bars.display()));
    }

    let oracle: Arc<dyn DecisionOracle> = match &args.oracle_url {
        Some(url) => Arc::new(HttpDecisionOracle::new(url, args.decision_timeout_ms)?),
        None => Arc::new(HoldDecisionOracle),
    };

    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| format!("run-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));
    let settings = EngineSettings {
        decision_timeout_ms: args.decision_timeout_ms,
        fee_rate: args.fee_bps / 10_000.0,
    };

    let step_loop =
        StepLoop::new(&run_id, request, settings, oracle).map_err(|err| err.to_string())?;
    let result = step_loop
        .run(&source)
        .await
        .map_err(|err| err.to_string())?;

    write_artifacts(&args.out, &run_id, &result)?;

    let summary = serde_json::to_value(&result.summary)
        .map_err(|err| format!("failed to serialize summary: {err}"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("failed to render summary: {err}"))?
    );
    Ok(())
}

fn write_artifacts(out: &PathBuf, run_id: &str, result: &BacktestResult) -> Result<(), String> {
    let writer = FilesystemReportWriter::new();
    let run_dir = out.join(run_id);
    writer.ensure_dir(&run_dir)?;

    for contestant in &result.contestants {
        let dir = run_dir.join(&contestant.id);
        writer.ensure_dir(&dir)?;
        writer.write_equity_csv(&dir.join("equity.csv"), &contestant.equity_curve)?;
        writer.write_trades_csv(&dir.join("trades.csv"), &contestant.trades)?;
        writer.write_logs_jsonl(&dir.join("logs.jsonl"), &contestant.logs)?;
        let summary = serde_json::to_value(&contestant.summary)
            .map_err(|err| format!("failed to serialize contestant summary: {err}"))?;
        writer.write_summary_json(&dir.join("summary.json"), &summary)?;
    }

    writer.write_logs_jsonl(&run_dir.join("logs.jsonl"), &result.run_log)?;
    let summary = serde_json::to_value(&result.summary)
        .map_err(|err| format!("failed to serialize run summary: {err}"))?;
    writer.write_summary_json(&run_dir.join("summary.json"), &summary)?;

    tracing::info!(run_dir = %run_dir.display(), "artifacts written");
    Ok(())
}
