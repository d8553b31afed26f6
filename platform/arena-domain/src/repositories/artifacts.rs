use crate::services::run_log::LogEntry;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::Trade;
use std::path::Path;

pub trait ReportWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String>;

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String>;

    fn write_logs_jsonl(&self, path: &Path, entries: &[LogEntry]) -> Result<(), String>;

    fn write_summary_json(&self, path: &Path, summary: &serde_json::Value) -> Result<(), String>;
}
