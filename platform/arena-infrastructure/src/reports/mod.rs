use arena_domain::repositories::artifacts::ReportWriter;
use arena_domain::services::run_log::LogEntry;
use arena_domain::value_objects::equity_point::EquityPoint;
use arena_domain::value_objects::trade::Trade;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemReportWriter;

impl FilesystemReportWriter {
    pub fn new() -> Self {
        Self
    }
}

fn record_write(kind: &'static str, start: Instant, result: &Result<(), String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "arena.infra.reports.write.calls_total",
        "kind" => kind,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("arena.infra.reports.write_ms", "kind" => kind, "result" => result_label)
        .record(start.elapsed().as_millis() as f64);
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create {}: {}", path.display(), err))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| format!("failed to write row to {}: {}", path.display(), err))?;
    }
    writer
        .flush()
        .map_err(|err| format!("failed to flush {}: {}", path.display(), err))
}

impl ReportWriter for FilesystemReportWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        let start = Instant::now();
        let result = fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err));
        record_write("ensure_dir", start, &result);
        result
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        let start = Instant::now();
        let result = write_csv(path, points);
        record_write("equity_csv", start, &result);
        result
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String> {
        let start = Instant::now();
        let result = write_csv(path, trades);
        record_write("trades_csv", start, &result);
        result
    }

    fn write_logs_jsonl(&self, path: &Path, entries: &[LogEntry]) -> Result<(), String> {
        let start = Instant::now();
        let result = (|| {
            let mut out = String::new();
            for entry in entries {
                let line = serde_json::to_string(entry)
                    .map_err(|err| format!("failed to serialize log entry: {err}"))?;
                out.push_str(&line);
                out.push('\n');
            }
            fs::write(path, out)
                .map_err(|err| format!("failed to write {}: {}", path.display(), err))
        })();
        record_write("logs_jsonl", start, &result);
        result
    }

    fn write_summary_json(&self, path: &Path, summary: &serde_json::Value) -> Result<(), String> {
        let start = Instant::now();
        let result = serde_json::to_string_pretty(summary)
            .map_err(|err| format!("failed to serialize summary: {err}"))
            .and_then(|json| {
                fs::write(path, json)
                    .map_err(|err| format!("failed to write {}: {}", path.display(), err))
            });
        record_write("summary_json", start, &result);
        result
    }
}
