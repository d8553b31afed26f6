use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
}

/// One structured entry in the per-run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: i64,
    pub level: LogLevel,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contestant_id: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: serde_json::Value,
}

/// Append-only log owned by a single run. Sequence numbers increase
/// monotonically; same-tick entries are appended in contestant
/// registration order, so output is reproducible regardless of which
/// decision future completed first.
#[derive(Debug)]
pub struct RunLog {
    run_id: String,
    next_seq: u64,
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        timestamp: i64,
        level: LogLevel,
        stage: &str,
        contestant_id: Option<&str>,
        action: &str,
        error: Option<String>,
        details: serde_json::Value,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(LogEntry {
            seq,
            timestamp,
            level,
            stage: stage.to_string(),
            contestant_id: contestant_id.map(|id| id.to_string()),
            action: action.to_string(),
            error,
            details,
        });
        seq
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn entries_for(&self, contestant_id: &str) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.contestant_id.as_deref() == Some(contestant_id))
            .cloned()
            .collect()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}
