use arena_domain::repositories::decision_oracle::{DecisionOracle, IntelligenceLevel};
use arena_domain::services::contestants::{
    AccumulationSize, AccumulatorContestant, Contestant, ContestantKind, ModelAgentContestant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_INTERVAL_MINUTES: u32 = 1440;
const DEFAULT_NOTIONAL: f64 = 100.0;
const DEFAULT_LOOKBACK: usize = 24;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("start must be before end")]
    InvalidRange,
    #[error("step_minutes must be positive")]
    InvalidStep,
    #[error("initial_capital must be positive")]
    InvalidCapital,
    #[error("request needs at least one contestant")]
    NoContestants,
    #[error("duplicate contestant id: {0}")]
    DuplicateId(String),
    #[error("cannot infer contestant type from id: {0}")]
    UnknownContestantId(String),
    #[error("contestant {id}: {reason}")]
    InvalidSettings { id: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestantType {
    #[serde(rename = "accumulator")]
    Accumulator,
    #[serde(rename = "model-agent")]
    ModelAgent,
}

/// Full contestant entry. `settings` is a bag keyed by type; unknown keys
/// are ignored so older engines accept requests from newer clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestantConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContestantType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// A contestant entry is either a bare id (resolved to defaults for its
/// inferred type) or a full config object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContestantSpec {
    Id(String),
    Config(ContestantConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub symbol: String,
    pub step_minutes: u32,
    pub initial_capital: f64,
    pub contestants: Vec<ContestantSpec>,
}

pub fn load_request(path: &Path) -> Result<BacktestRequest, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read request {}: {}", path.display(), err))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&contents)
            .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
    } else {
        serde_json::from_str(&contents)
            .map_err(|err| format!("failed to parse JSON {}: {}", path.display(), err))
    }
}

pub fn validate(request: &BacktestRequest) -> Result<(), ConfigError> {
    if request.symbol.trim().is_empty() {
        return Err(ConfigError::EmptySymbol);
    }
    if request.start >= request.end {
        return Err(ConfigError::InvalidRange);
    }
    if request.step_minutes == 0 {
        return Err(ConfigError::InvalidStep);
    }
    if !request.initial_capital.is_finite() || request.initial_capital <= 0.0 {
        return Err(ConfigError::InvalidCapital);
    }
    if request.contestants.is_empty() {
        return Err(ConfigError::NoContestants);
    }
    Ok(())
}

/// Resolves every entry to a concrete contestant, sharing one oracle
/// across model agents. Registration order is preserved.
pub fn resolve_contestants(
    request: &BacktestRequest,
    oracle: &Arc<dyn DecisionOracle>,
) -> Result<Vec<ContestantKind>, ConfigError> {
    let mut seen = HashSet::new();
    let mut contestants = Vec::with_capacity(request.contestants.len());
    for spec in &request.contestants {
        let contestant = match spec {
            ContestantSpec::Id(id) => resolve_bare_id(id, oracle)?,
            ContestantSpec::Config(config) => resolve_config(config, oracle)?,
        };
        if !seen.insert(contestant.id().to_string()) {
            return Err(ConfigError::DuplicateId(contestant.id().to_string()));
        }
        contestants.push(contestant);
    }
    Ok(contestants)
}

fn resolve_bare_id(
    id: &str,
    oracle: &Arc<dyn DecisionOracle>,
) -> Result<ContestantKind, ConfigError> {
    if id.starts_with("accumulator") || id.starts_with("dca") {
        return Ok(ContestantKind::Accumulator(AccumulatorContestant::new(
            id,
            id,
            DEFAULT_INTERVAL_MINUTES,
            AccumulationSize::Notional(DEFAULT_NOTIONAL),
        )));
    }
    if id.starts_with("agent") || id.starts_with("model") {
        let level = if id.ends_with("-indicator") {
            IntelligenceLevel::Indicator
        } else if id.ends_with("-strategy") {
            IntelligenceLevel::Strategy
        } else {
            IntelligenceLevel::Lite
        };
        return Ok(ContestantKind::ModelAgent(ModelAgentContestant::new(
            id,
            id,
            Some(level),
            None,
            DEFAULT_LOOKBACK,
            Arc::clone(oracle),
        )));
    }
    Err(ConfigError::UnknownContestantId(id.to_string()))
}

fn resolve_config(
    config: &ContestantConfig,
    oracle: &Arc<dyn DecisionOracle>,
) -> Result<ContestantKind, ConfigError> {
    let name = config.name.clone().unwrap_or_else(|| config.id.clone());
    match config.kind {
        ContestantType::Accumulator => {
            let interval = u32_setting(config, "interval_minutes")?
                .unwrap_or(DEFAULT_INTERVAL_MINUTES);
            if interval == 0 {
                return Err(invalid(config, "interval_minutes must be positive"));
            }
            let notional = f64_setting(config, "notional")?;
            let pct_balance = f64_setting(config, "pct_balance")?;
            let size = match (notional, pct_balance) {
                (Some(_), Some(_)) => {
                    return Err(invalid(config, "notional and pct_balance are exclusive"));
                }
                (None, Some(pct)) => {
                    if !(0.0..=1.0).contains(&pct) || pct == 0.0 {
                        return Err(invalid(config, "pct_balance must be in (0, 1]"));
                    }
                    AccumulationSize::PctBalance(pct)
                }
                (Some(amount), None) => {
                    if !amount.is_finite() || amount <= 0.0 {
                        return Err(invalid(config, "notional must be positive"));
                    }
                    AccumulationSize::Notional(amount)
                }
                (None, None) => AccumulationSize::Notional(DEFAULT_NOTIONAL),
            };
            Ok(ContestantKind::Accumulator(AccumulatorContestant::new(
                config.id.clone(),
                name,
                interval,
                size,
            )))
        }
        ContestantType::ModelAgent => {
            let level = match string_setting(config, "intelligence_level")? {
                Some(raw) => Some(parse_level(config, &raw)?),
                None => None,
            };
            let system_prompt = string_setting(config, "system_prompt")?;
            let lookback = u32_setting(config, "lookback")?
                .map(|value| value as usize)
                .unwrap_or(DEFAULT_LOOKBACK);
            if lookback == 0 {
                return Err(invalid(config, "lookback must be positive"));
            }
            Ok(ContestantKind::ModelAgent(ModelAgentContestant::new(
                config.id.clone(),
                name,
                level,
                system_prompt,
                lookback,
                Arc::clone(oracle),
            )))
        }
    }
}

fn parse_level(config: &ContestantConfig, raw: &str) -> Result<IntelligenceLevel, ConfigError> {
    match raw {
        "lite" => Ok(IntelligenceLevel::Lite),
        "indicator" => Ok(IntelligenceLevel::Indicator),
        "strategy" => Ok(IntelligenceLevel::Strategy),
        other => Err(invalid(
            config,
            &format!("unknown intelligence_level: {other}"),
        )),
    }
}

fn invalid(config: &ContestantConfig, reason: &str) -> ConfigError {
    ConfigError::InvalidSettings {
        id: config.id.clone(),
        reason: reason.to_string(),
    }
}

fn f64_setting(config: &ContestantConfig, key: &str) -> Result<Option<f64>, ConfigError> {
    match config.settings.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(config, &format!("{key} must be a number"))),
    }
}

fn u32_setting(config: &ContestantConfig, key: &str) -> Result<Option<u32>, ConfigError> {
    match config.settings.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid(config, &format!("{key} must be a non-negative integer"))),
    }
}

fn string_setting(config: &ContestantConfig, key: &str) -> Result<Option<String>, ConfigError> {
    match config.settings.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid(config, &format!("{key} must be a string"))),
    }
}
