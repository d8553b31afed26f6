use crate::services::features::{HorizonSummary, IndicatorSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("decision oracle timed out after {0} ms")]
    Timeout(u64),
    #[error("decision oracle unavailable: {0}")]
    Unavailable(String),
}

/// How much market context is sent with an inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntelligenceLevel {
    Lite,
    Indicator,
    Strategy,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioBrief {
    pub balance: f64,
    pub position_qty: f64,
    pub position_avg_price: f64,
    pub equity: f64,
}

/// Context payload for one inference call. Optional sections are filled
/// in by intelligence level; `system_prompt` carries the legacy setting
/// verbatim when a config predates intelligence levels.
#[derive(Debug, Clone, Serialize)]
pub struct OraclePayload {
    pub symbol: String,
    pub timestamp: i64,
    pub closes: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<IndicatorSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<HorizonSummary>,
    pub portfolio: PortfolioBrief,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleDecision {
    pub action: String,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn infer(
        &self,
        payload: &OraclePayload,
        level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError>;
}
