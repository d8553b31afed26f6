use arena_domain::repositories::decision_oracle::{
    DecisionOracle, IntelligenceLevel, OracleDecision, OracleError, OraclePayload,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use std::time::Instant;

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    level: IntelligenceLevel,
    payload: &'a OraclePayload,
}

/// HTTP client for a remote decision oracle. One POST per inference;
/// no retries — a failed call degrades to hold upstream.
pub struct HttpDecisionOracle {
    url: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl HttpDecisionOracle {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            url: url.into(),
            timeout_ms,
            client,
        })
    }
}

#[async_trait]
impl DecisionOracle for HttpDecisionOracle {
    async fn infer(
        &self,
        payload: &OraclePayload,
        level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError> {
        let start = Instant::now();
        let result = self
            .client
            .post(&self.url)
            .json(&InferRequest { level, payload })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                record_call("timeout", start);
                return Err(OracleError::Timeout(self.timeout_ms));
            }
            Err(err) => {
                record_call("err", start);
                return Err(OracleError::Unavailable(err.to_string()));
            }
        };

        if !response.status().is_success() {
            record_call("err", start);
            return Err(OracleError::Unavailable(format!(
                "oracle returned status {}",
                response.status()
            )));
        }

        let decision = response.json::<OracleDecision>().await.map_err(|err| {
            record_call("err", start);
            OracleError::Unavailable(format!("undecodable oracle response: {err}"))
        })?;
        record_call("ok", start);
        Ok(decision)
    }
}

fn record_call(result: &'static str, start: Instant) {
    metrics::counter!("arena.infra.oracle.calls_total", "result" => result).increment(1);
    metrics::histogram!("arena.infra.oracle.call_ms", "result" => result)
        .record(start.elapsed().as_millis() as f64);
}

/// Offline stand-in: always answers hold. Lets deterministic contestants
/// run without a reasoning backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct HoldDecisionOracle;

#[async_trait]
impl DecisionOracle for HoldDecisionOracle {
    async fn infer(
        &self,
        _payload: &OraclePayload,
        _level: IntelligenceLevel,
    ) -> Result<OracleDecision, OracleError> {
        Ok(OracleDecision {
            action: "hold".to_string(),
            percentage: 0.0,
            confidence: None,
            reasoning: Some("offline oracle".to_string()),
        })
    }
}
