use crate::entities::ledger::PortfolioSnapshot;
use crate::repositories::decision_oracle::{
    DecisionOracle, IntelligenceLevel, OracleDecision, OracleError, OraclePayload, PortfolioBrief,
};
use crate::services::contestants::{Contestant, TickContext};
use crate::services::features::{horizon_summary, indicator_snapshot};
use crate::value_objects::action::{Action, ActionKind, ActionSize};
use crate::value_objects::bar::Bar;
use async_trait::async_trait;
use std::sync::Arc;

const SMA_FAST_WINDOW: usize = 12;
const SMA_SLOW_WINDOW: usize = 48;
const MOMENTUM_LOOKBACK: usize = 24;

/// Language-model-backed contestant. Builds a context payload whose
/// breadth follows the configured intelligence level and delegates the
/// decision to an external oracle. Oracle failures bubble up as errors;
/// the step loop degrades them to an implicit hold.
pub struct ModelAgentContestant {
    id: String,
    name: String,
    level: Option<IntelligenceLevel>,
    system_prompt: Option<String>,
    lookback: usize,
    oracle: Arc<dyn DecisionOracle>,
}

impl std::fmt::Debug for ModelAgentContestant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAgentContestant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("level", &self.level)
            .field("system_prompt", &self.system_prompt)
            .field("lookback", &self.lookback)
            .finish_non_exhaustive()
    }
}

impl ModelAgentContestant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        level: Option<IntelligenceLevel>,
        system_prompt: Option<String>,
        lookback: usize,
        oracle: Arc<dyn DecisionOracle>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            system_prompt,
            lookback: lookback.max(1),
            oracle,
        }
    }

    /// Legacy configs carry only `system_prompt`; those run at lite
    /// breadth with the prompt passed through verbatim.
    fn effective_level(&self) -> IntelligenceLevel {
        self.level.unwrap_or(IntelligenceLevel::Lite)
    }

    fn build_payload(
        &self,
        visible_bars: &[Bar],
        snapshot: &PortfolioSnapshot,
        ctx: &TickContext,
    ) -> OraclePayload {
        let level = self.effective_level();
        let symbol = visible_bars
            .last()
            .map(|bar| bar.symbol.clone())
            .unwrap_or_default();
        let closes: Vec<f64> = visible_bars.iter().map(|bar| bar.close).collect();
        let recent_start = closes.len().saturating_sub(self.lookback);

        let indicators = match level {
            IntelligenceLevel::Lite => None,
            IntelligenceLevel::Indicator | IntelligenceLevel::Strategy => Some(indicator_snapshot(
                &closes,
                SMA_FAST_WINDOW,
                SMA_SLOW_WINDOW,
                MOMENTUM_LOOKBACK,
            )),
        };
        let horizon = match level {
            IntelligenceLevel::Strategy => horizon_summary(visible_bars),
            _ => None,
        };

        let last_close = closes.last().copied().unwrap_or(0.0);
        OraclePayload {
            symbol: symbol.clone(),
            timestamp: ctx.tick_timestamp,
            closes: closes[recent_start..].to_vec(),
            indicators,
            horizon,
            portfolio: PortfolioBrief {
                balance: snapshot.balance,
                position_qty: snapshot.position_qty(&symbol),
                position_avg_price: snapshot.position_avg_price(&symbol),
                equity: snapshot.balance + snapshot.position_qty(&symbol) * last_close,
            },
            system_prompt: self.system_prompt.clone(),
        }
    }

    fn to_action(decision: OracleDecision) -> Action {
        let pct = decision.percentage;
        match decision.action.to_ascii_lowercase().as_str() {
            "buy" if pct > 0.0 => Action {
                kind: ActionKind::Buy,
                size: ActionSize::PctBalance(pct),
                confidence: decision.confidence,
                reasoning: decision.reasoning,
            },
            "sell" if pct > 0.0 => Action {
                kind: ActionKind::Sell,
                size: ActionSize::PctPosition(pct),
                confidence: decision.confidence,
                reasoning: decision.reasoning,
            },
            "reduce" => Action {
                kind: ActionKind::Reduce,
                size: ActionSize::PctPosition(if pct > 0.0 { pct } else { 0.5 }),
                confidence: decision.confidence,
                reasoning: decision.reasoning,
            },
            _ => Action {
                confidence: decision.confidence,
                reasoning: decision.reasoning,
                ..Action::hold()
            },
        }
    }
}

#[async_trait]
impl Contestant for ModelAgentContestant {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        visible_bars: &[Bar],
        snapshot: &PortfolioSnapshot,
        ctx: &TickContext,
    ) -> Result<Vec<Action>, OracleError> {
        if visible_bars.is_empty() {
            return Ok(Vec::new());
        }
        let payload = self.build_payload(visible_bars, snapshot, ctx);
        let decision = self.oracle.infer(&payload, self.effective_level()).await?;
        Ok(vec![Self::to_action(decision)])
    }
}
