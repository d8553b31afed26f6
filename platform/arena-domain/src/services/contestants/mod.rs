use crate::entities::ledger::PortfolioSnapshot;
use crate::repositories::decision_oracle::OracleError;
use crate::value_objects::action::Action;
use crate::value_objects::bar::Bar;
use async_trait::async_trait;

mod accumulator;
mod model_agent;

pub use accumulator::{AccumulationSize, AccumulatorContestant};
pub use model_agent::ModelAgentContestant;

/// Simulation-clock context for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub start_timestamp: i64,
    pub tick_timestamp: i64,
    pub step_minutes: u32,
}

impl TickContext {
    pub fn elapsed_minutes(&self) -> i64 {
        (self.tick_timestamp - self.start_timestamp) / 60
    }
}

/// One configured strategy instance in a run. `decide` must not mutate
/// its inputs; it is async because the model agent awaits an external
/// oracle. Errors are the caller's to degrade (implicit hold).
#[async_trait]
pub trait Contestant: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn decide(
        &self,
        visible_bars: &[Bar],
        snapshot: &PortfolioSnapshot,
        ctx: &TickContext,
    ) -> Result<Vec<Action>, OracleError>;
}

/// Closed set of strategy kinds, resolved once at config-parse time.
#[derive(Debug)]
pub enum ContestantKind {
    Accumulator(AccumulatorContestant),
    ModelAgent(ModelAgentContestant),
}

#[async_trait]
impl Contestant for ContestantKind {
    fn id(&self) -> &str {
        match self {
            ContestantKind::Accumulator(contestant) => contestant.id(),
            ContestantKind::ModelAgent(contestant) => contestant.id(),
        }
    }

    fn name(&self) -> &str {
        match self {
            ContestantKind::Accumulator(contestant) => contestant.name(),
            ContestantKind::ModelAgent(contestant) => contestant.name(),
        }
    }

    async fn decide(
        &self,
        visible_bars: &[Bar],
        snapshot: &PortfolioSnapshot,
        ctx: &TickContext,
    ) -> Result<Vec<Action>, OracleError> {
        match self {
            ContestantKind::Accumulator(contestant) => {
                contestant.decide(visible_bars, snapshot, ctx).await
            }
            ContestantKind::ModelAgent(contestant) => {
                contestant.decide(visible_bars, snapshot, ctx).await
            }
        }
    }
}
