use crate::entities::ledger::PortfolioSnapshot;
use crate::repositories::decision_oracle::OracleError;
use crate::services::contestants::{Contestant, TickContext};
use crate::value_objects::action::{Action, ActionKind, ActionSize};
use crate::value_objects::bar::Bar;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccumulationSize {
    Notional(f64),
    PctBalance(f64),
}

/// Fixed-interval accumulation bot. Emits one buy every `interval_minutes`
/// of elapsed simulated time and nothing otherwise. Fully deterministic:
/// the due count is derived from the clock alone, so identical inputs
/// always yield identical output sequences.
#[derive(Debug)]
pub struct AccumulatorContestant {
    id: String,
    name: String,
    interval_minutes: u32,
    size: AccumulationSize,
}

impl AccumulatorContestant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        interval_minutes: u32,
        size: AccumulationSize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            interval_minutes,
            size,
        }
    }

    /// A buy fires on the tick where the count of completed intervals
    /// first exceeds the count at the previous tick. This keeps the
    /// cadence correct even when the step does not divide the interval.
    fn buy_due(&self, ctx: &TickContext) -> bool {
        let interval = i64::from(self.interval_minutes);
        if interval <= 0 {
            return false;
        }
        let elapsed = ctx.elapsed_minutes();
        if elapsed < interval {
            return false;
        }
        let prev_elapsed = (elapsed - i64::from(ctx.step_minutes)).max(0);
        elapsed / interval > prev_elapsed / interval
    }
}

#[async_trait]
impl Contestant for AccumulatorContestant {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(
        &self,
        visible_bars: &[Bar],
        _snapshot: &PortfolioSnapshot,
        ctx: &TickContext,
    ) -> Result<Vec<Action>, OracleError> {
        if visible_bars.is_empty() || !self.buy_due(ctx) {
            return Ok(Vec::new());
        }

        let size = match self.size {
            AccumulationSize::Notional(notional) => ActionSize::Notional(notional),
            AccumulationSize::PctBalance(pct) => ActionSize::PctBalance(pct),
        };
        Ok(vec![Action {
            kind: ActionKind::Buy,
            size,
            confidence: None,
            reasoning: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::{AccumulationSize, AccumulatorContestant};
    use crate::services::contestants::TickContext;

    fn ctx(elapsed_minutes: i64, step_minutes: u32) -> TickContext {
        TickContext {
            start_timestamp: 0,
            tick_timestamp: elapsed_minutes * 60,
            step_minutes,
        }
    }

    #[test]
    fn daily_interval_fires_once_per_day_on_hourly_steps() {
        let bot = AccumulatorContestant::new(
            "dca",
            "daily accumulator",
            1440,
            AccumulationSize::Notional(100.0),
        );

        let mut fires = 0;
        for hour in 1..=72 {
            if bot.buy_due(&ctx(hour * 60, 60)) {
                fires += 1;
            }
        }
        assert_eq!(fires, 3);
    }

    #[test]
    fn step_larger_than_interval_still_fires_once_per_tick() {
        let bot = AccumulatorContestant::new(
            "dca",
            "fast accumulator",
            30,
            AccumulationSize::Notional(10.0),
        );
        // 60-minute steps across a 30-minute interval: due on every tick.
        assert!(bot.buy_due(&ctx(60, 60)));
        assert!(bot.buy_due(&ctx(120, 60)));
    }

    #[test]
    fn nothing_fires_before_the_first_interval() {
        let bot = AccumulatorContestant::new(
            "dca",
            "daily accumulator",
            1440,
            AccumulationSize::Notional(100.0),
        );
        assert!(!bot.buy_due(&ctx(60, 60)));
        assert!(!bot.buy_due(&ctx(1380, 60)));
        assert!(bot.buy_due(&ctx(1440, 60)));
    }
}
