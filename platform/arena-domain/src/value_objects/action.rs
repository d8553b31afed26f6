use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Buy,
    Sell,
    Hold,
    Reduce,
}

/// How an emitted size is denominated. Percentages are fractions in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSize {
    Notional(f64),
    Quantity(f64),
    PctBalance(f64),
    PctPosition(f64),
}

/// One decision emitted by a contestant for one tick. Produced fresh each
/// tick; never persisted beyond the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub size: ActionSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Action {
    pub fn hold() -> Self {
        Self {
            kind: ActionKind::Hold,
            size: ActionSize::Quantity(0.0),
            confidence: None,
            reasoning: None,
        }
    }
}
