use crate::value_objects::side::Side;
use serde::{Deserialize, Serialize};

/// A filled trade. Append-only, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    /// Cash moved: cost + fee for buys, proceeds - fee for sells.
    pub total: f64,
}
