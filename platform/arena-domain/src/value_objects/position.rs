use serde::{Deserialize, Serialize};

/// An open holding. Exists while quantity > 0; the ledger removes it at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
}
