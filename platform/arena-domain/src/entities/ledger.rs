use crate::value_objects::position::Position;
use crate::value_objects::side::Side;
use crate::value_objects::trade::Trade;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

const QTY_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient balance: required {required:.8}, available {available:.8}")]
    InsufficientBalance { required: f64, available: f64 },
    #[error("insufficient position: requested {requested:.8}, held {held:.8}")]
    InsufficientPosition { requested: f64, held: f64 },
    #[error("invalid fill: {reason}")]
    InvalidFill { reason: &'static str },
}

/// How a buy is sized: cash to spend, or units to acquire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuySpend {
    Notional(f64),
    Quantity(f64),
}

/// Read-only view handed to contestants each tick.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub balance: f64,
    pub positions: Vec<Position>,
    pub total_equity: f64,
}

impl PortfolioSnapshot {
    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.positions
            .iter()
            .find(|pos| pos.symbol == symbol)
            .map(|pos| pos.quantity)
            .unwrap_or(0.0)
    }

    pub fn position_avg_price(&self, symbol: &str) -> f64 {
        self.positions
            .iter()
            .find(|pos| pos.symbol == symbol)
            .map(|pos| pos.avg_price)
            .unwrap_or(0.0)
    }
}

/// Per-contestant balance, positions, and trade history. Pure accounting:
/// no I/O, no logging. The same math backs the live (non-backtest)
/// portfolio path, so cost-basis and equity formulas stay identical.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    balance: f64,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    realized_pnl: f64,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            balance: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            realized_pnl: 0.0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position_qty(&self, symbol: &str) -> f64 {
        self.positions
            .get(symbol)
            .map(|pos| pos.quantity)
            .unwrap_or(0.0)
    }

    pub fn position_avg_price(&self, symbol: &str) -> f64 {
        self.positions
            .get(symbol)
            .map(|pos| pos.avg_price)
            .unwrap_or(0.0)
    }

    /// Fills a buy. Rejects (without mutating) any fill that would drive
    /// the balance negative.
    pub fn buy(
        &mut self,
        symbol: &str,
        timestamp: i64,
        spend: BuySpend,
        price: f64,
        fee_rate: f64,
    ) -> Result<Trade, LedgerError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidFill {
                reason: "price must be positive and finite",
            });
        }
        let quantity = match spend {
            BuySpend::Notional(notional) => notional / price,
            BuySpend::Quantity(quantity) => quantity,
        };
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidFill {
                reason: "quantity must be positive and finite",
            });
        }

        let cost = quantity * price;
        let fee = cost * fee_rate;
        let total = cost + fee;
        if total > self.balance + QTY_EPS {
            return Err(LedgerError::InsufficientBalance {
                required: total,
                available: self.balance,
            });
        }

        self.balance -= total;
        if self.balance < 0.0 {
            self.balance = 0.0;
        }

        match self.positions.get_mut(symbol) {
            Some(pos) => {
                let total_qty = pos.quantity + quantity;
                pos.avg_price = (pos.avg_price * pos.quantity + price * quantity) / total_qty;
                pos.quantity = total_qty;
                pos.current_price = price;
                pos.unrealized_pnl = (price - pos.avg_price) * total_qty;
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        quantity,
                        avg_price: price,
                        current_price: price,
                        unrealized_pnl: 0.0,
                    },
                );
            }
        }

        let trade = Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            price,
            fee,
            total,
        };
        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Fills a sell. A request for more than the held quantity is rejected,
    /// not clamped, leaving balance, positions, and history untouched.
    pub fn sell(
        &mut self,
        symbol: &str,
        timestamp: i64,
        quantity: f64,
        price: f64,
        fee_rate: f64,
    ) -> Result<Trade, LedgerError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidFill {
                reason: "price must be positive and finite",
            });
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidFill {
                reason: "quantity must be positive and finite",
            });
        }

        let held = self.position_qty(symbol);
        if quantity > held + QTY_EPS {
            return Err(LedgerError::InsufficientPosition {
                requested: quantity,
                held,
            });
        }

        let proceeds = quantity * price;
        let fee = proceeds * fee_rate;
        let total = proceeds - fee;
        self.balance += total;

        let remove = {
            let pos = self
                .positions
                .get_mut(symbol)
                .expect("held quantity implies position");
            self.realized_pnl += (price - pos.avg_price) * quantity - fee;
            pos.quantity -= quantity;
            pos.current_price = price;
            pos.unrealized_pnl = (price - pos.avg_price) * pos.quantity;
            pos.quantity <= QTY_EPS
        };
        if remove {
            self.positions.remove(symbol);
        }

        let trade = Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
            price,
            fee,
            total,
        };
        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Revalues every position at the given prices and returns total equity.
    /// Positions without a quote keep their last known price. Trade history
    /// is never touched.
    pub fn mark_to_market(&mut self, prices: &BTreeMap<String, f64>) -> f64 {
        let mut equity = self.balance;
        for pos in self.positions.values_mut() {
            if let Some(price) = prices.get(&pos.symbol) {
                pos.current_price = *price;
            }
            pos.unrealized_pnl = (pos.current_price - pos.avg_price) * pos.quantity;
            equity += pos.quantity * pos.current_price;
        }
        equity
    }

    pub fn total_equity(&self) -> f64 {
        self.balance
            + self
                .positions
                .values()
                .map(|pos| pos.quantity * pos.current_price)
                .sum::<f64>()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            balance: self.balance,
            positions: self.positions.values().cloned().collect(),
            total_equity: self.total_equity(),
        }
    }
}
