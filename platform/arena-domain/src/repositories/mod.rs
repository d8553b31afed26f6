pub mod artifacts;
pub mod decision_oracle;
pub mod market_window;
