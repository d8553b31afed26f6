pub mod contestants;
pub mod features;
pub mod market_window;
pub mod run_log;
