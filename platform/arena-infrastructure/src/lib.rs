pub mod market_data;
pub mod oracle;
pub mod reports;
