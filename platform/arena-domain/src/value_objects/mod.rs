pub mod action;
pub mod bar;
pub mod equity_point;
pub mod position;
pub mod side;
pub mod trade;
