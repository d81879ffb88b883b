pub mod anomaly;
pub mod baseline;
pub mod candle;
pub mod config;
pub mod error;
pub mod indicator;
pub mod interval;
pub mod series;
