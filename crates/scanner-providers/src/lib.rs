pub mod binance;
pub mod bybit;
pub mod error;
pub mod provider;
pub mod venue;
