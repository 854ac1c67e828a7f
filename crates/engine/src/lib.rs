pub mod runner;
pub mod upbit;

pub use runner::{StrategyRunner, DEFAULT_POLL_INTERVAL};
pub use upbit::UpbitClient;
