pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use ports::{BrokerPort, MarketDataPort};
pub use types::*;
