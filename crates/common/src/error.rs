use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad strategy configuration. Surfaced synchronously at registration,
    /// never defaulted for required fields.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Not enough candle history to evaluate. Per-tick, non-fatal.
    #[error("Insufficient data: need {required} candles, got {got}")]
    InsufficientData { required: usize, got: usize },

    /// Zero-variance input to the allocator or a z-score computation.
    #[error("Degenerate volatility for {0}")]
    DegenerateVolatility(String),

    /// Market data transport failure (network or upstream 5xx).
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    /// Order/balance call rejected by the broker, with the upstream status.
    #[error("Broker error (HTTP {status}): {message}")]
    Broker { status: u16, message: String },

    /// Duplicate registration for a market that is already running.
    #[error("Trading already active for {0}")]
    AlreadyActive(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
