use chrono::{DateTime, Utc};

use common::{OrderSide, Signal};

/// Minimum seconds between two accepted signals for the same market.
/// Compiled-in constant — not user-configurable.
pub const MIN_SIGNAL_INTERVAL_SECS: i64 = 60;

/// Per-active-market trading state: current position flag and the time of the
/// last accepted signal. Owned exclusively by that market's polling task —
/// created at registration, destroyed at unregistration, never shared.
#[derive(Debug, Clone, Default)]
pub struct StrategyState {
    /// True while holding the base asset (long).
    pub position: bool,
    pub last_signal_at: Option<DateTime<Utc>>,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dedup gate: should this signal turn into an order?
    ///
    /// Rejects Hold signals and any signal arriving within
    /// `MIN_SIGNAL_INTERVAL_SECS` of the previously accepted one; otherwise
    /// records `now` and accepts. This is a cooldown, not a full state
    /// machine — a Buy following an executed Buy outside the window still
    /// passes (policy inherited from the original system).
    pub fn should_execute(&mut self, signal: &Signal, now: DateTime<Utc>) -> bool {
        if signal.kind.order_side().is_none() {
            return false;
        }
        if let Some(last) = self.last_signal_at {
            if (now - last).num_seconds() < MIN_SIGNAL_INTERVAL_SECS {
                return false;
            }
        }
        self.last_signal_at = Some(now);
        true
    }

    /// Record a confirmed fill. Called only after the broker accepted the
    /// order, never speculatively.
    pub fn apply_fill(&mut self, signal: &Signal) {
        match signal.kind.order_side() {
            Some(OrderSide::Buy) => self.position = true,
            Some(OrderSide::Sell) => self.position = false,
            None => {}
        }
    }
}
