//! Runtime tuning for the capture core.
//!
//! Read from the environment with fallbacks, the same way the OCR mode
//! and provider overrides are read elsewhere in the app shell.

use crate::selection::MIN_SELECTION_SIZE;
use std::time::Duration;

/// Fixed wait after a programmatic scroll before capturing a tile.
/// 500ms keeps sequential tiles under the host's two-captures-per-second quota.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

pub const SETTLE_DELAY_ENV: &str = "PAGESNAP_SETTLE_DELAY_MS";
pub const MIN_SELECTION_ENV: &str = "PAGESNAP_MIN_SELECTION";

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub settle_delay: Duration,
    pub min_selection_size: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            min_selection_size: MIN_SELECTION_SIZE,
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(SETTLE_DELAY_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.settle_delay = Duration::from_millis(ms),
                Err(_) => log::warn!("[CONFIG] Invalid {}={}, keeping default", SETTLE_DELAY_ENV, raw),
            }
        }

        if let Some(raw) = lookup(MIN_SELECTION_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 1.0 => config.min_selection_size = v,
                _ => log::warn!("[CONFIG] Invalid {}={}, keeping default", MIN_SELECTION_ENV, raw),
            }
        }

        config
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}
