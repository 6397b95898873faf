//! Reconnect backoff: exponential, capped, jittered, never shrinking between
//! consecutive failures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
    /// Upper bound of the random extra, as a fraction of the nominal delay.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            multiplier: 2.0,
            max_ms: 30_000,
            jitter: 0.2,
        }
    }
}

pub struct BackoffPolicy<R: Rng = StdRng> {
    config: BackoffConfig,
    attempt: u32,
    last_ms: Option<u64>,
    rng: R,
}

impl BackoffPolicy<StdRng> {
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> BackoffPolicy<R> {
    pub fn with_rng(config: BackoffConfig, rng: R) -> Self {
        Self {
            config,
            attempt: 0,
            last_ms: None,
            rng,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        let cap = self.config.max_ms as f64;
        let exp = self.attempt.min(63) as i32;
        let nominal = (self.config.base_ms as f64 * self.config.multiplier.max(1.0).powi(exp)).min(cap);

        let spread = nominal * self.config.jitter.max(0.0);
        let extra = if spread > 0.0 { self.rng.gen_range(0.0..spread) } else { 0.0 };

        let mut ms = (nominal + extra).min(cap) as u64;
        if let Some(prev) = self.last_ms {
            ms = ms.max(prev);
        }

        self.attempt = self.attempt.saturating_add(1);
        self.last_ms = Some(ms);
        Duration::from_millis(ms)
    }

    /// Back to the base delay, after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_ms = None;
    }
}
