//! Reconnect delay policy.
//!
//! Two strategies:
//!
//! - **Linear** (default): `base * attempt`, capped at `max`.
//! - **Exponential**: `base * 2^(attempt-1)` capped at `max`, then
//!   "equal jitter" so that a fleet of clients dropped at the same moment
//!   does not reconnect in lockstep. The delay lands in `[ceiling/2, ceiling]`.

use std::time::Duration;

use rand::Rng;

/// How the delay grows with the attempt number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectStrategy {
    /// Delay grows by `base` per attempt.
    #[default]
    Linear,
    /// Delay doubles per attempt, with jitter.
    Exponential,
}

impl core::str::FromStr for ReconnectStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "exponential" | "exp" => Ok(Self::Exponential),
            other => Err(format!("unknown reconnect strategy: {other}")),
        }
    }
}

/// Bounded reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay growth.
    pub strategy: ReconnectStrategy,
    /// Delay unit.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Reconnect attempts allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Linear,
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let attempt = attempt.max(1);
        match self.strategy {
            ReconnectStrategy::Linear => self.base.saturating_mul(attempt).min(self.max),
            ReconnectStrategy::Exponential => {
                let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
                let ceiling = self.base.saturating_mul(factor).min(self.max);
                let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
                let floor_ms = ceiling_ms / 2;
                Duration::from_millis(rng.random_range(floor_ms..=ceiling_ms))
            }
        }
    }
}
