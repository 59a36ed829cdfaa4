use std::time::Duration as StdDuration;

use chrono::Duration;

/// Tunable policy for the order pipeline. The server builds this from its environment; tests usually start from
/// [`EngineConfig::default`] and override single fields.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long before a cutoff the validation engine starts warning that it is approaching.
    pub cutoff_warning_lead: Duration,
    /// The relative price change, in basis points, below which a difference is treated as noise.
    pub price_tolerance_bps: i64,
    /// Cached prices younger than this are trusted without a live check.
    pub price_freshness: Duration,
    pub max_code_attempts: i64,
    /// Challenge lifetime used when the supplier does not recommend one.
    pub challenge_ttl: Duration,
    pub min_challenge_ttl: Duration,
    pub max_challenge_ttl: Duration,
    /// Per-call timeout for live adapter round trips.
    pub adapter_timeout: StdDuration,
    /// Extra attempts for an adapter call that timed out.
    pub adapter_timeout_retries: u32,
    /// Wall clock allowance for one branch of a concurrent fan-out (one supplier session).
    pub branch_budget: StdDuration,
    /// Wall clock allowance for a whole fan-out.
    pub fan_out_budget: StdDuration,
    pub placement_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cutoff_warning_lead: Duration::hours(2),
            price_tolerance_bps: 200,
            price_freshness: Duration::minutes(60),
            max_code_attempts: 3,
            challenge_ttl: Duration::minutes(5),
            min_challenge_ttl: Duration::minutes(1),
            max_challenge_ttl: Duration::minutes(15),
            adapter_timeout: StdDuration::from_secs(30),
            adapter_timeout_retries: 2,
            branch_budget: StdDuration::from_secs(45),
            fan_out_budget: StdDuration::from_secs(120),
            placement_max_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// The lifetime for a new challenge: the supplier's recommendation clamped to the configured bounds, or the
    /// default.
    pub fn challenge_lifetime(&self, recommended: Option<Duration>) -> Duration {
        match recommended {
            Some(d) => d.clamp(self.min_challenge_ttl, self.max_challenge_ttl),
            None => self.challenge_ttl,
        }
    }

    pub fn call_policy(&self) -> crate::adapters::CallPolicy {
        crate::adapters::CallPolicy { timeout: self.adapter_timeout, timeout_retries: self.adapter_timeout_retries }
    }
}
