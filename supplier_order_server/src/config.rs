use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use sog_common::helpers::env_flag;
use supplier_order_engine::config::EngineConfig;

const DEFAULT_SOG_HOST: &str = "127.0.0.1";
const DEFAULT_SOG_PORT: u16 = 8370;
const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address in the access log, rather
    /// than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// How often the sweep worker expires stale two-factor challenges.
    pub sweep_interval: StdDuration,
    /// Pipeline policy handed to the engine.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SOG_HOST.to_string(),
            port: DEFAULT_SOG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SOG_HOST").ok().unwrap_or_else(|| DEFAULT_SOG_HOST.into());
        let port = parse_env("SOG_PORT", DEFAULT_SOG_PORT);
        let database_url = env::var("SOG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SOG_DATABASE_URL is not set. Please set it to the URL for the SOG database.");
            String::default()
        });
        let use_x_forwarded_for = env_flag("SOG_USE_X_FORWARDED_FOR", false);
        let sweep_interval =
            StdDuration::from_secs(parse_env("SOG_SWEEP_INTERVAL_SECONDS", DEFAULT_SWEEP_INTERVAL.as_secs()).max(1));
        let engine = engine_config_from_env();
        Self { host, port, database_url, use_x_forwarded_for, sweep_interval, engine }
    }
}

fn engine_config_from_env() -> EngineConfig {
    let defaults = EngineConfig::default();
    let cutoff_warning_lead =
        Duration::minutes(parse_env("SOG_CUTOFF_WARNING_MINUTES", defaults.cutoff_warning_lead.num_minutes()));
    let price_tolerance_bps = parse_env("SOG_PRICE_TOLERANCE_BPS", defaults.price_tolerance_bps);
    let price_freshness =
        Duration::minutes(parse_env("SOG_PRICE_FRESHNESS_MINUTES", defaults.price_freshness.num_minutes()));
    let max_code_attempts = parse_env("SOG_MAX_2FA_ATTEMPTS", defaults.max_code_attempts);
    let challenge_ttl = Duration::seconds(parse_env("SOG_CHALLENGE_TTL_SECONDS", defaults.challenge_ttl.num_seconds()));
    let adapter_timeout =
        StdDuration::from_secs(parse_env("SOG_ADAPTER_TIMEOUT_SECONDS", defaults.adapter_timeout.as_secs()));
    let placement_max_attempts = parse_env("SOG_PLACEMENT_MAX_ATTEMPTS", defaults.placement_max_attempts);
    EngineConfig {
        cutoff_warning_lead,
        price_tolerance_bps,
        price_freshness,
        max_code_attempts,
        challenge_ttl,
        adapter_timeout,
        placement_max_attempts,
        ..defaults
    }
}

/// Reads and parses an environment variable. Missing values fall back to the default silently, invalid ones with a
/// warning.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        env::set_var("SOG_TEST_PORT", "not-a-port");
        assert_eq!(parse_env("SOG_TEST_PORT", 8370u16), 8370);
        env::set_var("SOG_TEST_PORT", " 9001 ");
        assert_eq!(parse_env("SOG_TEST_PORT", 8370u16), 9001);
        env::remove_var("SOG_TEST_PORT");
        assert_eq!(parse_env("SOG_TEST_PORT", 8370u16), 8370);
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.sweep_interval, StdDuration::from_secs(60));
        assert!(!config.use_x_forwarded_for);
        assert_eq!(config.engine.max_code_attempts, 3);
        assert_eq!(config.engine.placement_max_attempts, 3);
    }

    #[test]
    fn placement_attempts_come_from_the_environment() {
        env::set_var("SOG_PLACEMENT_MAX_ATTEMPTS", "5");
        assert_eq!(engine_config_from_env().placement_max_attempts, 5);
        env::remove_var("SOG_PLACEMENT_MAX_ATTEMPTS");
        assert_eq!(engine_config_from_env().placement_max_attempts, 3);
    }
}
