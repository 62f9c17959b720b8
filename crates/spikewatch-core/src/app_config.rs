use std::path::PathBuf;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Weights applied to the five scored trend signals.
///
/// `duration_above_threshold` is computed and persisted for alert context
/// but does not contribute to the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub short_term_growth: f64,
    pub long_term_ratio: f64,
    pub ratio_to_total: f64,
    pub volatility: f64,
    pub acceleration: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            short_term_growth: 0.4,
            long_term_ratio: 0.2,
            ratio_to_total: 0.2,
            volatility: 0.1,
            acceleration: 0.1,
        }
    }
}

impl ScoreWeights {
    /// Parse weights from a comma-separated list in signal order:
    /// `short_term_growth, long_term_ratio, ratio_to_total, volatility,
    /// acceleration`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the list does not have exactly
    /// five entries, an entry is not a number, or any weight is negative.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 5 {
            return Err(ConfigError::Validation(format!(
                "score weights must have exactly 5 comma-separated values, got {}",
                parts.len()
            )));
        }

        let mut values = [0.0_f64; 5];
        for (i, part) in parts.iter().enumerate() {
            let value: f64 = part.parse().map_err(|_| {
                ConfigError::Validation(format!("score weight '{part}' is not a number"))
            })?;
            if value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "score weights must be non-negative, got {value}"
                )));
            }
            values[i] = value;
        }

        Ok(Self {
            short_term_growth: values[0],
            long_term_ratio: values[1],
            ratio_to_total: values[2],
            volatility: values[3],
            acceleration: values[4],
        })
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub wordbag_path: PathBuf,
    pub keywords_path: PathBuf,

    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub feed_base_url: String,
    pub feed_request_timeout_secs: u64,
    pub feed_user_agent: String,
    pub feed_max_retries: u32,
    pub feed_retry_backoff_base_ms: u64,

    pub window_minutes: u32,
    pub max_rounds: u32,
    pub exhausted_rounds: u32,
    pub no_growth_limit: u32,
    pub cutoff_buffer_secs: u64,
    pub round_delay_min_ms: u64,
    pub round_delay_max_ms: u64,
    pub worker_budget_secs: u64,
    pub max_concurrent_workers: usize,

    pub bucket_width_minutes: u32,
    pub score_threshold: f64,
    pub growth_threshold: f64,
    pub score_weights: ScoreWeights,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("wordbag_path", &self.wordbag_path)
            .field("keywords_path", &self.keywords_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("feed_base_url", &self.feed_base_url)
            .field("feed_request_timeout_secs", &self.feed_request_timeout_secs)
            .field("feed_user_agent", &self.feed_user_agent)
            .field("feed_max_retries", &self.feed_max_retries)
            .field(
                "feed_retry_backoff_base_ms",
                &self.feed_retry_backoff_base_ms,
            )
            .field("window_minutes", &self.window_minutes)
            .field("max_rounds", &self.max_rounds)
            .field("exhausted_rounds", &self.exhausted_rounds)
            .field("no_growth_limit", &self.no_growth_limit)
            .field("cutoff_buffer_secs", &self.cutoff_buffer_secs)
            .field("round_delay_min_ms", &self.round_delay_min_ms)
            .field("round_delay_max_ms", &self.round_delay_max_ms)
            .field("worker_budget_secs", &self.worker_budget_secs)
            .field("max_concurrent_workers", &self.max_concurrent_workers)
            .field("bucket_width_minutes", &self.bucket_width_minutes)
            .field("score_threshold", &self.score_threshold)
            .field("growth_threshold", &self.growth_threshold)
            .field("score_weights", &self.score_weights)
            .finish()
    }
}
