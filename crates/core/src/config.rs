//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::error::{BillingError, BillingResult};
use std::time::Duration;

/// Default SQLite database URL when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://convia.db";

/// Default cadence for the expiry/activation sweeps (daily).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_url: String,
    sweep_interval: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(database_url: String, sweep_interval: Duration) -> BillingResult<Self> {
        if database_url.trim().is_empty() {
            return Err(BillingError::InvalidInput(
                "database_url cannot be empty".into(),
            ));
        }
        if sweep_interval.is_zero() {
            return Err(BillingError::InvalidInput(
                "sweep_interval cannot be zero".into(),
            ));
        }

        Ok(Self {
            database_url,
            sweep_interval,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

/// Resolve the sweep interval from an environment value without reading the
/// environment here. `None` falls back to the daily default.
pub fn sweep_interval_from_env_value(value: Option<String>) -> BillingResult<Duration> {
    match value {
        None => Ok(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
        Some(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                BillingError::InvalidInput(format!("CONVIA_SWEEP_INTERVAL_SECS is not a number: {raw}"))
            })?;
            if secs == 0 {
                return Err(BillingError::InvalidInput(
                    "CONVIA_SWEEP_INTERVAL_SECS cannot be zero".into(),
                ));
            }
            Ok(Duration::from_secs(secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_defaults_to_daily() {
        let interval = sweep_interval_from_env_value(None).unwrap();
        assert_eq!(interval, Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
    }

    #[test]
    fn sweep_interval_rejects_zero_and_garbage() {
        assert!(sweep_interval_from_env_value(Some("0".into())).is_err());
        assert!(sweep_interval_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn config_rejects_empty_database_url() {
        assert!(CoreConfig::new(" ".into(), Duration::from_secs(60)).is_err());
    }
}
