//! Timer and validation settings for the runtime.

use std::time::Duration;

use field_core::MAX_CHECK_IN_RADIUS_M;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Period of the location report while checked in.
    pub report_interval: Duration,
    /// Period of the housekeeping sync tick.
    pub sync_interval: Duration,
    /// Maximum distance from the selected site at check-in, in meters.
    pub max_check_in_radius_m: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(3600),
            sync_interval: Duration::from_secs(60),
            max_check_in_radius_m: MAX_CHECK_IN_RADIUS_M,
        }
    }
}

impl RuntimeConfig {
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_max_check_in_radius(mut self, meters: f64) -> Self {
        self.max_check_in_radius_m = meters;
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FIELDSYNC_REPORT_INTERVAL_SECS` (default: 3600)
    /// - `FIELDSYNC_SYNC_INTERVAL_SECS` (default: 60)
    /// - `FIELDSYNC_MAX_RADIUS_M` (default: 20000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(secs) = env_parse::<u64>("FIELDSYNC_REPORT_INTERVAL_SECS")? {
            cfg.report_interval = positive_secs("FIELDSYNC_REPORT_INTERVAL_SECS", secs)?;
        }
        if let Some(secs) = env_parse::<u64>("FIELDSYNC_SYNC_INTERVAL_SECS")? {
            cfg.sync_interval = positive_secs("FIELDSYNC_SYNC_INTERVAL_SECS", secs)?;
        }
        if let Some(meters) = env_parse::<f64>("FIELDSYNC_MAX_RADIUS_M")? {
            if !meters.is_finite() || meters <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "FIELDSYNC_MAX_RADIUS_M={meters} (expected a positive distance)"
                )));
            }
            cfg.max_check_in_radius_m = meters;
        }
        Ok(cfg)
    }
}

// tokio intervals panic on a zero period.
fn positive_secs(name: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid(format!("{name}=0 (expected at least 1)")));
    }
    Ok(Duration::from_secs(secs))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid(format!("{name}={raw}")))
}
