//! Remote service endpoints.

use std::time::Duration;

/// Default service host.
pub const DEFAULT_BASE_URL: &str = "https://asistenciaoperacional.grupoans.com.co";

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ATTENDANCE_PATH: &str = "/api/ingreso-salidas";
pub const LOCATION_PATH: &str = "/api/ubicacion-usuario";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid api config: {0}")]
    Invalid(String),
}

/// Where and how to reach the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Reference-data endpoints differ between deployments.
    pub sites_path: String,
    pub tickets_path: String,
    /// `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sites_path: "/api/clientesnodosoficinas_asistenciaoperacional".to_string(),
            tickets_path: "/api/consultaticketsmasioptics_asistenciaoperacional".to_string(),
            request_timeout: None,
        }
    }
}

impl ApiConfig {
    /// Config pointing every endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FIELDSYNC_API_URL` (default: the production host)
    /// - `FIELDSYNC_SITES_PATH`, `FIELDSYNC_TICKETS_PATH` (optional)
    /// - `FIELDSYNC_REQUEST_TIMEOUT_SECS` (optional, no timeout when unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(url) = env_non_empty("FIELDSYNC_API_URL") {
            cfg.base_url = url;
        }
        if let Some(path) = env_non_empty("FIELDSYNC_SITES_PATH") {
            cfg.sites_path = path;
        }
        if let Some(path) = env_non_empty("FIELDSYNC_TICKETS_PATH") {
            cfg.tickets_path = path;
        }
        if let Some(raw) = env_non_empty("FIELDSYNC_REQUEST_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "FIELDSYNC_REQUEST_TIMEOUT_SECS={raw} (expected whole seconds)"
                ))
            })?;
            cfg.request_timeout = Some(Duration::from_secs(secs));
        }
        Ok(cfg)
    }

    /// Absolute URL for a path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
