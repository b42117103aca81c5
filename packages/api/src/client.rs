//! reqwest-backed client.

use field_core::{AttendanceEvent, PendingLocationPing, RecordBody, Session, Site, Ticket, wire};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::{ATTENDANCE_PATH, ApiConfig, LOCATION_PATH, LOGIN_PATH};
use crate::{ApiError, TransportError};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    user: Option<LoginUser>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    #[serde(deserialize_with = "wire::lenient_string")]
    id: String,
}

/// Client for the remote attendance service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Exchange credentials for a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let url = self.config.url(LOGIN_PATH);
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(TransportError::from)?;

        if status.is_server_error() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }
        if !status.is_success() {
            // Rejections may come back as HTML; the message is best effort.
            let message = serde_json::from_str::<LoginResponse>(&text)
                .ok()
                .and_then(|r| r.message)
                .filter(|m| !m.trim().is_empty());
            return Err(ApiError::Rejected(
                message.unwrap_or_else(|| "invalid credentials".to_string()),
            ));
        }

        let parsed: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("login response: {e}")))?;

        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TransportError::Decode("login response carried no token".into()))?;
        let user_id = parsed.user.map(|u| u.id).ok_or(ApiError::MissingUserId)?;

        tracing::info!("Logged in as user {}", user_id);
        Ok(Session::new(user_id, token))
    }

    /// Work sites available to the technician.
    pub async fn fetch_sites(&self, session: &Session) -> Result<Vec<Site>, TransportError> {
        self.get_list(&self.config.sites_path, session).await
    }

    /// Tickets available to the technician.
    pub async fn fetch_tickets(&self, session: &Session) -> Result<Vec<Ticket>, TransportError> {
        self.get_list(&self.config.tickets_path, session).await
    }

    pub async fn post_attendance(&self, event: &AttendanceEvent) -> Result<(), TransportError> {
        self.post_json(ATTENDANCE_PATH, event).await
    }

    pub async fn post_location(&self, ping: &PendingLocationPing) -> Result<(), TransportError> {
        self.post_json(LOCATION_PATH, ping).await
    }

    /// Deliver a record to the endpoint matching its kind.
    pub async fn post_record(&self, body: &RecordBody) -> Result<(), TransportError> {
        match body {
            RecordBody::Attendance(event) => self.post_attendance(event).await,
            RecordBody::LocationPing(ping) => self.post_location(ping).await,
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
    ) -> Result<Vec<T>, TransportError> {
        let url = self.config.url(path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&session.auth_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let items: Vec<T> = serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("{path}: expected an array: {e}")))?;
        tracing::debug!("Fetched {} items from {}", items.len(), path);
        Ok(items)
    }

    /// POST a JSON body. Any 2xx is a delivery; the body is only logged.
    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        let url = self.config.url(path);
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => tracing::debug!("POST {} -> {}: {}", path, status, value),
            Err(_) => tracing::debug!("POST {} -> {} (non-JSON body: {:?})", path, status, text),
        }
        Ok(())
    }
}
