//! Authenticated session and reference data served by the remote service.

use serde::{Deserialize, Serialize};

use crate::wire;

/// The logged-in technician.
///
/// Created at login, owned by the runtime for its whole lifetime and
/// destroyed on logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub auth_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            auth_token: auth_token.into(),
        }
    }
}

/// A work location a technician can check into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(deserialize_with = "wire::lenient_string")]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "latitud", with = "wire::coordinate")]
    pub latitude: f64,
    #[serde(rename = "longitud", with = "wire::coordinate")]
    pub longitude: f64,
}

/// A work-order reference selectable alongside a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "idCuadro", deserialize_with = "wire::lenient_string")]
    pub id: String,
    #[serde(rename = "ticket")]
    pub reference: String,
}
