//! Attendance status machine and the events it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::location::LocationFix;
use crate::session::{Site, Ticket};
use crate::wire;

/// Where the technician currently stands with respect to a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Out,
    CheckedIn,
    Paused,
}

impl AttendanceStatus {
    /// Rebuild the status from the persisted `isCheckedIn` / `isPaused` flags.
    pub fn from_flags(checked_in: bool, paused: bool) -> Self {
        match (checked_in, paused) {
            (true, true) => AttendanceStatus::Paused,
            (true, false) => AttendanceStatus::CheckedIn,
            (false, _) => AttendanceStatus::Out,
        }
    }

    /// The `(checked_in, paused)` flags persisted for this status.
    pub fn flags(self) -> (bool, bool) {
        match self {
            AttendanceStatus::Out => (false, false),
            AttendanceStatus::CheckedIn => (true, false),
            AttendanceStatus::Paused => (true, true),
        }
    }

    /// Whether periodic location reports should run in this status.
    pub fn reports_location(self) -> bool {
        matches!(self, AttendanceStatus::CheckedIn)
    }

    /// Apply an intent, returning the resulting status if the move is legal.
    ///
    /// `Paused -> Out` is deliberately absent: a paused technician must resume
    /// before checking out.
    pub fn transition(self, intent: Intent) -> Result<AttendanceStatus, ValidationError> {
        match (self, intent) {
            (AttendanceStatus::Out, Intent::CheckIn) => Ok(AttendanceStatus::CheckedIn),
            (AttendanceStatus::CheckedIn, Intent::Pause) => Ok(AttendanceStatus::Paused),
            (AttendanceStatus::Paused, Intent::Resume) => Ok(AttendanceStatus::CheckedIn),
            (AttendanceStatus::CheckedIn, Intent::CheckOut) => Ok(AttendanceStatus::Out),
            (status, intent) => Err(ValidationError::IllegalTransition { status, intent }),
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Out => write!(f, "out"),
            AttendanceStatus::CheckedIn => write!(f, "checked in"),
            AttendanceStatus::Paused => write!(f, "paused"),
        }
    }
}

/// A user-initiated request to change attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CheckIn,
    CheckOut,
    Pause,
    Resume,
}

impl Intent {
    /// The event kind recorded for this intent.
    pub fn kind(self) -> AttendanceKind {
        match self {
            Intent::CheckIn => AttendanceKind::Entrada,
            Intent::CheckOut => AttendanceKind::Salida,
            Intent::Pause => AttendanceKind::Pausa,
            Intent::Resume => AttendanceKind::Reanudar,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::CheckIn => write!(f, "check in"),
            Intent::CheckOut => write!(f, "check out"),
            Intent::Pause => write!(f, "pause"),
            Intent::Resume => write!(f, "resume"),
        }
    }
}

/// The `tipo` of an attendance event as the service names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceKind {
    Entrada,
    Salida,
    Pausa,
    Reanudar,
}

impl AttendanceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceKind::Entrada => "entrada",
            AttendanceKind::Salida => "salida",
            AttendanceKind::Pausa => "pausa",
            AttendanceKind::Reanudar => "reanudar",
        }
    }
}

impl std::fmt::Display for AttendanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable attendance record, serialized exactly as the
/// `ingreso-salidas` endpoint expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    #[serde(rename = "tipo")]
    pub kind: AttendanceKind,
    #[serde(rename = "nombre")]
    pub site_name: String,
    #[serde(default, with = "wire::empty_as_none")]
    pub ticket: Option<String>,
    #[serde(rename = "comentarios")]
    pub comment: String,
    #[serde(with = "wire::coordinate")]
    pub lat: f64,
    #[serde(rename = "log", with = "wire::coordinate")]
    pub lon: f64,
    #[serde(rename = "fecha_registro", with = "wire::timestamp")]
    pub recorded_at: DateTime<Utc>,
    #[serde(rename = "id_clientes", deserialize_with = "wire::lenient_string")]
    pub site_id: String,
    #[serde(rename = "id_usuario")]
    pub user_id: String,
}

impl AttendanceEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        intent: Intent,
        user_id: impl Into<String>,
        site: &Site,
        ticket: Option<&Ticket>,
        comment: impl Into<String>,
        fix: &LocationFix,
    ) -> Self {
        Self {
            kind: intent.kind(),
            site_name: site.name.clone(),
            ticket: ticket.map(|t| t.reference.clone()),
            comment: comment.into(),
            lat: fix.latitude,
            lon: fix.longitude,
            recorded_at: Utc::now(),
            site_id: site.id.clone(),
            user_id: user_id.into(),
        }
    }
}

/// Trimmed comment, or a validation error naming the intent.
pub fn require_comment(intent: Intent, comment: &str) -> Result<String, ValidationError> {
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingComment(intent));
    }
    Ok(trimmed.to_string())
}
