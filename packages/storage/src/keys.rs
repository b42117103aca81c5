//! Names of the persisted key/value entries.

use field_core::RecordKind;

/// A persisted entry. Values are JSON unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Plain text.
    AuthToken,
    /// Plain text.
    UserId,
    /// Plain `"true"`, set at logout so the next login screen can confirm it.
    WasLoggedOut,
    /// Plain `"true"`/`"false"`.
    IsCheckedIn,
    /// Plain `"true"`/`"false"`.
    IsPaused,
    CheckedInSite,
    CheckedInTicket,
    /// Queued attendance events.
    OfflineData,
    /// Queued location pings.
    PendingLocations,
    CachedSites,
    CachedTickets,
}

impl Key {
    pub fn as_str(self) -> &'static str {
        match self {
            Key::AuthToken => "authToken",
            Key::UserId => "userId",
            Key::WasLoggedOut => "wasLoggedOut",
            Key::IsCheckedIn => "isCheckedIn",
            Key::IsPaused => "isPaused",
            Key::CheckedInSite => "checkedInNodo",
            Key::CheckedInTicket => "checkedInTicket",
            Key::OfflineData => "offlineData",
            Key::PendingLocations => "pendingLocations",
            Key::CachedSites => "apiData1",
            Key::CachedTickets => "apiData2",
        }
    }

    /// The entry holding the durable queue for a record kind.
    pub fn for_queue(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Attendance => Key::OfflineData,
            RecordKind::LocationPing => Key::PendingLocations,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
