//! Typed access to the persisted application state.

use field_core::{AttendanceStatus, Session, Site, Ticket};

use crate::{Key, Storage, StorageError};

/// Session, attendance flags, selection snapshots and reference-data cache.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Storage,
}

impl AppState {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.storage
            .put_text(Key::AuthToken, &session.auth_token)
            .await?;
        self.storage.put_text(Key::UserId, &session.user_id).await?;
        Ok(())
    }

    /// The persisted session, if both token and user id are present.
    pub async fn load_session(&self) -> Result<Option<Session>, StorageError> {
        let token = self.storage.get_text(Key::AuthToken).await?;
        let user_id = self.storage.get_text(Key::UserId).await?;
        Ok(match (token, user_id) {
            (Some(token), Some(user_id)) if !token.is_empty() && !user_id.is_empty() => {
                Some(Session::new(user_id, token))
            }
            _ => None,
        })
    }

    /// Forget the session and everything tied to it, leaving the logout
    /// marker behind. Queued records and the reference cache are kept.
    pub async fn clear_session(&self) -> Result<(), StorageError> {
        for key in [
            Key::AuthToken,
            Key::UserId,
            Key::IsCheckedIn,
            Key::IsPaused,
            Key::CheckedInSite,
            Key::CheckedInTicket,
        ] {
            self.storage.delete(key).await?;
        }
        self.storage.put_flag(Key::WasLoggedOut, true).await
    }

    /// Returns whether the last session ended with a logout, clearing the marker.
    pub async fn take_logout_marker(&self) -> Result<bool, StorageError> {
        let was_logged_out = self
            .storage
            .get_flag(Key::WasLoggedOut)
            .await?
            .unwrap_or(false);
        if was_logged_out {
            self.storage.delete(Key::WasLoggedOut).await?;
        }
        Ok(was_logged_out)
    }

    pub async fn load_status(&self) -> Result<AttendanceStatus, StorageError> {
        let checked_in = self
            .storage
            .get_flag(Key::IsCheckedIn)
            .await?
            .unwrap_or(false);
        let paused = self.storage.get_flag(Key::IsPaused).await?.unwrap_or(false);
        Ok(AttendanceStatus::from_flags(checked_in, paused))
    }

    pub async fn save_status(&self, status: AttendanceStatus) -> Result<(), StorageError> {
        let (checked_in, paused) = status.flags();
        self.storage.put_flag(Key::IsCheckedIn, checked_in).await?;
        self.storage.put_flag(Key::IsPaused, paused).await
    }

    pub async fn save_selection(
        &self,
        site: &Site,
        ticket: Option<&Ticket>,
    ) -> Result<(), StorageError> {
        self.storage.put_json(Key::CheckedInSite, site).await?;
        match ticket {
            Some(ticket) => self.storage.put_json(Key::CheckedInTicket, ticket).await,
            None => self.storage.delete(Key::CheckedInTicket).await,
        }
    }

    pub async fn load_selection(&self) -> Result<(Option<Site>, Option<Ticket>), StorageError> {
        let site = self.storage.get_json(Key::CheckedInSite).await?;
        let ticket = self.storage.get_json(Key::CheckedInTicket).await?;
        Ok((site, ticket))
    }

    pub async fn clear_selection(&self) -> Result<(), StorageError> {
        self.storage.delete(Key::CheckedInSite).await?;
        self.storage.delete(Key::CheckedInTicket).await
    }

    pub async fn cache_sites(&self, sites: &[Site]) -> Result<(), StorageError> {
        self.storage.put_json(Key::CachedSites, sites).await
    }

    pub async fn cached_sites(&self) -> Result<Vec<Site>, StorageError> {
        Ok(self
            .storage
            .get_json(Key::CachedSites)
            .await?
            .unwrap_or_default())
    }

    pub async fn cache_tickets(&self, tickets: &[Ticket]) -> Result<(), StorageError> {
        self.storage.put_json(Key::CachedTickets, tickets).await
    }

    pub async fn cached_tickets(&self) -> Result<Vec<Ticket>, StorageError> {
        Ok(self
            .storage
            .get_json(Key::CachedTickets)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use crate::StorageConfig;

    async fn state() -> AppState {
        AppState::new(Storage::new(StorageConfig::memory()).await.unwrap())
    }

    fn site() -> Site {
        Site {
            id: "42".into(),
            name: "Nodo Norte".into(),
            latitude: 4.7,
            longitude: -74.05,
        }
    }

    #[tokio::test]
    async fn session_round_trip_and_logout() -> Result<(), StorageError> {
        let state = state().await;
        assert_eq!(state.load_session().await?, None);

        let session = Session::new("7", "tok");
        state.save_session(&session).await?;
        state.save_status(AttendanceStatus::CheckedIn).await?;
        assert_eq!(state.load_session().await?, Some(session));

        state.clear_session().await?;
        assert_eq!(state.load_session().await?, None);
        assert_eq!(state.load_status().await?, AttendanceStatus::Out);
        assert!(state.take_logout_marker().await?);
        assert!(!state.take_logout_marker().await?);
        Ok(())
    }

    #[tokio::test]
    async fn status_uses_plain_flags() -> Result<(), StorageError> {
        let state = state().await;
        assert_eq!(state.load_status().await?, AttendanceStatus::Out);

        state.save_status(AttendanceStatus::Paused).await?;
        assert_eq!(
            state.storage().get_text(Key::IsCheckedIn).await?.as_deref(),
            Some("true")
        );
        assert_eq!(state.load_status().await?, AttendanceStatus::Paused);
        Ok(())
    }

    #[tokio::test]
    async fn selection_snapshot() -> Result<(), StorageError> {
        let state = state().await;
        let ticket = Ticket {
            id: "3".into(),
            reference: "INC-88".into(),
        };
        state.save_selection(&site(), Some(&ticket)).await?;
        assert_eq!(
            state.load_selection().await?,
            (Some(site()), Some(ticket))
        );

        state.save_selection(&site(), None).await?;
        assert_eq!(state.load_selection().await?, (Some(site()), None));

        state.clear_selection().await?;
        assert_eq!(state.load_selection().await?, (None, None));
        Ok(())
    }

    #[tokio::test]
    async fn reference_cache() -> Result<(), StorageError> {
        let state = state().await;
        assert!(state.cached_sites().await?.is_empty());
        state.cache_sites(&[site()]).await?;
        assert_eq!(state.cached_sites().await?, vec![site()]);
        Ok(())
    }
}
