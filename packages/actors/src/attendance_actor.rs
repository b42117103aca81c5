//! Attendance actor: the technician's status machine.
//!
//! Owns the current status, the site/ticket selection, the latest location fix
//! and the periodic location report timer. Every intent is validated here, turned
//! into an [`AttendanceEvent`] and handed to the dispatch engine; the new status
//! is committed only once the event was delivered or safely queued.

use std::time::Duration;

use chrono::Utc;
use field_core::{
    AttendanceEvent, AttendanceStatus, Intent, LocationFix, PendingLocationPing, QueuedRecord,
    Session, Site, SyncEvent, Ticket, ValidationError, require_comment,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use storage::AppState;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::AttendanceError;
use crate::dispatch::Dispatcher;
use crate::messages::{AttendanceMessage, AttendanceSnapshot, IntentOutcome};

pub struct AttendanceActorArgs {
    pub session: Session,
    pub app_state: AppState,
    pub dispatcher: Dispatcher,
    pub event_tx: broadcast::Sender<SyncEvent>,
    pub report_interval: Duration,
    pub max_check_in_radius_m: f64,
}

pub struct AttendanceActorState {
    session: Session,
    status: AttendanceStatus,
    site: Option<Site>,
    ticket: Option<Ticket>,
    fix: Option<LocationFix>,
    app_state: AppState,
    dispatcher: Dispatcher,
    event_tx: broadcast::Sender<SyncEvent>,
    report_interval: Duration,
    max_check_in_radius_m: f64,
    report_timer: Option<JoinHandle<()>>,
}

impl AttendanceActorState {
    fn snapshot(&self) -> AttendanceSnapshot {
        AttendanceSnapshot {
            status: self.status,
            site: self.site.clone(),
            ticket: self.ticket.clone(),
            fix: self.fix.clone(),
            reporting: self.report_timer.is_some(),
        }
    }

    fn start_reporting(&mut self, myself: &ActorRef<AttendanceMessage>) {
        self.stop_reporting();
        let myself = myself.clone();
        let period = self.report_interval;
        self.report_timer = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if myself.send_message(AttendanceMessage::ReportLocation).is_err() {
                    break;
                }
            }
        }));
        tracing::debug!("Location reporting every {:?}", period);
    }

    fn stop_reporting(&mut self) {
        if let Some(timer) = self.report_timer.take() {
            timer.abort();
            tracing::debug!("Location reporting stopped");
        }
    }

    fn selected_site_id(&self) -> Option<String> {
        self.site.as_ref().map(|s| s.id.clone())
    }

    fn ensure_unlocked(&self) -> Result<(), ValidationError> {
        if self.status != AttendanceStatus::Out {
            return Err(ValidationError::SelectionLocked(self.status));
        }
        Ok(())
    }

    /// Validate, dispatch, then commit.
    async fn apply_intent(
        &mut self,
        myself: &ActorRef<AttendanceMessage>,
        intent: Intent,
        comment: &str,
    ) -> Result<IntentOutcome, AttendanceError> {
        let new_status = self.status.transition(intent)?;
        let comment = require_comment(intent, comment)?;
        let site = self.site.clone().ok_or(ValidationError::MissingSite)?;
        let fix = self.fix.clone().ok_or(ValidationError::MissingLocation)?;

        if intent == Intent::CheckIn {
            let distance_m = fix.distance_to(site.latitude, site.longitude);
            if distance_m.is_nan() || distance_m > self.max_check_in_radius_m {
                return Err(ValidationError::OutOfRange {
                    distance_m,
                    max_m: self.max_check_in_radius_m,
                }
                .into());
            }
        }

        let event = AttendanceEvent::new(
            intent,
            self.session.user_id.clone(),
            &site,
            self.ticket.as_ref(),
            comment,
            &fix,
        );
        let dispatch = self
            .dispatcher
            .dispatch(QueuedRecord::new(event.clone()))
            .await?;

        let old_status = self.status;
        self.status = new_status;
        let persisted = self.persist_commit(intent).await;

        if intent == Intent::CheckOut {
            self.site = None;
            self.ticket = None;
            self.fix = self.fix.take().map(|f| f.with_client_id(None));
        }

        let _ = self.event_tx.send(SyncEvent::StatusChanged {
            old_status,
            new_status,
            timestamp: Utc::now(),
        });
        tracing::info!("Attendance {} -> {} ({})", old_status, new_status, intent);

        if new_status.reports_location() {
            self.start_reporting(myself);
        } else {
            self.stop_reporting();
        }

        // A queued event already carries its coordinates.
        if dispatch.is_delivered() {
            let ping =
                PendingLocationPing::new(self.session.user_id.clone(), site.id.clone(), &fix)
                    .with_extra("tipo", event.kind.as_str());
            if let Err(e) = self.dispatcher.dispatch(QueuedRecord::new(ping)).await {
                tracing::warn!("Location ping after {} was lost: {}", intent, e);
            }
        }

        Ok(IntentOutcome {
            status: new_status,
            event,
            dispatch,
            persisted,
        })
    }

    // The event is already out or queued, so the transition stands even if
    // the flags cannot be written. Returns false when anything was not saved.
    async fn persist_commit(&self, intent: Intent) -> bool {
        let mut persisted = true;
        if let Err(e) = self.app_state.save_status(self.status).await {
            tracing::error!("Failed to persist attendance status {}: {}", self.status, e);
            persisted = false;
        }
        let selection = match (intent, &self.site) {
            (Intent::CheckIn, Some(site)) => {
                self.app_state
                    .save_selection(site, self.ticket.as_ref())
                    .await
            }
            (Intent::CheckOut, _) => self.app_state.clear_selection().await,
            _ => Ok(()),
        };
        if let Err(e) = selection {
            tracing::error!("Failed to persist site selection: {}", e);
            persisted = false;
        }
        persisted
    }

    async fn report_location(&self) {
        if !self.status.reports_location() {
            return;
        }
        let (Some(fix), Some(site_id)) = (self.fix.as_ref(), self.selected_site_id()) else {
            tracing::debug!("No fix or site yet, skipping location report");
            return;
        };

        let ping = PendingLocationPing::new(self.session.user_id.clone(), site_id, fix);
        if let Err(e) = self.dispatcher.dispatch(QueuedRecord::new(ping)).await {
            tracing::warn!("Periodic location report was lost: {}", e);
        }
    }

    async fn logout(&mut self) -> Result<(), AttendanceError> {
        if self.status != AttendanceStatus::Out {
            return Err(ValidationError::LogoutWhileActive(self.status).into());
        }
        self.stop_reporting();
        self.app_state.clear_session().await?;
        self.site = None;
        self.ticket = None;
        tracing::info!("User {} logged out", self.session.user_id);
        Ok(())
    }
}

pub struct AttendanceActor;

impl Actor for AttendanceActor {
    type Msg = AttendanceMessage;
    type State = AttendanceActorState;
    type Arguments = AttendanceActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let status = args.app_state.load_status().await?;
        let (site, ticket) = if status == AttendanceStatus::Out {
            (None, None)
        } else {
            args.app_state.load_selection().await?
        };
        tracing::info!(
            "Starting attendance actor for user {} ({})",
            args.session.user_id,
            status
        );

        let mut state = AttendanceActorState {
            session: args.session,
            status,
            site,
            ticket,
            fix: None,
            app_state: args.app_state,
            dispatcher: args.dispatcher,
            event_tx: args.event_tx,
            report_interval: args.report_interval,
            max_check_in_radius_m: args.max_check_in_radius_m,
            report_timer: None,
        };
        if status.reports_location() {
            state.start_reporting(&myself);
        }
        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.stop_reporting();
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            AttendanceMessage::Intent {
                intent,
                comment,
                reply,
            } => {
                let result = state.apply_intent(&myself, intent, &comment).await;
                if let Err(ref e) = result {
                    tracing::info!("{} refused: {}", intent, e);
                }
                let _ = reply.send(result);
            }

            AttendanceMessage::SelectSite { site, reply } => {
                let result = state.ensure_unlocked().map_err(AttendanceError::from);
                if result.is_ok() {
                    state.site = site;
                    let site_id = state.selected_site_id();
                    state.fix = state.fix.take().map(|f| f.with_client_id(site_id));
                }
                let _ = reply.send(result);
            }

            AttendanceMessage::SelectTicket { ticket, reply } => {
                let result = state.ensure_unlocked().map_err(AttendanceError::from);
                if result.is_ok() {
                    state.ticket = ticket;
                }
                let _ = reply.send(result);
            }

            AttendanceMessage::LocationUpdate(fix) => {
                if fix.is_finite() {
                    state.fix = Some(fix.with_client_id(state.selected_site_id()));
                } else {
                    tracing::warn!(
                        "Ignoring location fix with non-finite coordinates ({}, {})",
                        fix.latitude,
                        fix.longitude
                    );
                }
            }

            AttendanceMessage::ReportLocation => {
                state.report_location().await;
            }

            AttendanceMessage::GetSnapshot { reply } => {
                let _ = reply.send(state.snapshot());
            }

            AttendanceMessage::Logout { reply } => {
                let _ = reply.send(state.logout().await);
            }
        }

        Ok(())
    }
}
