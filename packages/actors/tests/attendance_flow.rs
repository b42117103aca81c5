#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use actors::{AttendanceError, DispatchOutcome, FieldRuntime, QueueReason, RuntimeError};
use field_core::{
    AttendanceKind, AttendanceStatus, Intent, LocationFix, RecordBody, RecordKind, SyncCounters,
    Ticket, ValidationError,
};
use storage::Key;

use common::{
    ScriptedTransport, far_fix, fs_state, go_online, memory_state, near_fix, quiet_config,
    ready_at_site, session, site, start,
};

fn validation(result: Result<impl std::fmt::Debug, AttendanceError>) -> ValidationError {
    match result {
        Err(AttendanceError::Validation(e)) => e,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

fn attendance_bodies(transport: &ScriptedTransport) -> Vec<field_core::AttendanceEvent> {
    transport
        .delivered()
        .into_iter()
        .filter_map(|body| match body {
            RecordBody::Attendance(event) => Some(event),
            RecordBody::LocationPing(_) => None,
        })
        .collect()
}

fn ping_count(transport: &ScriptedTransport) -> usize {
    transport
        .delivered()
        .iter()
        .filter(|b| matches!(b, RecordBody::LocationPing(_)))
        .count()
}

#[tokio::test]
async fn blank_comments_never_reach_the_transport() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;

    for comment in ["", "   ", "\n\t"] {
        assert_eq!(
            validation(runtime.check_in(comment).await),
            ValidationError::MissingComment(Intent::CheckIn)
        );
    }
    assert_eq!(transport.attempts(), 0);

    runtime.check_in("llegada").await?;
    let after_check_in = transport.attempts();

    assert_eq!(
        validation(runtime.pause(" ").await),
        ValidationError::MissingComment(Intent::Pause)
    );
    assert_eq!(
        validation(runtime.check_out("").await),
        ValidationError::MissingComment(Intent::CheckOut)
    );
    assert_eq!(transport.attempts(), after_check_in);

    runtime.pause("almuerzo").await?;
    let after_pause = transport.attempts();
    assert_eq!(
        validation(runtime.resume("").await),
        ValidationError::MissingComment(Intent::Resume)
    );
    assert_eq!(transport.attempts(), after_pause);
    assert_eq!(runtime.snapshot().await?.status, AttendanceStatus::Paused);
    assert_eq!(runtime.counters().await?.unsynced, 0);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn check_in_outside_radius_is_rejected() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    go_online(&runtime).await;

    runtime.select_site(Some(site())).await?;
    runtime.update_location(far_fix())?;
    match validation(runtime.check_in("llegada").await) {
        ValidationError::OutOfRange { distance_m, max_m } => {
            assert!(distance_m > 200_000.0, "distance was {distance_m}");
            assert_eq!(max_m, 20_000.0);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(transport.attempts(), 0);
    assert_eq!(runtime.snapshot().await?.status, AttendanceStatus::Out);

    runtime.update_location(near_fix())?;
    runtime.check_in("llegada").await?;

    // Leaving from far away is allowed.
    runtime.update_location(far_fix())?;
    let outcome = runtime.check_out("salida").await?;
    assert_eq!(outcome.status, AttendanceStatus::Out);
    assert!(outcome.dispatch.is_delivered());

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn configured_radius_applies() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = FieldRuntime::start(
        quiet_config().with_max_check_in_radius(500.0),
        memory_state().await,
        session(),
        transport.as_transport(),
    )
    .await?;
    ready_at_site(&runtime).await;

    // near_fix is about 1 km away.
    assert!(matches!(
        validation(runtime.check_in("llegada").await),
        ValidationError::OutOfRange { max_m, .. } if max_m == 500.0
    ));

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn paused_check_out_is_rejected_without_dispatch() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;

    runtime.check_in("llegada").await?;
    runtime.pause("almuerzo").await?;
    let attempts = transport.attempts();

    assert_eq!(
        validation(runtime.check_out("salida").await),
        ValidationError::IllegalTransition {
            status: AttendanceStatus::Paused,
            intent: Intent::CheckOut,
        }
    );
    assert_eq!(transport.attempts(), attempts);
    assert_eq!(runtime.snapshot().await?.status, AttendanceStatus::Paused);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_site_or_fix_is_rejected() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;

    assert_eq!(
        validation(runtime.check_in("llegada").await),
        ValidationError::MissingSite
    );
    runtime.select_site(Some(site())).await?;
    assert_eq!(
        validation(runtime.check_in("llegada").await),
        ValidationError::MissingLocation
    );
    assert_eq!(runtime.counters().await?, SyncCounters::default());

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn offline_check_in_is_queued_and_committed() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    ready_at_site(&runtime).await;

    let outcome = runtime.check_in("llegada").await?;
    assert!(matches!(
        outcome.dispatch,
        DispatchOutcome::Queued {
            reason: QueueReason::Offline
        }
    ));
    assert_eq!(outcome.status, AttendanceStatus::CheckedIn);
    assert!(outcome.persisted);

    let counters = runtime.counters().await?;
    assert_eq!(counters, SyncCounters { synced: 0, unsynced: 1 });
    assert_eq!(transport.attempts(), 0);

    let pending = runtime.pending(RecordKind::Attendance).await?;
    assert_eq!(pending.len(), 1);
    match &pending[0].body {
        RecordBody::Attendance(event) => {
            assert_eq!(event.kind, AttendanceKind::Entrada);
            assert_eq!(event.comment, "llegada");
        }
        other => panic!("unexpected record {other:?}"),
    }

    let snapshot = runtime.snapshot().await?;
    assert_eq!(snapshot.status, AttendanceStatus::CheckedIn);
    assert!(snapshot.reporting);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn transport_failure_degrades_to_queued() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;
    transport.set_failing(true);

    let outcome = runtime.check_in("llegada").await?;
    assert!(matches!(
        outcome.dispatch,
        DispatchOutcome::Queued {
            reason: QueueReason::Transport(_)
        }
    ));
    assert_eq!(outcome.status, AttendanceStatus::CheckedIn);
    assert_eq!(transport.attempts(), 1);
    assert_eq!(runtime.counters().await?.unsynced, 1);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn ticket_selection_travels_with_the_event() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;
    runtime
        .select_ticket(Some(Ticket {
            id: "9".into(),
            reference: "TCK-0009".into(),
        }))
        .await?;

    runtime.check_in("llegada").await?;
    runtime.check_out("salida").await?;

    let events = attendance_bodies(&transport);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, AttendanceKind::Entrada);
    assert_eq!(events[0].ticket.as_deref(), Some("TCK-0009"));
    assert_eq!(events[0].site_id, "42");
    assert_eq!(events[0].user_id, "7");
    assert_eq!(events[1].kind, AttendanceKind::Salida);

    // Each delivered transition is followed by a ping tagged with its kind.
    let pings: Vec<_> = transport
        .delivered()
        .into_iter()
        .filter_map(|body| match body {
            RecordBody::LocationPing(ping) => Some(ping),
            RecordBody::Attendance(_) => None,
        })
        .collect();
    assert_eq!(pings.len(), 2);
    assert_eq!(pings[0].extra.get("tipo"), Some(&serde_json::json!("entrada")));

    // Check-out clears the selection.
    let snapshot = runtime.snapshot().await?;
    assert_eq!(snapshot.site, None);
    assert_eq!(snapshot.ticket, None);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn selection_is_locked_and_restored_while_checked_in() -> Result<(), Box<dyn Error>> {
    let app_state = memory_state().await;
    let transport = ScriptedTransport::new();
    let runtime = start(app_state.clone(), &transport).await;
    ready_at_site(&runtime).await;
    runtime.check_in("llegada").await?;

    assert_eq!(
        validation(runtime.select_site(None).await),
        ValidationError::SelectionLocked(AttendanceStatus::CheckedIn)
    );
    runtime.shutdown().await;

    let runtime = start(app_state.clone(), &transport).await;
    let snapshot = runtime.snapshot().await?;
    assert_eq!(snapshot.status, AttendanceStatus::CheckedIn);
    assert_eq!(snapshot.site, Some(site()));
    assert!(snapshot.reporting);

    runtime.update_location(near_fix())?;
    runtime.check_out("salida").await?;
    assert_eq!(app_state.load_status().await?, AttendanceStatus::Out);
    assert_eq!(app_state.load_selection().await?, (None, None));
    assert!(!runtime.snapshot().await?.reporting);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn logout_is_refused_until_checked_out() -> Result<(), Box<dyn Error>> {
    let app_state = memory_state().await;
    app_state.save_session(&session()).await?;
    let transport = ScriptedTransport::new();
    let runtime = start(app_state.clone(), &transport).await;
    ready_at_site(&runtime).await;
    runtime.check_in("llegada").await?;

    let runtime = match runtime.logout().await {
        Err((runtime, AttendanceError::Validation(e))) => {
            assert_eq!(e, ValidationError::LogoutWhileActive(AttendanceStatus::CheckedIn));
            runtime
        }
        Err((_, e)) => panic!("unexpected error {e}"),
        Ok(()) => panic!("logout should be refused while checked in"),
    };
    assert!(app_state.load_session().await?.is_some());

    runtime.check_out("salida").await?;
    assert!(runtime.logout().await.is_ok());

    assert_eq!(app_state.load_session().await?, None);
    assert!(app_state.take_logout_marker().await?);
    Ok(())
}

#[tokio::test]
async fn location_is_reported_only_while_checked_in() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = FieldRuntime::start(
        quiet_config().with_report_interval(Duration::from_millis(40)),
        memory_state().await,
        session(),
        transport.as_transport(),
    )
    .await?;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;

    let t = &transport;

    runtime.check_in("llegada").await?;
    common::eventually(|| async move { ping_count(t) >= 3 }).await;

    runtime.pause("almuerzo").await?;
    let paused_at = ping_count(t);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ping_count(t), paused_at);
    assert!(!runtime.snapshot().await?.reporting);

    runtime.resume("de vuelta").await?;
    common::eventually(|| async move { ping_count(t) >= paused_at + 2 }).await;

    runtime.shutdown().await;
    Ok(())
}

/// Swap the storage root for a plain file so every later write fails.
fn break_storage(root: &std::path::Path) -> std::io::Result<()> {
    std::fs::remove_dir_all(root)?;
    std::fs::write(root, b"")
}

#[tokio::test]
async fn check_in_that_cannot_be_queued_changes_nothing() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let transport = ScriptedTransport::new();
    let runtime = start(fs_state(dir.path()).await, &transport).await;
    ready_at_site(&runtime).await;
    break_storage(dir.path())?;

    let result = runtime.check_in("llegada").await;
    assert!(
        matches!(result, Err(AttendanceError::Persistence(_))),
        "got {result:?}"
    );

    let snapshot = runtime.snapshot().await?;
    assert_eq!(snapshot.status, AttendanceStatus::Out);
    assert!(!snapshot.reporting);
    assert_eq!(runtime.counters().await?, SyncCounters::default());
    assert_eq!(transport.attempts(), 0);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unsaved_status_is_flagged_on_the_outcome() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let transport = ScriptedTransport::new();
    let runtime = start(fs_state(dir.path()).await, &transport).await;
    go_online(&runtime).await;
    ready_at_site(&runtime).await;
    break_storage(dir.path())?;

    let outcome = runtime.check_in("llegada").await?;
    assert!(outcome.dispatch.is_delivered());
    assert_eq!(outcome.status, AttendanceStatus::CheckedIn);
    assert!(!outcome.persisted);
    assert_eq!(runtime.snapshot().await?.status, AttendanceStatus::CheckedIn);

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn non_finite_fixes_are_ignored() -> Result<(), Box<dyn Error>> {
    let transport = ScriptedTransport::new();
    let runtime = start(memory_state().await, &transport).await;
    runtime.select_site(Some(site())).await?;

    runtime.update_location(LocationFix::new(f64::NAN, -74.0721))?;
    assert_eq!(
        validation(runtime.check_in("llegada").await),
        ValidationError::MissingLocation
    );

    runtime.update_location(near_fix())?;
    runtime.update_location(LocationFix::new(4.7110, f64::INFINITY))?;
    let snapshot = runtime.snapshot().await?;
    assert_eq!(snapshot.fix.map(|f| f.latitude), Some(near_fix().latitude));

    runtime.check_in("llegada").await?;
    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failed_start_stops_the_actors_it_spawned() -> Result<(), Box<dyn Error>> {
    let app_state = memory_state().await;
    app_state.storage().put_text(Key::IsCheckedIn, "garbage").await?;
    let metrics = tokio::runtime::Handle::current().metrics();
    let before = metrics.num_alive_tasks();

    let transport = ScriptedTransport::new();
    for _ in 0..3 {
        let result = FieldRuntime::start(
            quiet_config(),
            app_state.clone(),
            session(),
            transport.as_transport(),
        )
        .await;
        match result {
            Err(RuntimeError::Spawn { actor, .. }) => assert_eq!(actor, "attendance"),
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("start should fail on a corrupt status flag"),
        }
    }

    let metrics = &metrics;
    common::eventually(|| async move { metrics.num_alive_tasks() <= before }).await;
    Ok(())
}
