//! Headless driver for the attendance sync core.
//!
//! Reads commands from stdin in place of the attendance screen and logs every
//! sync event.

mod command;

use std::sync::Arc;

use actors::{AttendanceError, FieldRuntime, NetworkStatus, RuntimeConfig};
use api::{ApiClient, ApiConfig, ApiError, TransportError};
use field_core::{LocationFix, Session, Site, Ticket};
use storage::{AppState, Storage, StorageError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use command::{Command, HELP};

#[derive(Debug, thiserror::Error)]
enum AgentError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    ApiConfig(#[from] api::ConfigError),

    #[error(transparent)]
    RuntimeConfig(#[from] actors::ConfigError),

    #[error(transparent)]
    Runtime(#[from] actors::RuntimeError),

    #[error("no saved session; set FIELDSYNC_EMAIL and FIELDSYNC_PASSWORD to log in")]
    MissingCredentials,

    #[error("stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

/// Work sites and tickets offered for selection.
struct ReferenceData {
    sites: Vec<Site>,
    tickets: Vec<Ticket>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AgentError> {
    let app_state = AppState::new(Storage::from_env().await?);
    let client = ApiClient::new(ApiConfig::from_env()?)?;
    let config = RuntimeConfig::from_env()?;

    if app_state.take_logout_marker().await? {
        tracing::info!("Previous session ended with a logout");
    }
    let session = match app_state.load_session().await? {
        Some(session) => {
            tracing::info!("Resuming session for user {}", session.user_id);
            session
        }
        None => login(&client, &app_state).await?,
    };

    let reference = load_reference_data(&client, &app_state, &session).await?;
    let runtime =
        FieldRuntime::start(config, app_state, session, Arc::new(client)).await?;

    let mut events = runtime.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!("{}", event.description()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log fell behind, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut runtime = Some(runtime);

    while let Some(line) = lines.next_line().await? {
        let Some(rt) = runtime.as_ref() else { break };
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };

        match command {
            Command::Logout => {
                let Some(rt) = runtime.take() else { break };
                match rt.logout().await {
                    Ok(()) => {
                        println!("logged out");
                        return Ok(());
                    }
                    Err((rt, e)) => {
                        println!("{e}");
                        runtime = Some(rt);
                    }
                }
            }
            Command::Quit => break,
            other => {
                if let Err(e) = execute(rt, &reference, other).await {
                    println!("{e}");
                }
            }
        }
    }

    if let Some(rt) = runtime {
        rt.shutdown().await;
    }
    Ok(())
}

async fn login(client: &ApiClient, app_state: &AppState) -> Result<Session, AgentError> {
    let email = std::env::var("FIELDSYNC_EMAIL").ok().filter(|v| !v.is_empty());
    let password = std::env::var("FIELDSYNC_PASSWORD").ok().filter(|v| !v.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AgentError::MissingCredentials);
    };

    let session = client.login(&email, &password).await?;
    app_state.save_session(&session).await?;
    Ok(session)
}

/// Fetch sites and tickets, falling back to the last cached copy.
async fn load_reference_data(
    client: &ApiClient,
    app_state: &AppState,
    session: &Session,
) -> Result<ReferenceData, StorageError> {
    let sites = match client.fetch_sites(session).await {
        Ok(sites) => {
            app_state.cache_sites(&sites).await?;
            sites
        }
        Err(e) => {
            tracing::warn!("Using cached sites: {}", e);
            app_state.cached_sites().await?
        }
    };
    let tickets = match client.fetch_tickets(session).await {
        Ok(tickets) => {
            app_state.cache_tickets(&tickets).await?;
            tickets
        }
        Err(e) => {
            tracing::warn!("Using cached tickets: {}", e);
            app_state.cached_tickets().await?
        }
    };

    tracing::info!("{} sites, {} tickets available", sites.len(), tickets.len());
    Ok(ReferenceData { sites, tickets })
}

async fn execute(
    runtime: &FieldRuntime,
    reference: &ReferenceData,
    command: Command,
) -> Result<(), AttendanceError> {
    match command {
        Command::Online => runtime.network_changed(NetworkStatus::online())?,
        Command::Offline => runtime.network_changed(NetworkStatus::offline())?,
        Command::Sites => {
            for site in &reference.sites {
                println!("{:>6}  {}", site.id, site.name);
            }
        }
        Command::Site(id) => {
            let site = match id {
                Some(id) => match reference.sites.iter().find(|s| s.id == id) {
                    Some(site) => Some(site.clone()),
                    None => {
                        println!("no site with id {id}");
                        return Ok(());
                    }
                },
                None => None,
            };
            runtime.select_site(site).await?;
        }
        Command::Ticket(id) => {
            let ticket = match id {
                Some(id) => match reference.tickets.iter().find(|t| t.id == id) {
                    Some(ticket) => Some(ticket.clone()),
                    None => {
                        println!("no ticket with id {id}");
                        return Ok(());
                    }
                },
                None => None,
            };
            runtime.select_ticket(ticket).await?;
        }
        Command::Fix {
            latitude,
            longitude,
        } => runtime.update_location(LocationFix::new(latitude, longitude))?,
        Command::Intent { intent, comment } => {
            let outcome = runtime.intent(intent, &comment).await?;
            match outcome.dispatch {
                actors::DispatchOutcome::Delivered => println!("{} sent", outcome.event.kind),
                actors::DispatchOutcome::Queued { reason } => {
                    println!("{} saved, will retry ({reason})", outcome.event.kind)
                }
            }
            if !outcome.persisted {
                println!("warning: status was not saved on this device");
            }
        }
        Command::Sync => println!("{:?}", runtime.foregrounded().await?),
        Command::Status => {
            let snapshot = runtime.snapshot().await?;
            let counters = runtime.counters().await?;
            println!(
                "status: {}  site: {}  online: {}  synced: {}  pending: {}",
                snapshot.status,
                snapshot.site.map(|s| s.name).unwrap_or_else(|| "-".into()),
                runtime.is_online(),
                counters.synced,
                counters.unsynced
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Logout | Command::Quit => {}
    }
    Ok(())
}
