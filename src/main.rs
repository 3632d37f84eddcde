//! chatsync - replays a scripted chat session against the sync core.

use chatsync::config::{self, Config};
use chatsync::proto::{
    Channel, ChannelKey, Message, QueryFilter, QuerySort, SocketEvent, SortField, User, UserEvent,
};
use chatsync::{ChatEvent, SyncEngine};
use chrono::{Duration, Utc};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; CHATSYNC_LOG_JSON switches to one JSON object per line
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true);
    if std::env::var_os("CHATSYNC_LOG_JSON").is_some() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Load configuration; defaults when no file is given or it does not exist
    let config = match std::env::args().nth(1) {
        Some(path) if Path::new(&path).exists() => Config::load(&path).map_err(|e| {
            error!(path = %path, error = %e, "Failed to load config");
            e
        })?,
        Some(path) => {
            info!(path = %path, "Config file not found, using defaults");
            Config::default()
        }
        None => Config::default(),
    };

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "Refusing to start with {} configuration error(s)",
            errors.len()
        ));
    }

    info!(
        flush_delay_ms = config.repository.flush_delay_ms,
        database = config.database.as_ref().map(|d| d.path.as_str()).unwrap_or("memory"),
        "Starting chatsync"
    );

    let engine = SyncEngine::from_config(&config).await?;
    run_session(&engine).await?;

    let flushed = engine.shutdown().await?;
    info!(flushed, "Session finished");
    Ok(())
}

/// Connect, chat, drop the connection, recover and log out.
async fn run_session(engine: &SyncEngine) -> anyhow::Result<()> {
    let me = User::new("alice", "Alice");
    let bob = User::new("bob", "Bob");
    let general = ChannelKey::new("messaging", "general");
    let now = Utc::now();

    engine
        .on_user_event(UserEvent::ConnectUser(me.clone()))
        .await?;
    engine
        .on_socket_event(SocketEvent::ConnectionRequested)
        .await?;
    engine
        .on_socket_event(SocketEvent::Connected(Uuid::new_v4().to_string()))
        .await?;
    engine
        .on_user_event(UserEvent::UserConfirmed(me.clone()))
        .await?;
    log_status(engine, "connected");

    engine
        .on_chat_event(ChatEvent::ChannelUpdated(
            Channel::new(general.clone(), "General", now).with_members([&me.id, &bob.id]),
        ))
        .await?;
    engine.on_chat_event(ChatEvent::UserUpdated(bob.clone())).await?;

    let channel = engine.watch_channel(&general).await?;
    let inbox = engine.query_channels(
        QueryFilter::Member(me.id.clone()),
        QuerySort::default().desc(SortField::LastMessageAt),
    );

    for (i, text) in ["hi alice", "are you there?"].into_iter().enumerate() {
        let message = Message::new(
            Uuid::new_v4().to_string(),
            general.clone(),
            bob.id.clone(),
            text,
            now + Duration::seconds(i as i64 + 1),
        );
        engine.on_chat_event(ChatEvent::MessageNew(message)).await?;
    }
    info!(
        unread = channel.unread_count(),
        total_unread = engine.registry().global().total_unread(),
        channels = inbox.cids().len(),
        "Messages received"
    );

    engine.on_socket_event(SocketEvent::Disconnected).await?;
    log_status(engine, "dropped");

    engine
        .on_socket_event(SocketEvent::ConnectionRequested)
        .await?;
    engine
        .on_socket_event(SocketEvent::Connected(Uuid::new_v4().to_string()))
        .await?;
    log_status(engine, "reconnected");

    channel.mark_read();
    let flushed = engine.repos().flush_all().await?;
    info!(flushed, "Flushed before logout");

    engine.on_user_event(UserEvent::Logout).await?;
    log_status(engine, "logged out");
    Ok(())
}

fn log_status(engine: &SyncEngine, step: &str) {
    let status = engine.state().status();
    match engine.state().current_connection_id_or_fail() {
        Ok(connection_id) => info!(step, status = status.name(), connection_id = %connection_id, "Client status"),
        Err(_) => info!(step, status = status.name(), "Client status"),
    }
}
