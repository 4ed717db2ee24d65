//! Event bridge between a control server and a rendering client.
//!
//! The server turns operator triggers into long-lived event streams; the
//! client decodes those streams and republishes every message on an
//! in-process dispatcher whose handlers drive the game.
//!
//! # Architecture
//!
//! - `signal`: edge-triggered wake flag with optional timeout
//! - `stream`: wire framing, signal-driven producer, HTTP consumer
//! - `bus`: publish/subscribe dispatcher and the remote event catalogue
//! - `bridge`: one task per remote event, consumer → dispatcher
//! - `server`: axum router with the trigger and stream endpoints
//! - `game`: word game reacting to the pushed events
//! - `config`: environment driven settings for both processes

pub mod bridge;
pub mod bus;
pub mod config;
pub mod game;
pub mod server;
pub mod signal;
pub mod stream;

use std::sync::Arc;

use tokio::net::TcpListener;

use bridge::{BridgeError, BridgeTask, Bridges};
use bus::{EventDispatcher, RemoteEvent};
use config::{ClientConfig, ConfigError, ServerConfig};
use game::{GameError, LogRenderer, WordGame};
use server::ServerState;

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Game(#[from] GameError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bridge {name} failed: {source}")]
    Bridge {
        name: String,
        #[source]
        source: BridgeError,
    },
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushbridge=debug,info".parse().expect("valid env filter")),
        )
        .init();
}

/// Run the control server until interrupted.
pub async fn run_server(config: ServerConfig) -> Result<(), AppError> {
    let listener = TcpListener::bind(config.bind).await?;
    let state = ServerState::new(config.retransmit);

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}

/// Run the game client until the server requests shutdown, the process is
/// interrupted, or a bridge stops.
///
/// A stopped bridge is fatal: the client exits with that bridge's error
/// rather than carrying on with a silent event source.
pub async fn run_client(config: ClientConfig) -> Result<(), AppError> {
    let words = game::load_words(&config.words_path)?;
    let game = Arc::new(WordGame::new(
        config.title.clone(),
        words,
        Arc::new(LogRenderer),
        config.seed,
    ));

    let mut dispatcher = EventDispatcher::new();
    game.register(&mut dispatcher);
    let dispatcher = dispatcher.into_shared();

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let mut bridges = Bridges::new();
    for event in RemoteEvent::all() {
        bridges.spawn(
            BridgeTask::for_event(client.clone(), &config.server_url, *event, dispatcher.clone())
                .with_reconnect(config.reconnect),
        );
    }

    game.start();

    let terminate = game.terminate_signal();
    let outcome = tokio::select! {
        _ = terminate.wait(None) => {
            tracing::info!("shutdown requested by server");
            Ok(())
        }
        exit = bridges.next_exit() => match exit {
            Some((name, source)) => Err(AppError::Bridge { name, source }),
            None => Ok(()),
        },
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupted");
            Ok(())
        }
    };

    bridges.shutdown();
    outcome
}
