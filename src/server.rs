//! Control server: operator triggers and the event streams they feed.
//!
//! Each remote event owns one [`Signal`]. Its trigger endpoint sets the
//! signal and returns at once; its stream endpoint serves a producer bound to
//! that signal.

use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::bus::RemoteEvent;
use crate::config::RetransmitTimeouts;
use crate::signal::Signal;
use crate::stream::{event_stream_response, serve as serve_stream};

#[derive(Clone)]
pub struct ServerState {
    start: Arc<Signal>,
    next_answer: Arc<Signal>,
    shutdown: Arc<Signal>,
    shutdown_now: Arc<AtomicBool>,
    retransmit: RetransmitTimeouts,
}

impl ServerState {
    pub fn new(retransmit: RetransmitTimeouts) -> Self {
        Self {
            start: Arc::new(Signal::new()),
            next_answer: Arc::new(Signal::new()),
            shutdown: Arc::new(Signal::new()),
            shutdown_now: Arc::new(AtomicBool::new(false)),
            retransmit,
        }
    }

    pub fn signal(&self, event: RemoteEvent) -> &Arc<Signal> {
        match event {
            RemoteEvent::Start => &self.start,
            RemoteEvent::NextAnswer => &self.next_answer,
            RemoteEvent::Shutdown => &self.shutdown,
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_now.load(Ordering::SeqCst)
    }

    /// Fire `event` the way its trigger endpoint does.
    pub fn trigger(&self, event: RemoteEvent) {
        if event == RemoteEvent::Shutdown {
            // The flag must be visible before the producer wakes and reads it.
            self.shutdown_now.store(true, Ordering::SeqCst);
        }
        tracing::info!("{event} requested");
        self.signal(event).set();
    }

    fn stream(&self, event: RemoteEvent) -> Response {
        let signal = self.signal(event).clone();
        let timeout = self.retransmit.for_event(event);
        tracing::debug!("client connected to {} stream", event);

        match event {
            RemoteEvent::Shutdown => {
                let shutdown_now = self.shutdown_now.clone();
                event_stream_response(serve_stream(event.as_str(), signal, timeout, move || {
                    ([shutdown_now.load(Ordering::SeqCst)],)
                }))
            }
            RemoteEvent::Start | RemoteEvent::NextAnswer => {
                event_stream_response(serve_stream(event.as_str(), signal, timeout, Vec::<Value>::new))
            }
        }
    }
}

async fn trigger_start(State(state): State<ServerState>) -> StatusCode {
    state.trigger(RemoteEvent::Start);
    StatusCode::OK
}

async fn trigger_next_answer(State(state): State<ServerState>) -> StatusCode {
    state.trigger(RemoteEvent::NextAnswer);
    StatusCode::OK
}

async fn trigger_shutdown(State(state): State<ServerState>) -> StatusCode {
    state.trigger(RemoteEvent::Shutdown);
    StatusCode::OK
}

async fn push_start(State(state): State<ServerState>) -> Response {
    state.stream(RemoteEvent::Start)
}

async fn push_next_answer(State(state): State<ServerState>) -> Response {
    state.stream(RemoteEvent::NextAnswer)
}

async fn push_shutdown(State(state): State<ServerState>) -> Response {
    state.stream(RemoteEvent::Shutdown)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(RemoteEvent::Start.trigger_path(), get(trigger_start))
        .route(RemoteEvent::NextAnswer.trigger_path(), get(trigger_next_answer))
        .route(RemoteEvent::Shutdown.trigger_path(), get(trigger_shutdown))
        .route(RemoteEvent::Start.stream_path(), get(push_start))
        .route(RemoteEvent::NextAnswer.stream_path(), get(push_next_answer))
        .route(RemoteEvent::Shutdown.stream_path(), get(push_shutdown))
        .with_state(state)
}

/// Serve the control router on `listener` until `shutdown` resolves.
///
/// Open event streams never finish on their own, so the server is dropped
/// rather than drained once `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("control server listening on {addr}");

    let app = router(state);
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result,
        _ = shutdown => {
            tracing::info!("control server stopping");
            Ok(())
        }
    }
}
