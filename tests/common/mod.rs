//! Common test utilities for end-to-end bridge tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pushbridge::bus::{handler_fn, EventHandler, RemoteEvent};
use pushbridge::config::RetransmitTimeouts;
use pushbridge::server::{self, ServerState};

/// A control server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: ServerState,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub async fn start(retransmit: RetransmitTimeouts) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ServerState::new(retransmit);
        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            server::serve(listener, server_state, std::future::pending()).await
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// Hit the event's trigger endpoint over HTTP.
    pub async fn trigger(&self, event: RemoteEvent) {
        let response = reqwest::get(self.url(event.trigger_path())).await.unwrap();
        assert!(response.status().is_success(), "trigger {event} failed");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Handler that forwards every argument list it receives to a channel.
pub fn forwarding_handler() -> (Arc<impl EventHandler>, mpsc::UnboundedReceiver<Vec<Value>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = handler_fn(move |args| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(args);
            Ok(())
        }
    });
    (handler, rx)
}

pub async fn recv_within(
    rx: &mut mpsc::UnboundedReceiver<Vec<Value>>,
    limit: Duration,
) -> Option<Vec<Value>> {
    tokio::time::timeout(limit, rx.recv()).await.ok().flatten()
}
