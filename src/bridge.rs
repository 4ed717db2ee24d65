//! Bridge tasks: republish remote event streams on the local dispatcher.
//!
//! One [`BridgeTask`] runs per remote event. It decodes each frame into an
//! argument list and publishes it fire-and-forget under the event's local
//! name. Bridges are independent: one failing leaves the others running.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::bus::{DispatchError, EventDispatcher, RemoteEvent};
use crate::stream::{consume, parse_args, StreamError};

/// Base delay for reconnect backoff (milliseconds).
pub const RECONNECT_BASE_DELAY_MS: u64 = 100;

/// Maximum delay for reconnect backoff (milliseconds).
pub const RECONNECT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("bridge {name} stopped: {reason}")]
    Aborted { name: String, reason: String },
}

/// What a bridge does after its connection drops.
///
/// Only [`StreamError::ConnectionLost`] is ever retried; a remote error or a
/// wiring error ends the bridge immediately. The default never reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::never()
    }
}

impl ReconnectPolicy {
    pub const fn never() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
        }
    }

    pub const fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::never()
        }
    }

    /// Exponential delay before reconnect `attempt` (zero-based), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2_u32.saturating_pow(attempt.min(16)));
        delay.min(self.max_delay)
    }
}

pub struct BridgeTask {
    name: String,
    url: String,
    local_event: String,
    client: reqwest::Client,
    dispatcher: Arc<EventDispatcher>,
    reconnect: ReconnectPolicy,
}

impl BridgeTask {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        local_event: impl Into<String>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let local_event = local_event.into();
        Self {
            name: local_event.clone(),
            url: url.into(),
            local_event,
            client,
            dispatcher,
            reconnect: ReconnectPolicy::never(),
        }
    }

    /// Bridge for one catalogued remote event served under `base_url`.
    pub fn for_event(
        client: reqwest::Client,
        base_url: &str,
        event: RemoteEvent,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), event.stream_path());
        let mut task = Self::new(client, url, event.local_event(), dispatcher);
        task.name = event.as_str().to_string();
        task
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pump the stream until it fails. Never returns `Ok`.
    pub async fn run(self) -> Result<Infallible, BridgeError> {
        let mut attempt = 0;
        loop {
            let error = self.pump(&mut attempt).await;
            match error {
                BridgeError::Stream(ref e)
                    if e.is_reconnectable() && attempt < self.reconnect.max_attempts =>
                {
                    let delay = self.reconnect.backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "bridge {}: {e}, reconnecting in {delay:?} (attempt {attempt})",
                        self.name
                    );
                    sleep(delay).await;
                }
                error => {
                    tracing::error!("bridge {} stopped: {error}", self.name);
                    return Err(error);
                }
            }
        }
    }

    async fn pump(&self, attempt: &mut u32) -> BridgeError {
        let mut messages = match consume(&self.client, &self.url).await {
            Ok(messages) => messages,
            Err(e) => return e.into(),
        };

        while let Some(message) = messages.next().await {
            let data = match message {
                Ok(data) => data,
                Err(e) => return e.into(),
            };
            // A delivered frame proves the connection is healthy again.
            *attempt = 0;
            let args = match parse_args(&data) {
                Ok(args) => args,
                Err(reason) => return BridgeError::InvalidPayload(reason),
            };
            // The dispatch handle is dropped: handlers run detached.
            if let Err(e) = self.dispatcher.publish(&self.local_event, args) {
                return e.into();
            }
        }

        StreamError::ConnectionLost(format!("{}: stream ended", self.url)).into()
    }
}

/// The set of running bridge tasks owned by a client process.
#[derive(Default)]
pub struct Bridges {
    tasks: Vec<(String, JoinHandle<Result<Infallible, BridgeError>>)>,
}

impl Bridges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, task: BridgeTask) {
        let name = task.name().to_string();
        tracing::debug!("starting bridge {name}");
        self.tasks.push((name, tokio::spawn(task.run())));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the first bridge to stop and report why.
    ///
    /// Returns `None` when no bridge is running.
    pub async fn next_exit(&mut self) -> Option<(String, BridgeError)> {
        if self.tasks.is_empty() {
            return None;
        }

        let (result, index, _) = select_all(self.tasks.iter_mut().map(|(_, handle)| handle)).await;
        let (name, _) = self.tasks.remove(index);
        let error = match result {
            Ok(Ok(never)) => match never {},
            Ok(Err(error)) => error,
            Err(e) => BridgeError::Aborted {
                name: name.clone(),
                reason: e.to_string(),
            },
        };
        Some((name, error))
    }

    /// Abort every running bridge.
    pub fn shutdown(&mut self) {
        for (name, handle) in self.tasks.drain(..) {
            tracing::debug!("stopping bridge {name}");
            handle.abort();
        }
    }
}

impl Drop for Bridges {
    fn drop(&mut self) {
        self.shutdown();
    }
}
