use std::collections::HashMap;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;

/// Error returned by an event handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HandlerError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Registration index of the failing handler.
    pub index: usize,
    pub error: HandlerError,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handlers registered for event {0}")]
    UnknownEvent(String),
    #[error("{} of {total} handlers for {event} failed: {}", .failures.len(), summarize(.failures))]
    HandlerFailed {
        event: String,
        total: usize,
        failures: Vec<HandlerFailure>,
    },
    #[error("dispatch of {event} aborted: {reason}")]
    Aborted { event: String, reason: String },
}

fn summarize(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("#{}: {}", f.index, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// An asynchronous subscriber to a named event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, args: &[Value]) -> Result<(), HandlerError>;
}

/// Adapter that lets an async closure act as an [`EventHandler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F, Fut>(f: F) -> Arc<FnHandler<F>>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, args: &[Value]) -> Result<(), HandlerError> {
        (self.0)(args.to_vec()).await
    }
}

/// Process-local publish/subscribe registry.
///
/// Handlers are registered through `&mut self` during setup. Once the
/// dispatcher is shared behind an `Arc` the registry can no longer change,
/// so dispatch reads it without locking.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    seq: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` and hand it back unchanged.
    ///
    /// Handlers for one event are invoked in registration order.
    pub fn on<H>(&mut self, event: impl Into<String>, handler: Arc<H>) -> Arc<H>
    where
        H: EventHandler + 'static,
    {
        let erased: Arc<dyn EventHandler> = handler.clone();
        self.listeners.entry(event.into()).or_default().push(erased);
        handler
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Freeze the registry and share it.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Schedule every handler for `event` and return without waiting.
    ///
    /// Must be called from within a tokio runtime. The returned handle can be
    /// awaited to observe the outcome; dropping it detaches the dispatch, in
    /// which case failures are only reported through the log.
    pub fn publish(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
    ) -> Result<DispatchHandle, DispatchError> {
        if self.handler_count(event) == 0 {
            tracing::error!("publish: no handlers for event {event}");
            return Err(DispatchError::UnknownEvent(event.to_string()));
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(seq, "eventengine trigger {event}, {args:?}");

        let dispatcher = Arc::clone(self);
        let name = event.to_string();
        let handle = tokio::spawn(async move {
            let result = dispatcher.dispatch_all(&name, &args).await;
            if let Err(e) = &result {
                tracing::error!(seq, "dispatch failed: {e}");
            }
            result
        });

        Ok(DispatchHandle {
            event: event.to_string(),
            handle,
        })
    }

    /// Run every handler for `event` concurrently and wait for all of them.
    ///
    /// All handlers run to completion even when some fail or panic; the
    /// failures are collected into [`DispatchError::HandlerFailed`].
    pub async fn dispatch_all(&self, event: &str, args: &[Value]) -> Result<(), DispatchError> {
        let handlers = match self.listeners.get(event) {
            Some(handlers) if !handlers.is_empty() => handlers,
            _ => return Err(DispatchError::UnknownEvent(event.to_string())),
        };

        tracing::trace!("dispatching {event} to {} handlers", handlers.len());
        let results = join_all(handlers.iter().map(|handler| {
            AssertUnwindSafe(handler.handle(args))
                .catch_unwind()
                .map(flatten_outcome)
        }))
        .await;

        let failures: Vec<HandlerFailure> = results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| result.err().map(|error| HandlerFailure { index, error }))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::HandlerFailed {
                event: event.to_string(),
                total: handlers.len(),
                failures,
            })
        }
    }
}

fn flatten_outcome(
    outcome: Result<Result<(), HandlerError>, Box<dyn Any + Send>>,
) -> Result<(), HandlerError> {
    match outcome {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::new(format!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A scheduled dispatch.
pub struct DispatchHandle {
    event: String,
    handle: JoinHandle<Result<(), DispatchError>>,
}

impl DispatchHandle {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for every handler of this dispatch to finish.
    pub async fn join(self) -> Result<(), DispatchError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(DispatchError::Aborted {
                event: self.event,
                reason: e.to_string(),
            }),
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
