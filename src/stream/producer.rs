//! Producer side: turns signal wakes into an infinite event stream.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;

use super::{StreamError, StreamMessage};
use crate::signal::Signal;

struct ProducerState<F> {
    event: String,
    signal: Arc<Signal>,
    timeout: Option<Duration>,
    provider: F,
    failed: bool,
}

impl<F> Drop for ProducerState<F> {
    fn drop(&mut self) {
        tracing::debug!(event = %self.event, "event stream closed");
    }
}

/// Emit the provider's current payload every time `signal` fires, and again
/// whenever `timeout` elapses without a signal so a stale or freshly
/// connected consumer catches up.
///
/// The stream never ends on its own. A payload that fails to serialize is
/// yielded as an error and terminates the stream.
pub fn serve<F, T>(
    event: impl Into<String>,
    signal: Arc<Signal>,
    timeout: Option<Duration>,
    provider: F,
) -> impl Stream<Item = Result<StreamMessage, StreamError>> + Send + 'static
where
    F: Fn() -> T + Send + 'static,
    T: Serialize,
{
    let state = ProducerState {
        event: event.into(),
        signal,
        timeout,
        provider,
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }

        if !state.signal.wait(state.timeout).await {
            tracing::info!(event = %state.event, "timed out, retransmitting");
        }

        let message = StreamMessage::encode(&(state.provider)());
        match &message {
            Ok(message) => {
                tracing::info!(event = %state.event, "stream_content: {}", message.as_str().trim_end())
            }
            Err(e) => {
                tracing::error!(event = %state.event, "failed to encode payload, closing stream: {e}");
                state.failed = true;
            }
        }
        Some((message, state))
    })
}

/// Wrap a producer stream as a `text/event-stream` HTTP response.
///
/// An error item aborts the response body, which closes the connection.
pub fn event_stream_response<S>(messages: S) -> Response
where
    S: Stream<Item = Result<StreamMessage, StreamError>> + Send + 'static,
{
    let body = Body::from_stream(messages.map(|item| item.map(StreamMessage::into_bytes)));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
