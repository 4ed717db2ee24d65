//! Consumer side: decodes a remote event stream into payload strings.

use std::fmt;
use std::pin::Pin;

use futures::{stream, Stream, StreamExt};
use reqwest::header::ACCEPT;

use super::{FrameDecoder, StreamError};

/// Lazy, effectively infinite sequence of decoded frame payloads.
///
/// On success the sequence only ends after yielding a single error:
/// [`StreamError::ConnectionLost`], or [`StreamError::Decode`] for a
/// malformed frame.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// Open one connection to `url` and decode its event stream.
///
/// A non-success status is reported as [`StreamError::RemoteError`] carrying
/// the full response body, before any message is produced. No retries are
/// attempted.
pub async fn consume(client: &reqwest::Client, url: &str) -> Result<MessageStream, StreamError> {
    tracing::info!("process sse: {url}");

    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| StreamError::Request(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| StreamError::ConnectionLost(format!("{url}: reading error body: {e}")))?;
        tracing::warn!("event stream {url} rejected with {status}: {body}");
        return Err(StreamError::RemoteError {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!("connected to event stream at {url}");
    Ok(decode(url, response.bytes_stream()))
}

struct DecodeState<S> {
    source: String,
    chunks: Pin<Box<S>>,
    decoder: FrameDecoder,
    finished: bool,
}

/// Decode raw byte chunks into frame payloads.
///
/// `source` only labels log lines and errors.
pub fn decode<S, B, E>(source: &str, chunks: S) -> MessageStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = DecodeState {
        source: source.to_string(),
        chunks: Box::pin(chunks),
        decoder: FrameDecoder::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            match state.decoder.next_frame() {
                Ok(Some(data)) => {
                    tracing::debug!("get_sse_messages data: {data}");
                    return Some((Ok(data), state));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("dropping event stream {}: {e}", state.source);
                    state.finished = true;
                    return Some((Err(e), state));
                }
            }

            let lost = match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    state.decoder.push(chunk.as_ref());
                    continue;
                }
                Some(Err(e)) => format!("{}: {e}", state.source),
                None => format!("{}: stream closed by remote", state.source),
            };

            if state.decoder.pending() > 0 {
                tracing::debug!(
                    "discarding {} bytes of partial frame from {}",
                    state.decoder.pending(),
                    state.source
                );
            }
            state.finished = true;
            return Some((Err(StreamError::ConnectionLost(lost)), state));
        }
    }))
}
