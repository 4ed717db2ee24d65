//! Event streams between the control server and the client.
//!
//! - `frame`: wire encoding (`data: <json array>\n\n`) and the byte-level
//!   frame splitter
//! - `producer`: signal-driven stream served over HTTP
//! - `consumer`: HTTP client that decodes a stream into payload strings

mod consumer;
mod error;
mod frame;
mod producer;

pub use consumer::{consume, decode, MessageStream};
pub use error::StreamError;
pub use frame::{parse_args, FrameDecoder, StreamMessage};
pub use producer::{event_stream_response, serve};
