#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The producer answered with a non-success status. Carries the full body.
    #[error("remote error {status}: {body}")]
    RemoteError { status: u16, body: String },
    /// The connection dropped after the stream was established.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// The connection could not be opened at all.
    #[error("request failed: {0}")]
    Request(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The producer sent bytes that do not form a valid frame.
    #[error("invalid frame: {0}")]
    Decode(String),
}

impl StreamError {
    pub fn serialization<E: std::fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// True for failures where opening a fresh connection may succeed.
    pub fn is_reconnectable(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(value: serde_json::Error) -> Self {
        Self::serialization(value)
    }
}
