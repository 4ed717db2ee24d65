//! Remote event catalogue.
//!
//! Single source of truth for the names each remote event goes by: the
//! operator trigger path, the stream path, and the local dispatcher name.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Local dispatcher names
// ---------------------------------------------------------------------------

pub const EVENT_PUSH_START: &str = "game.push_start";
pub const EVENT_PUSH_NEXT_ANSWER: &str = "game.push_next_answer";
pub const EVENT_PUSH_SHUTDOWN: &str = "game.push_shutdown";

// ---------------------------------------------------------------------------
// Remote events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteEvent {
    Start,
    NextAnswer,
    Shutdown,
}

impl RemoteEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::NextAnswer => "next-answer",
            Self::Shutdown => "shutdown",
        }
    }

    pub const fn all() -> &'static [RemoteEvent] {
        &[RemoteEvent::Start, RemoteEvent::NextAnswer, RemoteEvent::Shutdown]
    }

    /// Operator endpoint that fires this event.
    pub const fn trigger_path(&self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::NextAnswer => "/next_answer",
            Self::Shutdown => "/shutdown",
        }
    }

    /// Endpoint streaming this event to clients.
    pub const fn stream_path(&self) -> &'static str {
        match self {
            Self::Start => "/push_start",
            Self::NextAnswer => "/push_next_answer",
            Self::Shutdown => "/push_shutdown",
        }
    }

    /// Name this event is republished under inside the client.
    pub const fn local_event(&self) -> &'static str {
        match self {
            Self::Start => EVENT_PUSH_START,
            Self::NextAnswer => EVENT_PUSH_NEXT_ANSWER,
            Self::Shutdown => EVENT_PUSH_SHUTDOWN,
        }
    }
}

impl fmt::Display for RemoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RemoteEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "next-answer" | "next_answer" => Ok(Self::NextAnswer),
            "shutdown" => Ok(Self::Shutdown),
            _ => Err(format!("unknown remote event: {value}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_consistent() {
        for event in RemoteEvent::all() {
            assert_eq!(event.as_str().parse::<RemoteEvent>().unwrap(), *event);
            assert!(event.stream_path().starts_with("/push_"));
            assert!(event.local_event().starts_with("game.push_"));
            assert_eq!(
                event.stream_path().trim_start_matches("/push_"),
                event.trigger_path().trim_start_matches('/')
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("stop".parse::<RemoteEvent>().is_err());
        assert_eq!("next_answer".parse::<RemoteEvent>().unwrap(), RemoteEvent::NextAnswer);
    }
}
