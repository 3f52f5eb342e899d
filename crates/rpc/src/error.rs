//! Error types for the remote command channel.

use std::time::Duration;
use voicectl_core::ParticipantIdentity;

/// Result type for remote command operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors raised while relaying a command to a remote participant.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// No suitable peer, or the peer went away before replying.
    #[error("remote participant{} is unreachable: {reason}", describe(.destination))]
    Unreachable {
        destination: Option<ParticipantIdentity>,
        reason: String,
    },

    /// The peer did not reply within the response timeout.
    #[error("no reply to `{method}` within {}ms", .after.as_millis())]
    Timeout { method: String, after: Duration },

    /// Request payload exceeds what the peer protocol carries.
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// A method handler with this name already exists.
    #[error("method `{0}` is already registered")]
    MethodAlreadyRegistered(String),

    /// The underlying connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe(destination: &Option<ParticipantIdentity>) -> String {
    match destination {
        Some(identity) => format!(" `{}`", identity),
        None => String::new(),
    }
}

impl RpcError {
    pub fn unreachable(destination: Option<&ParticipantIdentity>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            destination: destination.cloned(),
            reason: reason.into(),
        }
    }

    /// True for failures where the peer never received or answered the command.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Transport(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_message_names_destination() {
        let board = ParticipantIdentity::new("esp32-board");
        let err = RpcError::unreachable(Some(&board), "participant left the session");
        assert_eq!(
            err.to_string(),
            "remote participant `esp32-board` is unreachable: participant left the session"
        );

        let err = RpcError::unreachable(None, "no remote participant is connected");
        assert_eq!(
            err.to_string(),
            "remote participant is unreachable: no remote participant is connected"
        );
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_timeout_message() {
        let err = RpcError::Timeout {
            method: "get_cpu_temp".to_string(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "no reply to `get_cpu_temp` within 10000ms");
        assert!(err.is_timeout());
        assert!(!err.is_unreachable());
    }
}
