//! Remote commands and their results.

use crate::protocol::RpcResultCode;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;
use voicectl_core::ParticipantIdentity;

/// A device-control request to relay to one remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommand {
    /// Explicit target. `None` lets the channel's peer selection decide.
    pub destination: Option<ParticipantIdentity>,
    pub method: String,
    pub payload: String,
    /// Overrides the channel's default response timeout.
    pub response_timeout: Option<Duration>,
}

impl RemoteCommand {
    pub fn new(method: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            destination: None,
            method: method.into(),
            payload: payload.into(),
            response_timeout: None,
        }
    }

    pub fn to(mut self, destination: Option<ParticipantIdentity>) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }
}

/// Outcome of a command the peer answered.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCommandResult {
    pub request_id: Uuid,
    pub destination: ParticipantIdentity,
    /// The peer acknowledged the command.
    pub success: bool,
    pub payload: String,
    pub error_reason: Option<String>,
    pub error_code: Option<RpcResultCode>,
}

/// Lifecycle of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Sent,
    Acknowledged,
    TimedOut,
    Unreachable,
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Sent => "sent",
            Self::Acknowledged => "acknowledged",
            Self::TimedOut => "timed_out",
            Self::Unreachable => "unreachable",
        };
        f.write_str(name)
    }
}
