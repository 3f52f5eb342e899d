//! Request/response messages exchanged with remote participants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Largest request or response payload a peer accepts, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 15 * 1024;

/// Version stamped on every outgoing request.
pub const PROTOCOL_VERSION: u8 = 1;

/// Numeric result codes of the peer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum RpcResultCode {
    Ok,
    Application,
    ConnectionTimeout,
    ResponseTimeout,
    RecipientDisconnected,
    ResponsePayloadTooLarge,
    SendFailed,
    UnsupportedMethod,
    RecipientNotFound,
    RequestPayloadTooLarge,
    UnsupportedServer,
    UnsupportedVersion,
    /// A code this build does not know about.
    Other(u16),
}

impl RpcResultCode {
    pub fn code(self) -> u16 {
        self.into()
    }

    /// Default human-readable message for the code.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Application => "application error in method handler",
            Self::ConnectionTimeout => "connection timeout",
            Self::ResponseTimeout => "response timeout",
            Self::RecipientDisconnected => "recipient disconnected",
            Self::ResponsePayloadTooLarge => "response payload too large",
            Self::SendFailed => "failed to send",
            Self::UnsupportedMethod => "method not supported at destination",
            Self::RecipientNotFound => "recipient not found",
            Self::RequestPayloadTooLarge => "request payload too large",
            Self::UnsupportedServer => "RPC not supported by server",
            Self::UnsupportedVersion => "unsupported RPC version",
            Self::Other(_) => "unknown error",
        }
    }

    /// The request never reached the peer, or the peer is gone.
    pub fn is_unreachable(self) -> bool {
        matches!(
            self,
            Self::RecipientDisconnected | Self::SendFailed | Self::RecipientNotFound
        )
    }

    pub fn is_timeout(self) -> bool {
        matches!(self, Self::ConnectionTimeout | Self::ResponseTimeout)
    }
}

impl From<RpcResultCode> for u16 {
    fn from(code: RpcResultCode) -> Self {
        match code {
            RpcResultCode::Ok => 0,
            RpcResultCode::Application => 1500,
            RpcResultCode::ConnectionTimeout => 1501,
            RpcResultCode::ResponseTimeout => 1502,
            RpcResultCode::RecipientDisconnected => 1503,
            RpcResultCode::ResponsePayloadTooLarge => 1504,
            RpcResultCode::SendFailed => 1505,
            RpcResultCode::UnsupportedMethod => 1400,
            RpcResultCode::RecipientNotFound => 1401,
            RpcResultCode::RequestPayloadTooLarge => 1402,
            RpcResultCode::UnsupportedServer => 1403,
            RpcResultCode::UnsupportedVersion => 1404,
            RpcResultCode::Other(code) => code,
        }
    }
}

impl From<u16> for RpcResultCode {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Ok,
            1500 => Self::Application,
            1501 => Self::ConnectionTimeout,
            1502 => Self::ResponseTimeout,
            1503 => Self::RecipientDisconnected,
            1504 => Self::ResponsePayloadTooLarge,
            1505 => Self::SendFailed,
            1400 => Self::UnsupportedMethod,
            1401 => Self::RecipientNotFound,
            1402 => Self::RequestPayloadTooLarge,
            1403 => Self::UnsupportedServer,
            1404 => Self::UnsupportedVersion,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for RpcResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// A method invocation addressed to one remote participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    pub method: String,
    pub payload: String,
    pub response_timeout_ms: u64,
    pub version: u8,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, payload: impl Into<String>, response_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            payload: payload.into(),
            response_timeout_ms: response_timeout.as_millis() as u64,
            version: PROTOCOL_VERSION,
        }
    }
}

/// Error half of a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: RpcResultCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RpcErrorBody {
    pub fn new(code: RpcResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Error carrying the code's default message.
    pub fn from_code(code: RpcResultCode) -> Self {
        Self::new(code, code.message())
    }

    /// Failure raised by the method handler itself.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(RpcResultCode::Application, message)
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

impl fmt::Display for RpcErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code.code())
    }
}

/// What the peer answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcReply {
    Payload(String),
    Error(RpcErrorBody),
}

impl RpcReply {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self::Payload(payload.into())
    }

    pub fn error(code: RpcResultCode, message: impl Into<String>) -> Self {
        Self::Error(RpcErrorBody::new(code, message))
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::Error(RpcErrorBody::application(message))
    }
}

/// Reply correlated with the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub request_id: Uuid,
    pub result: RpcReply,
}

impl RpcResponse {
    pub fn new(request_id: Uuid, result: RpcReply) -> Self {
        Self { request_id, result }
    }
}
