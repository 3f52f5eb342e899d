//! Transport layer connecting the agent to remote participants.

pub mod loopback;
pub mod websocket;

pub use loopback::LoopbackTransport;
pub use websocket::WebSocketTransport;

use crate::error::RpcResult;
use crate::protocol::{RpcRequest, RpcResponse};
use voicectl_core::ParticipantIdentity;

/// Something that happened on the real-time session.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    Joined(ParticipantIdentity),
    Left(ParticipantIdentity),
    /// A participant answered one of our requests.
    Response {
        from: ParticipantIdentity,
        response: RpcResponse,
    },
}

/// Delivers requests to remote participants.
///
/// Replies and membership changes come back as `PeerEvent`s on the receiver
/// handed out when the transport is created.
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Identity this side of the session uses.
    fn local_identity(&self) -> &ParticipantIdentity;

    /// Hand one request to the transport. Returns once it is on its way; the
    /// reply arrives later as `PeerEvent::Response`.
    async fn send_request(
        &self,
        destination: &ParticipantIdentity,
        request: &RpcRequest,
    ) -> RpcResult<()>;
}
