//! In-process transport. Peers are `RpcResponder`s living in the same process.

use super::{PeerEvent, PeerTransport};
use crate::error::{RpcError, RpcResult};
use crate::protocol::{RpcRequest, RpcResponse};
use crate::router::{RpcInvocation, RpcResponder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use voicectl_core::ParticipantIdentity;

const EVENT_BUFFER: usize = 64;

/// Connects the agent to simulated peers without any network.
pub struct LoopbackTransport {
    local: ParticipantIdentity,
    peers: Arc<RwLock<HashMap<ParticipantIdentity, Arc<dyn RpcResponder>>>>,
    events: mpsc::Sender<PeerEvent>,
}

impl LoopbackTransport {
    /// Create a transport for `local` and the receiver its events arrive on.
    pub fn new(local: ParticipantIdentity) -> (Self, mpsc::Receiver<PeerEvent>) {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let transport = Self {
            local,
            peers: Arc::new(RwLock::new(HashMap::new())),
            events,
        };
        (transport, rx)
    }

    /// Bring a peer into the session.
    pub async fn connect_peer(&self, identity: ParticipantIdentity, responder: Arc<dyn RpcResponder>) {
        self.peers.write().await.insert(identity.clone(), responder);
        debug!(peer = %identity, "Loopback peer connected");
        let _ = self.events.send(PeerEvent::Joined(identity)).await;
    }

    /// Remove a peer. Replies it has not sent yet are dropped.
    pub async fn disconnect_peer(&self, identity: &ParticipantIdentity) {
        if self.peers.write().await.remove(identity).is_some() {
            debug!(peer = %identity, "Loopback peer disconnected");
            let _ = self.events.send(PeerEvent::Left(identity.clone())).await;
        }
    }
}

#[async_trait::async_trait]
impl PeerTransport for LoopbackTransport {
    fn local_identity(&self) -> &ParticipantIdentity {
        &self.local
    }

    async fn send_request(
        &self,
        destination: &ParticipantIdentity,
        request: &RpcRequest,
    ) -> RpcResult<()> {
        let responder = self
            .peers
            .read()
            .await
            .get(destination)
            .cloned()
            .ok_or_else(|| RpcError::unreachable(Some(destination), "recipient not found"))?;

        let invocation = RpcInvocation {
            request_id: request.id,
            method: request.method.clone(),
            caller: self.local.clone(),
            payload: request.payload.clone(),
        };
        let from = destination.clone();
        let peers = self.peers.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let reply = responder.handle(invocation.clone()).await;
            // A peer that left while handling the request never answers.
            if !peers.read().await.contains_key(&from) {
                debug!(peer = %from, request_id = %invocation.request_id, "Dropping reply from departed peer");
                return;
            }
            let response = RpcResponse::new(invocation.request_id, reply);
            let _ = events.send(PeerEvent::Response { from, response }).await;
        });

        Ok(())
    }
}
