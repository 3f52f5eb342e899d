//! Remote command channel: request/response with one remote participant.
//!
//! A single dispatcher task owns the transport's event receiver. It keeps the
//! [`PeerDirectory`] current and routes each reply to the `send` call waiting
//! for it by request id. Callers are suspended only while their own command
//! is in flight. When the event stream ends the channel is closed: every
//! participant is dropped and waiting commands fail as unreachable.

use crate::command::{CommandState, RemoteCommand, RemoteCommandResult};
use crate::error::{RpcError, RpcResult};
use crate::peers::PeerDirectory;
use crate::protocol::{RpcErrorBody, RpcReply, RpcRequest, RpcResultCode, MAX_PAYLOAD_BYTES};
use crate::transport::{PeerEvent, PeerTransport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voicectl_core::config::{PeerSelection, RpcConfig, DEFAULT_RESPONSE_TIMEOUT_MS};
use voicectl_core::ParticipantIdentity;

/// Channel settings
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub response_timeout: Duration,
    pub max_payload_bytes: usize,
    pub peer_selection: PeerSelection,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            peer_selection: PeerSelection::FirstConnected,
        }
    }
}

impl From<&RpcConfig> for ChannelConfig {
    fn from(config: &RpcConfig) -> Self {
        Self {
            response_timeout: config.response_timeout(),
            max_payload_bytes: config.max_payload_bytes,
            peer_selection: config.peer_selection,
        }
    }
}

struct PendingRequest {
    destination: ParticipantIdentity,
    method: String,
    reply_tx: oneshot::Sender<RpcReply>,
}

type PendingMap = Arc<Mutex<HashMap<Uuid, PendingRequest>>>;

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<Uuid, PendingRequest>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes the pending entry when the waiting `send` finishes or is dropped.
struct PendingGuard {
    pending: PendingMap,
    request_id: Uuid,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if lock(&self.pending).remove(&self.request_id).is_some() {
            debug!(request_id = %self.request_id, "Pending command abandoned");
        }
    }
}

/// Sends device commands to remote participants and awaits their replies
pub struct RemoteCommandChannel {
    transport: Arc<dyn PeerTransport>,
    peers: PeerDirectory,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    config: ChannelConfig,
    dispatcher: JoinHandle<()>,
}

impl RemoteCommandChannel {
    /// Start the channel. `events` must be the receiver paired with `transport`.
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        events: mpsc::Receiver<PeerEvent>,
        config: ChannelConfig,
    ) -> Self {
        let peers = PeerDirectory::new();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let dispatcher = tokio::spawn(dispatch(
            events,
            peers.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            transport,
            peers,
            pending,
            closed,
            config,
            dispatcher,
        }
    }

    pub fn local_identity(&self) -> &ParticipantIdentity {
        self.transport.local_identity()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn connected_peers(&self) -> Vec<ParticipantIdentity> {
        self.peers.snapshot()
    }

    pub fn is_connected(&self, identity: &ParticipantIdentity) -> bool {
        self.peers.contains(identity)
    }

    /// Whether the transport's event stream has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of commands still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Wait until `identity` has joined.
    pub async fn wait_for_participant(
        &self,
        identity: &ParticipantIdentity,
        within: Duration,
    ) -> RpcResult<()> {
        self.peers
            .wait_for(within, |p| p == identity)
            .await
            .map(|_| ())
            .ok_or_else(|| RpcError::unreachable(Some(identity), "participant did not join in time"))
    }

    fn resolve_destination(
        &self,
        explicit: Option<&ParticipantIdentity>,
    ) -> RpcResult<ParticipantIdentity> {
        if self.is_closed() {
            return Err(RpcError::unreachable(explicit, "the session transport is closed"));
        }
        match explicit {
            Some(identity) if self.peers.contains(identity) => Ok(identity.clone()),
            Some(identity) => Err(RpcError::unreachable(
                Some(identity),
                "participant is not connected",
            )),
            None => match self.config.peer_selection {
                PeerSelection::FirstConnected => self
                    .peers
                    .first()
                    .ok_or_else(|| RpcError::unreachable(None, "no remote participant is connected")),
                PeerSelection::ExplicitOnly => Err(RpcError::unreachable(
                    None,
                    "no destination participant was selected",
                )),
            },
        }
    }

    /// Relay one command and wait for its reply.
    ///
    /// Never retries. Dropping the returned future abandons the command; a reply
    /// arriving afterwards is discarded.
    pub async fn send(&self, command: RemoteCommand) -> RpcResult<RemoteCommandResult> {
        let size = command.payload.len();
        if size > self.config.max_payload_bytes {
            return Err(RpcError::PayloadTooLarge {
                size,
                limit: self.config.max_payload_bytes,
            });
        }

        let destination = self.resolve_destination(command.destination.as_ref())?;
        let timeout = command
            .response_timeout
            .unwrap_or(self.config.response_timeout);
        let request = RpcRequest::new(command.method, command.payload, timeout);
        let request_id = request.id;
        let method = request.method.clone();
        debug!(
            request_id = %request_id,
            method = %method,
            destination = %destination,
            state = %CommandState::Created,
            "Remote command created"
        );

        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending).insert(
            request_id,
            PendingRequest {
                destination: destination.clone(),
                method: method.clone(),
                reply_tx,
            },
        );
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            request_id,
        };
        if self.is_closed() {
            return Err(RpcError::unreachable(
                Some(&destination),
                "the session transport is closed",
            ));
        }

        if let Err(e) = self.transport.send_request(&destination, &request).await {
            warn!(
                request_id = %request_id,
                method = %method,
                state = %CommandState::Unreachable,
                error = %e,
                "Failed to send remote command"
            );
            return Err(match e {
                RpcError::Unreachable { .. } => e,
                other => RpcError::unreachable(Some(&destination), other.to_string()),
            });
        }
        debug!(request_id = %request_id, state = %CommandState::Sent, "Remote command sent");

        let reply = match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                warn!(request_id = %request_id, state = %CommandState::Unreachable, "Reply channel closed");
                return Err(RpcError::unreachable(
                    Some(&destination),
                    "channel closed before the participant replied",
                ));
            }
            Err(_) => {
                warn!(
                    request_id = %request_id,
                    method = %method,
                    timeout_ms = timeout.as_millis() as u64,
                    state = %CommandState::TimedOut,
                    "Remote command timed out"
                );
                return Err(RpcError::Timeout { method, after: timeout });
            }
        };

        match reply {
            RpcReply::Payload(payload) => {
                info!(
                    request_id = %request_id,
                    method = %method,
                    destination = %destination,
                    state = %CommandState::Acknowledged,
                    "Remote command acknowledged"
                );
                Ok(RemoteCommandResult {
                    request_id,
                    destination,
                    success: true,
                    payload,
                    error_reason: None,
                    error_code: None,
                })
            }
            RpcReply::Error(body) if body.code.is_unreachable() => {
                warn!(request_id = %request_id, code = body.code.code(), state = %CommandState::Unreachable, "Participant unreachable");
                Err(RpcError::unreachable(Some(&destination), body.message))
            }
            RpcReply::Error(body) if body.code.is_timeout() => {
                warn!(request_id = %request_id, code = body.code.code(), state = %CommandState::TimedOut, "Participant reported a timeout");
                Err(RpcError::Timeout { method, after: timeout })
            }
            RpcReply::Error(body) => {
                warn!(
                    request_id = %request_id,
                    method = %method,
                    code = body.code.code(),
                    reason = %body.message,
                    "Remote command rejected"
                );
                Ok(RemoteCommandResult {
                    request_id,
                    destination,
                    success: false,
                    payload: body.data.clone().unwrap_or_default(),
                    error_reason: Some(body.message),
                    error_code: Some(body.code),
                })
            }
        }
    }
}

impl Drop for RemoteCommandChannel {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Fail every pending command matching `orphaned` with `RecipientDisconnected`.
fn fail_pending(pending: &PendingMap, orphaned: impl Fn(&PendingRequest) -> bool) {
    let mut pending = lock(pending);
    let ids: Vec<Uuid> = pending
        .iter()
        .filter(|(_, p)| orphaned(*p))
        .map(|(id, _)| *id)
        .collect();
    for request_id in ids {
        if let Some(request) = pending.remove(&request_id) {
            debug!(
                request_id = %request_id,
                method = %request.method,
                destination = %request.destination,
                "Failing command to departed participant"
            );
            let _ = request.reply_tx.send(RpcReply::Error(RpcErrorBody::from_code(
                RpcResultCode::RecipientDisconnected,
            )));
        }
    }
}

async fn dispatch(
    mut events: mpsc::Receiver<PeerEvent>,
    peers: PeerDirectory,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        match event {
            PeerEvent::Joined(identity) => {
                info!(participant = %identity, "Participant joined");
                peers.join(identity);
            }
            PeerEvent::Left(identity) => {
                info!(participant = %identity, "Participant left");
                peers.leave(&identity);
                fail_pending(&pending, |request| request.destination == identity);
            }
            PeerEvent::Response { from, response } => {
                let mut pending = lock(&pending);
                let expected = pending
                    .get(&response.request_id)
                    .map(|request| request.destination.clone());
                match expected {
                    Some(destination) if destination == from => {
                        if let Some(request) = pending.remove(&response.request_id) {
                            let _ = request.reply_tx.send(response.result);
                        }
                    }
                    Some(destination) => {
                        warn!(
                            request_id = %response.request_id,
                            expected = %destination,
                            from = %from,
                            "Discarding reply from unexpected participant"
                        );
                    }
                    None => {
                        debug!(request_id = %response.request_id, from = %from, "Discarding late or unknown reply");
                    }
                }
            }
        }
    }

    // Flag first: a send that registers after the drain must observe it.
    closed.store(true, Ordering::Release);
    let departed = peers.snapshot();
    peers.clear();
    fail_pending(&pending, |_| true);
    warn!(participants = departed.len(), "Peer event stream ended, channel closed");
}
