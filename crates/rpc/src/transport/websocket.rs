//! WebSocket transport to a relay that forwards frames between participants.

use super::{PeerEvent, PeerTransport};
use crate::error::{RpcError, RpcResult};
use crate::protocol::{RpcReply, RpcRequest, RpcResponse, RpcResultCode};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;
use voicectl_core::ParticipantIdentity;

/// Frames exchanged with the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    Request {
        from: ParticipantIdentity,
        to: ParticipantIdentity,
        request: RpcRequest,
    },
    Response {
        from: ParticipantIdentity,
        to: ParticipantIdentity,
        response: RpcResponse,
    },
    ParticipantJoined {
        identity: ParticipantIdentity,
    },
    ParticipantLeft {
        identity: ParticipantIdentity,
    },
}

/// WebSocket connection to the session relay.
pub struct WebSocketTransport {
    local: ParticipantIdentity,
    outgoing: mpsc::Sender<WireFrame>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect to the relay at `url`, joining as `identity`.
    pub async fn connect(
        url: &Url,
        identity: ParticipantIdentity,
    ) -> RpcResult<(Self, mpsc::Receiver<PeerEvent>)> {
        let ws_url = build_ws_url(url, &identity)?;
        debug!(url = %ws_url, "Connecting to relay");

        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        // Frames going out to the relay
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<WireFrame>(32);

        // Events coming back from the relay
        let (event_tx, event_rx) = mpsc::channel::<PeerEvent>(128);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(e) => {
                        error!(error = %e, "Failed to serialize frame");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    error!(error = %e, "Failed to send WebSocket message");
                    break;
                }
            }
        });

        let local = identity.clone();
        let replies = outgoing_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let frame = match serde_json::from_str::<WireFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "Ignoring malformed frame");
                                continue;
                            }
                        };
                        match route_frame(frame, &local) {
                            Inbound::Event(event) => {
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Inbound::Reply(reply) => {
                                if replies.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Inbound::Ignore => {}
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        debug!("Received ping");
                    }
                    Ok(Message::Close(_)) => {
                        info!("Relay connection closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Relay connection failed");
                        break;
                    }
                    _ => {}
                }
            }
        });

        info!(identity = %identity, "Connected to relay");
        let transport = Self {
            local: identity,
            outgoing: outgoing_tx,
            writer,
            reader,
        };
        Ok((transport, event_rx))
    }
}

/// What the reader does with one frame from the relay.
#[derive(Debug, PartialEq)]
enum Inbound {
    Event(PeerEvent),
    Reply(WireFrame),
    Ignore,
}

fn route_frame(frame: WireFrame, local: &ParticipantIdentity) -> Inbound {
    match frame {
        WireFrame::ParticipantJoined { identity } | WireFrame::ParticipantLeft { identity }
            if identity == *local =>
        {
            debug!(identity = %identity, "Ignoring membership frame for ourselves");
            Inbound::Ignore
        }
        WireFrame::ParticipantJoined { identity } => Inbound::Event(PeerEvent::Joined(identity)),
        WireFrame::ParticipantLeft { identity } => Inbound::Event(PeerEvent::Left(identity)),
        WireFrame::Response { from, to, response } if to == *local => {
            Inbound::Event(PeerEvent::Response { from, response })
        }
        WireFrame::Response { to, .. } => {
            debug!(to = %to, "Ignoring response addressed to another participant");
            Inbound::Ignore
        }
        // The agent exposes no methods of its own.
        WireFrame::Request { from, request, .. } => Inbound::Reply(WireFrame::Response {
            from: local.clone(),
            to: from,
            response: RpcResponse::new(
                request.id,
                RpcReply::error(
                    RpcResultCode::UnsupportedMethod,
                    format!("method `{}` is not supported", request.method),
                ),
            ),
        }),
    }
}

/// Normalise the scheme to ws/wss and pass the identity as a query parameter.
fn build_ws_url(base: &Url, identity: &ParticipantIdentity) -> RpcResult<Url> {
    let mut url = base.clone();
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RpcError::Transport(format!(
                "unsupported relay URL scheme `{}`",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RpcError::Transport("Failed to set WebSocket scheme".to_string()))?;
    url.query_pairs_mut().append_pair("identity", identity.as_str());
    Ok(url)
}

#[async_trait::async_trait]
impl PeerTransport for WebSocketTransport {
    fn local_identity(&self) -> &ParticipantIdentity {
        &self.local
    }

    async fn send_request(
        &self,
        destination: &ParticipantIdentity,
        request: &RpcRequest,
    ) -> RpcResult<()> {
        let frame = WireFrame::Request {
            from: self.local.clone(),
            to: destination.clone(),
            request: request.clone(),
        };
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| RpcError::Transport("relay connection is closed".to_string()))
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
