// Per-session state threaded through every tool call

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use voicectl_core::{ParticipantIdentity, SessionCallBudget, SessionId};
use voicectl_rpc::{RemoteCommand, RemoteCommandChannel, RemoteCommandResult, RpcResult};

/// One live conversation between a user and the agent.
///
/// Owns the per-turn call budget and the cancellation token that ends the
/// session. Nothing here is shared with other sessions except the channel.
pub struct SessionContext {
    id: SessionId,
    turn: u64,
    budget: SessionCallBudget,
    destination: Option<ParticipantIdentity>,
    channel: Arc<RemoteCommandChannel>,
    cancel: CancellationToken,
}

impl SessionContext {
    pub fn new(channel: Arc<RemoteCommandChannel>, max_tool_calls_per_turn: u32) -> Self {
        let id = SessionId::new();
        tracing::info!(session_id = %id, max_tool_calls_per_turn, "Session started");
        Self {
            id,
            turn: 0,
            budget: SessionCallBudget::new(max_tool_calls_per_turn),
            destination: None,
            channel,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie the session to an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_destination(mut self, destination: Option<ParticipantIdentity>) -> Self {
        self.destination = destination;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn budget(&self) -> &SessionCallBudget {
        &self.budget
    }

    pub(crate) fn budget_mut(&mut self) -> &mut SessionCallBudget {
        &mut self.budget
    }

    pub fn destination(&self) -> Option<&ParticipantIdentity> {
        self.destination.as_ref()
    }

    /// Device commands go to `destination`, or to the channel's fallback
    /// peer when `None`.
    pub fn set_destination(&mut self, destination: Option<ParticipantIdentity>) {
        tracing::info!(
            session_id = %self.id,
            destination = ?destination.as_ref().map(ParticipantIdentity::as_str),
            "Destination changed"
        );
        self.destination = destination;
    }

    pub fn channel(&self) -> &Arc<RemoteCommandChannel> {
        &self.channel
    }

    /// Start a new user turn with a full call budget.
    pub fn begin_turn(&mut self) -> u64 {
        self.turn += 1;
        self.budget.reset();
        tracing::debug!(session_id = %self.id, turn = self.turn, "Turn started");
        self.turn
    }

    /// End the session. In-flight tool calls are abandoned.
    pub fn end(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(session_id = %self.id, turns = self.turn, "Session ended");
        }
        self.cancel.cancel();
    }

    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// What a handler gets to see of the session.
    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            session_id: self.id,
            destination: self.destination.clone(),
            channel: self.channel.clone(),
        }
    }
}

/// Handle given to tool handlers
#[derive(Clone)]
pub struct ToolContext {
    session_id: SessionId,
    destination: Option<ParticipantIdentity>,
    channel: Arc<RemoteCommandChannel>,
}

impl ToolContext {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn destination(&self) -> Option<&ParticipantIdentity> {
        self.destination.as_ref()
    }

    /// Relay a command to the session's destination peer.
    pub async fn send_command(
        &self,
        method: &str,
        payload: impl Into<String>,
        response_timeout: Option<Duration>,
    ) -> RpcResult<RemoteCommandResult> {
        let mut command = RemoteCommand::new(method, payload).to(self.destination.clone());
        if let Some(timeout) = response_timeout {
            command = command.with_timeout(timeout);
        }
        self.channel.send(command).await
    }
}
