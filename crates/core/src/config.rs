// voicectl configuration, loaded from a TOML file

use crate::budget::DEFAULT_MAX_TOOL_CALLS_PER_TURN;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest request or response payload accepted by the remote peer, in bytes
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 15 * 1024;

/// How long a remote command waits for the peer's reply by default
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoicectlConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// System instructions handed to the language model
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// First utterance of a new session
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_agent_name() -> String {
    "voicectl".to_string()
}

fn default_instructions() -> String {
    "You are a helpful voice assistant. You can check the weather, switch the lights \
     in the house, and control the LEDs on the connected dev board. Keep your answers \
     short and conversational."
        .to_string()
}

fn default_greeting() -> String {
    "Hi! How can I help you today?".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            instructions: default_instructions(),
            greeting: default_greeting(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls_per_turn: u32,
}

fn default_max_tool_calls() -> u32 {
    DEFAULT_MAX_TOOL_CALLS_PER_TURN
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_calls_per_turn: default_max_tool_calls(),
        }
    }
}

/// Which peer receives a remote command when none is named explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSelection {
    /// Earliest-joined peer that is still connected
    #[default]
    FirstConnected,
    /// Refuse to send without an explicit destination
    ExplicitOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default)]
    pub peer_selection: PeerSelection,

    /// Identity of the peer that receives device commands
    #[serde(default)]
    pub destination: Option<String>,
}

fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            peer_selection: PeerSelection::default(),
            destination: None,
        }
    }
}

impl RpcConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process simulated dev board
    #[default]
    Simulated,
    /// WebSocket relay shared with the real peers
    #[serde(rename = "websocket")]
    WebSocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// Relay endpoint, required for the websocket transport
    #[serde(default)]
    pub url: Option<String>,

    /// Identity the agent joins the session with
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Identity of the simulated board
    #[serde(default = "default_board_identity")]
    pub board_identity: String,
}

fn default_identity() -> String {
    "voicectl-agent".to_string()
}

fn default_board_identity() -> String {
    "esp32-board".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            url: None,
            identity: default_identity(),
            board_identity: default_board_identity(),
        }
    }
}

impl VoicectlConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. Call [`validate`](Self::validate) once any overrides
    /// have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content =
                std::fs::read_to_string(path).context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!(path = %path.display(), "Configuration file not found, using defaults");
            Self::default()
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.max_tool_calls_per_turn == 0 {
            bail!("session.max_tool_calls_per_turn must be greater than zero");
        }
        if self.rpc.response_timeout_ms == 0 {
            bail!("rpc.response_timeout_ms must be greater than zero");
        }
        if self.rpc.max_payload_bytes == 0 {
            bail!("rpc.max_payload_bytes must be greater than zero");
        }
        if self.transport.kind == TransportKind::WebSocket && self.transport.url.is_none() {
            bail!("transport.url is required for the websocket transport");
        }
        Ok(())
    }
}
