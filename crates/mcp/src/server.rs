// JSON-RPC server the audio session loop talks to
//
// One request per line on the reader, one response per line on the writer.
// The session ends when the reader hits EOF or the session is cancelled.

use crate::executor::{ToolCallRequest, ToolExecutor};
use crate::protocol::*;
use crate::session::SessionContext;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use voicectl_core::config::AgentConfig;
use voicectl_core::ParticipantIdentity;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer {
    executor: ToolExecutor,
    agent: AgentConfig,
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

impl McpServer {
    pub fn new(executor: ToolExecutor, agent: AgentConfig) -> Self {
        Self { executor, agent }
    }

    /// Serve one session until EOF or cancellation.
    pub async fn serve<R, W>(&self, session: &mut SessionContext, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = reader;
        let mut writer = writer;
        let cancel = session.cancel_token();
        let mut line = String::new();

        info!(session_id = %session.id(), tools = self.executor.registry().len(), "Serving tool calls");

        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session cancelled");
                    break;
                }
                read = reader.read_line(&mut line) => read.context("Failed to read request")?,
            };
            if read == 0 {
                info!("Input closed");
                break;
            }
            let request = line.trim();
            if request.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(session, request).await {
                let json = serde_json::to_string(&response).context("Failed to encode response")?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        session.end();
        Ok(())
    }

    /// Handle one raw request line. Notifications produce no response.
    pub async fn handle_line(&self, session: &mut SessionContext, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Unparseable request");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()));
            }
        };
        self.handle_request(session, request).await
    }

    pub async fn handle_request(
        &self,
        session: &mut SessionContext,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            let id = request.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        debug!(method = %request.method, "Request");
        let result = self.dispatch(session, &request.method, request.params).await;

        let Some(id) = request.id else {
            if let Err(e) = result {
                debug!(method = %request.method, error = %e.message, "Notification ignored");
            }
            return None;
        };
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn dispatch(
        &self,
        session: &mut SessionContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => {
                let params: InitializeParams = params
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?
                    .unwrap_or_default();
                if let Some(client) = &params.client_info {
                    info!(client = %client.name, version = %client.version, "Client connected");
                }
                to_result(InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: false,
                        }),
                    },
                    server_info: ServerInfo {
                        name: self.agent.name.clone(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    instructions: self.agent.instructions.clone(),
                    greeting: self.agent.greeting.clone(),
                })
            }
            "notifications/initialized" => Ok(Value::Null),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(ListToolsResult {
                tools: self.executor.registry().list(),
            }),
            "tools/call" => {
                let params: CallToolParams = parse_params(params)?;
                let outcome = self
                    .executor
                    .respond(session, ToolCallRequest::new(params.name, params.arguments))
                    .await;
                to_result(CallToolResult {
                    content: vec![ToolContent::text(outcome.text)],
                    is_error: outcome.is_error,
                })
            }
            "session/beginTurn" => {
                let turn = session.begin_turn();
                to_result(BeginTurnResult {
                    turn,
                    max_tool_calls: session.budget().limit(),
                })
            }
            "session/setDestination" => {
                let params: SetDestinationParams = parse_params(params)?;
                let destination = params.identity.map(ParticipantIdentity::new);
                let connected = destination
                    .as_ref()
                    .is_some_and(|d| session.channel().is_connected(d));
                session.set_destination(destination.clone());
                to_result(SetDestinationResult {
                    destination: destination.map(|d| d.0),
                    connected,
                })
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }
}
