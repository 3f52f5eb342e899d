// Tool call execution under the per-turn call budget

use crate::error::ToolError;
use crate::session::{SessionContext, ToolContext};
use crate::tools::{Tool, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voicectl_core::ValidatedArguments;

/// A tool invocation as issued by the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Text result of a call, successful or not, ready for the session loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub text: String,
    pub is_error: bool,
}

/// Runs tool calls against the shared registry
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Everything that happens before the handler: cancellation and budget
    /// checks, tool lookup and argument validation. Every admitted attempt
    /// costs one unit of budget, including ones that fail lookup or validation.
    fn admit(
        &self,
        session: &mut SessionContext,
        request: &ToolCallRequest,
    ) -> Result<(Arc<dyn Tool>, ValidatedArguments), ToolError> {
        if session.is_ended() {
            return Err(ToolError::Cancelled {
                tool: request.tool_name.clone(),
            });
        }

        session
            .budget_mut()
            .try_consume()
            .map_err(|e| ToolError::CallBudgetExceeded { limit: e.limit })?;

        let tool = self.registry.lookup(&request.tool_name)?;
        let arguments = tool
            .parameters()
            .validate(&request.arguments)
            .map_err(|source| ToolError::SchemaValidation {
                tool: request.tool_name.clone(),
                source,
            })?;

        info!(
            session_id = %session.id(),
            turn = session.turn(),
            tool = tool.name(),
            used = session.budget().used(),
            limit = session.budget().limit(),
            "Executing tool"
        );
        Ok((tool, arguments))
    }

    async fn run(
        tool: Arc<dyn Tool>,
        ctx: ToolContext,
        arguments: ValidatedArguments,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let name = tool.name();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(tool = name, "Tool call abandoned");
                Err(ToolError::Cancelled { tool: name.to_string() })
            }
            result = tool.execute(&ctx, arguments) => {
                result.map_err(|source| ToolError::Handler { tool: name.to_string(), source })
            }
        }
    }

    /// Execute one tool call.
    pub async fn execute(
        &self,
        session: &mut SessionContext,
        request: ToolCallRequest,
    ) -> Result<String, ToolError> {
        let (tool, arguments) = self.admit(session, &request)?;
        Self::run(tool, session.tool_context(), arguments, session.cancel_token()).await
    }

    /// Execute several calls issued in one model step.
    ///
    /// Calls are admitted against the budget in request order, then the
    /// admitted handlers run concurrently. Results keep the request order.
    pub async fn execute_batch(
        &self,
        session: &mut SessionContext,
        requests: Vec<ToolCallRequest>,
    ) -> Vec<Result<String, ToolError>> {
        let admitted: Vec<_> = requests
            .iter()
            .map(|request| self.admit(session, request))
            .collect();
        let ctx = session.tool_context();
        let cancel = session.cancel_token();

        let calls = admitted.into_iter().map(|admission| {
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            async move {
                match admission {
                    Ok((tool, arguments)) => Self::run(tool, ctx, arguments, cancel).await,
                    Err(e) => Err(e),
                }
            }
        });
        futures::future::join_all(calls).await
    }

    /// Execute one call and fold any failure into a textual result.
    pub async fn respond(&self, session: &mut SessionContext, request: ToolCallRequest) -> ToolOutcome {
        let tool_name = request.tool_name.clone();
        match self.execute(session, request).await {
            Ok(text) => ToolOutcome {
                tool_name,
                text,
                is_error: false,
            },
            Err(e) => {
                warn!(
                    session_id = %session.id(),
                    tool = %tool_name,
                    kind = e.kind(),
                    error = %e,
                    "Tool call failed"
                );
                ToolOutcome {
                    tool_name,
                    text: e.user_message(),
                    is_error: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBoard;
    use crate::error::HandlerError;
    use crate::tools::Rgb;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use voicectl_core::{ParamSpec, ParameterSchema, ParticipantIdentity};
    use voicectl_rpc::{
        ChannelConfig, LoopbackTransport, RemoteCommandChannel, RpcError, RpcErrorBody,
        RpcInvocation, RpcMethodRouter,
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn board_id() -> ParticipantIdentity {
        ParticipantIdentity::new("esp32-board")
    }

    struct Harness {
        transport: Arc<LoopbackTransport>,
        channel: Arc<RemoteCommandChannel>,
        executor: ToolExecutor,
    }

    impl Harness {
        fn new(registry: ToolRegistry) -> Self {
            let (transport, events) = LoopbackTransport::new("voicectl-agent".into());
            let transport = Arc::new(transport);
            let channel = Arc::new(RemoteCommandChannel::new(
                transport.clone(),
                events,
                ChannelConfig::default(),
            ));
            Self {
                transport,
                channel,
                executor: ToolExecutor::new(Arc::new(registry)),
            }
        }

        fn builtin() -> Self {
            Self::new(ToolRegistry::builtin().unwrap())
        }

        async fn with_board(self) -> (Self, SimulatedBoard) {
            let board = SimulatedBoard::new();
            board.attach(&self.transport, board_id()).await.unwrap();
            self.channel.wait_for_participant(&board_id(), WAIT).await.unwrap();
            (self, board)
        }

        async fn with_peer(self, router: RpcMethodRouter) -> Self {
            self.transport.connect_peer(board_id(), Arc::new(router)).await;
            self.channel.wait_for_participant(&board_id(), WAIT).await.unwrap();
            self
        }

        fn session(&self) -> SessionContext {
            let mut session = SessionContext::new(self.channel.clone(), 5);
            session.begin_turn();
            session
        }
    }

    /// Counts how often its handler actually runs.
    struct CountingTool {
        calls: Arc<AtomicUsize>,
        parameters: ParameterSchema,
    }

    impl CountingTool {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                calls,
                parameters: ParameterSchema::new(vec![ParamSpec::integer("n", "a number").between(0, 10)]),
            }
        }
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &'static str {
            "count"
        }

        fn description(&self) -> &'static str {
            "Counts invocations."
        }

        fn parameters(&self) -> &ParameterSchema {
            &self.parameters
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            arguments: ValidatedArguments,
        ) -> Result<String, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("counted {}", arguments.integer("n")?))
        }
    }

    /// Never finishes on its own.
    struct StallTool {
        parameters: ParameterSchema,
    }

    #[async_trait::async_trait]
    impl Tool for StallTool {
        fn name(&self) -> &'static str {
            "stall"
        }

        fn description(&self) -> &'static str {
            "Waits forever."
        }

        fn parameters(&self) -> &ParameterSchema {
            &self.parameters
        }

        async fn execute(
            &self,
            _ctx: &ToolContext,
            _arguments: ValidatedArguments,
        ) -> Result<String, HandlerError> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    fn counting_harness() -> (Harness, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(CountingTool::new(calls.clone())))
            .unwrap();
        (Harness::new(registry), calls)
    }

    #[tokio::test]
    async fn test_led_color_end_to_end() {
        let (harness, board) = Harness::builtin().with_board().await;
        let mut session = harness.session();

        let text = harness
            .executor
            .execute(
                &mut session,
                ToolCallRequest::new("setLedState", json!({"colorR": 255, "colorG": 0, "colorB": 0})),
            )
            .await
            .unwrap();

        assert_eq!(text, "The LED color has been changed.");
        let received = board.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, "set_led_color");
        assert_eq!(received[0].payload, "255,0,0");
        assert_eq!(received[0].caller.as_str(), "voicectl-agent");
        assert_eq!(board.state().color, Rgb::new(255, 0, 0));
    }

    #[tokio::test]
    async fn test_toggle_light_in_kitchen() {
        let harness = Harness::builtin();
        let mut session = harness.session();

        let text = harness
            .executor
            .execute(
                &mut session,
                ToolCallRequest::new("toggleLight", json!({"room": "kitchen", "switchTo": "on"})),
            )
            .await
            .unwrap();
        assert_eq!(text, "The light in the kitchen is now on.");
    }

    #[tokio::test]
    async fn test_weather_answer() {
        let harness = Harness::builtin();
        let mut session = harness.session();

        let text = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("getWeather", json!({"location": "Lisbon"})))
            .await
            .unwrap();
        assert_eq!(text, "The weather in Lisbon is sunny today.");
    }

    #[tokio::test]
    async fn test_sixth_call_in_a_turn_is_refused() {
        let (harness, calls) = counting_harness();
        let mut session = harness.session();

        for n in 0..5 {
            let result = harness
                .executor
                .execute(&mut session, ToolCallRequest::new("count", json!({"n": n})))
                .await;
            assert_eq!(result.unwrap(), format!("counted {}", n));
        }

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("count", json!({"n": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::CallBudgetExceeded { limit: 5 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        session.begin_turn();
        assert!(harness
            .executor
            .execute(&mut session, ToolCallRequest::new("count", json!({"n": 1})))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_handler() {
        let (harness, calls) = counting_harness();
        let mut session = harness.session();

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("count", json!({"n": 11})))
            .await
            .unwrap_err();
        match err {
            ToolError::SchemaValidation { tool, source } => {
                assert_eq!(tool, "count");
                assert_eq!(source.field, "n");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("count", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::SchemaValidation { .. }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Rejected attempts still count against the turn.
        assert_eq!(session.budget().used(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_runs_a_handler() {
        let (harness, calls) = counting_harness();
        let mut session = harness.session();

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("openGarage", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "openGarage"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_led_without_peer_reports_failure() {
        let harness = Harness::builtin();
        let mut session = harness.session();
        let request =
            ToolCallRequest::new("setLedState", json!({"colorR": 255, "colorG": 0, "colorB": 0}));

        let err = harness
            .executor
            .execute(&mut session, request.clone())
            .await
            .unwrap_err();
        match &err {
            ToolError::Handler { tool, source } => {
                assert_eq!(tool, "setLedState");
                assert!(source.is_remote_unreachable());
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let outcome = harness.executor.respond(&mut session, request).await;
        assert!(outcome.is_error);
        assert!(outcome.text.contains("could not be completed"));
        assert_ne!(outcome.text, "The LED color has been changed.");
    }

    #[tokio::test]
    async fn test_peer_rejection_is_a_handler_error() {
        let mut router = RpcMethodRouter::new();
        router
            .register("set_led_color", |_inv: RpcInvocation| async move {
                Err(RpcErrorBody::application("LED driver busy"))
            })
            .unwrap();
        let harness = Harness::builtin().with_peer(router).await;
        let mut session = harness.session();

        let outcome = harness
            .executor
            .respond(
                &mut session,
                ToolCallRequest::new("setLedState", json!({"colorR": 1, "colorG": 2, "colorB": 3})),
            )
            .await;
        assert!(outcome.is_error);
        assert!(outcome.text.contains("LED driver busy"));
        assert!(outcome.text.contains("could not be completed"));
    }

    #[tokio::test]
    async fn test_switch_led_sends_json_payload() {
        let (harness, board) = Harness::builtin().with_board().await;
        let mut session = harness.session();

        let text = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("switchLed", json!({"led": "red", "state": true})))
            .await
            .unwrap();

        assert_eq!(text, "The red LED is now on.");
        let received = board.received();
        assert_eq!(received[0].method, "set_led_state");
        let payload: serde_json::Value = serde_json::from_str(&received[0].payload).unwrap();
        assert_eq!(payload, json!({"color": "red", "state": true}));
        assert!(board.state().red_led);
    }

    #[tokio::test]
    async fn test_cpu_temperature() {
        let (harness, board) = Harness::builtin().with_board().await;
        board.set_cpu_temp(47.8);
        let mut session = harness.session();

        let text = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("getCpuTemp", serde_json::Value::Null))
            .await
            .unwrap();
        assert_eq!(text, "The CPU temperature is 47.8 degrees Celsius.");
    }

    #[tokio::test]
    async fn test_cpu_temperature_rejects_garbage() {
        let mut router = RpcMethodRouter::new();
        router
            .register("get_cpu_temp", |_inv: RpcInvocation| async move { Ok("hot".to_string()) })
            .unwrap();
        let harness = Harness::builtin().with_peer(router).await;
        let mut session = harness.session();

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("getCpuTemp", json!({})))
            .await
            .unwrap_err();
        match err {
            ToolError::Handler { source, .. } => {
                assert!(matches!(source, HandlerError::InvalidResponse { .. }));
                assert!(source.to_string().contains("received invalid temperature value"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cpu_temperature_times_out() {
        let mut router = RpcMethodRouter::new();
        router
            .register("get_cpu_temp", |_inv: RpcInvocation| async move {
                std::future::pending::<()>().await;
                Ok(String::new())
            })
            .unwrap();
        let harness = Harness::builtin().with_peer(router).await;
        let mut session = harness.session();

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("getCpuTemp", json!({})))
            .await
            .unwrap_err();
        match err {
            ToolError::Handler {
                source: HandlerError::Remote { source: RpcError::Timeout { method, after }, .. },
                ..
            } => {
                assert_eq!(method, "get_cpu_temp");
                assert_eq!(after, Duration::from_secs(10));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(harness.channel.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_identical_commands_are_independent() {
        let (harness, board) = Harness::builtin().with_board().await;
        let mut session = harness.session();
        let request =
            ToolCallRequest::new("setLedState", json!({"colorR": 0, "colorG": 0, "colorB": 255}));

        let first = harness.executor.execute(&mut session, request.clone()).await;
        let second = harness.executor.execute(&mut session, request).await;

        assert_eq!(first.unwrap(), "The LED color has been changed.");
        assert_eq!(second.unwrap(), "The LED color has been changed.");
        let received = board.received();
        assert_eq!(received.len(), 2);
        assert_ne!(received[0].request_id, received[1].request_id);
    }

    #[tokio::test]
    async fn test_ended_session_refuses_calls() {
        let (harness, calls) = counting_harness();
        let mut session = harness.session();
        session.end();

        let err = harness
            .executor
            .execute(&mut session, ToolCallRequest::new("count", json!({"n": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.budget().used(), 0);
    }

    #[tokio::test]
    async fn test_ending_session_abandons_in_flight_call() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StallTool {
                parameters: ParameterSchema::empty(),
            }))
            .unwrap();
        let harness = Harness::new(registry);
        let mut session = harness.session();
        let cancel = session.cancel_token();

        let (result, _) = tokio::join!(
            harness
                .executor
                .execute(&mut session, ToolCallRequest::new("stall", json!({}))),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cancel.cancel();
            }
        );
        assert!(matches!(result, Err(ToolError::Cancelled { tool }) if tool == "stall"));
    }

    #[tokio::test]
    async fn test_batch_respects_budget_and_order() {
        let (harness, calls) = counting_harness();
        let mut session = SessionContext::new(harness.channel.clone(), 2);
        session.begin_turn();

        let results = harness
            .executor
            .execute_batch(
                &mut session,
                vec![
                    ToolCallRequest::new("count", json!({"n": 1})),
                    ToolCallRequest::new("count", json!({"n": 2})),
                    ToolCallRequest::new("count", json!({"n": 3})),
                ],
            )
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "counted 1");
        assert_eq!(results[1].as_ref().unwrap(), "counted 2");
        assert!(matches!(results[2], Err(ToolError::CallBudgetExceeded { limit: 2 })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_respond_explains_invalid_arguments() {
        let harness = Harness::builtin();
        let mut session = harness.session();

        let outcome = harness
            .executor
            .respond(
                &mut session,
                ToolCallRequest::new("setLedState", json!({"colorR": 300, "colorG": 0, "colorB": 0})),
            )
            .await;
        assert!(outcome.is_error);
        assert_eq!(outcome.tool_name, "setLedState");
        assert!(outcome.text.contains("colorR"));
    }
}
