// Simulated dev board
//
// Stands in for the real board when no hardware is attached. It joins the
// session as an ordinary peer, so commands still go through the remote
// command channel.

use crate::tools::board::GET_CPU_TEMP;
use crate::tools::led::{Rgb, SET_LED_COLOR, SET_LED_STATE};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use voicectl_core::ParticipantIdentity;
use voicectl_rpc::{LoopbackTransport, RpcErrorBody, RpcInvocation, RpcMethodRouter, RpcResult};

#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub color: Rgb,
    pub red_led: bool,
    pub blue_led: bool,
    pub cpu_temp: f64,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            color: Rgb::new(0, 0, 0),
            red_led: false,
            blue_led: false,
            cpu_temp: 42.5,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LedStateCommand {
    color: String,
    state: bool,
}

/// In-process dev board answering the LED and temperature methods
#[derive(Debug, Clone, Default)]
pub struct SimulatedBoard {
    state: Arc<Mutex<BoardState>>,
    received: Arc<Mutex<Vec<RpcInvocation>>>,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> BoardState {
        self.lock_state().clone()
    }

    pub fn set_cpu_temp(&self, celsius: f64) {
        self.lock_state().cpu_temp = celsius;
    }

    /// Every invocation the board has seen, oldest first.
    pub fn received(&self) -> Vec<RpcInvocation> {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, invocation: &RpcInvocation) {
        tracing::debug!(
            method = %invocation.method,
            payload = %invocation.payload,
            caller = %invocation.caller,
            "Simulated board received command"
        );
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());
    }

    fn set_led_color(&self, invocation: RpcInvocation) -> Result<String, RpcErrorBody> {
        self.record(&invocation);
        let color = Rgb::from_payload(&invocation.payload).ok_or_else(|| {
            RpcErrorBody::application("invalid color payload").with_data(invocation.payload.clone())
        })?;
        self.lock_state().color = color;
        Ok(String::new())
    }

    fn set_led_state(&self, invocation: RpcInvocation) -> Result<String, RpcErrorBody> {
        self.record(&invocation);
        let command: LedStateCommand = serde_json::from_str(&invocation.payload)
            .map_err(|e| RpcErrorBody::application(format!("invalid LED state payload: {}", e)))?;
        let mut state = self.lock_state();
        match command.color.as_str() {
            "red" => state.red_led = command.state,
            "blue" => state.blue_led = command.state,
            other => return Err(RpcErrorBody::application(format!("no {} LED on this board", other))),
        }
        Ok(String::new())
    }

    fn get_cpu_temp(&self, invocation: RpcInvocation) -> Result<String, RpcErrorBody> {
        self.record(&invocation);
        Ok(format!("{:.2}", self.lock_state().cpu_temp))
    }

    /// Method table of the board.
    pub fn router(&self) -> RpcResult<RpcMethodRouter> {
        let mut router = RpcMethodRouter::new();

        let board = self.clone();
        router.register(SET_LED_COLOR, move |invocation: RpcInvocation| {
            let reply = board.set_led_color(invocation);
            async move { reply }
        })?;

        let board = self.clone();
        router.register(SET_LED_STATE, move |invocation: RpcInvocation| {
            let reply = board.set_led_state(invocation);
            async move { reply }
        })?;

        let board = self.clone();
        router.register(GET_CPU_TEMP, move |invocation: RpcInvocation| {
            let reply = board.get_cpu_temp(invocation);
            async move { reply }
        })?;

        Ok(router)
    }

    /// Join the session on `transport` as `identity`.
    pub async fn attach(&self, transport: &LoopbackTransport, identity: ParticipantIdentity) -> RpcResult<()> {
        let router = self.router()?;
        transport.connect_peer(identity, Arc::new(router)).await;
        Ok(())
    }
}
