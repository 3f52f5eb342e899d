pub mod board;
pub mod led;
pub mod lights;
pub mod weather;
mod registry;

pub use board::GetCpuTempTool;
pub use led::{BoardLed, Rgb, SetLedStateTool, SwitchLedTool};
pub use lights::{Room, SwitchState, ToggleLightTool};
pub use registry::{Tool, ToolRegistry};
pub use weather::GetWeatherTool;

use crate::error::HandlerError;
use voicectl_rpc::RemoteCommandResult;

/// Turn a peer's refusal into a handler failure.
pub(crate) fn ensure_acknowledged(
    action: &'static str,
    result: RemoteCommandResult,
) -> Result<RemoteCommandResult, HandlerError> {
    if result.success {
        return Ok(result);
    }
    Err(HandlerError::Rejected {
        action,
        reason: result
            .error_reason
            .unwrap_or_else(|| "no reason given".to_string()),
    })
}
