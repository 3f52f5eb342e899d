// Dev board telemetry

use crate::error::HandlerError;
use crate::session::ToolContext;
use crate::tools::{ensure_acknowledged, Tool};
use std::time::Duration;
use voicectl_core::{ParameterSchema, ValidatedArguments};

/// RPC method returning the CPU temperature in degrees Celsius
pub const GET_CPU_TEMP: &str = "get_cpu_temp";

const CPU_TEMP_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads the board's CPU temperature.
pub struct GetCpuTempTool {
    parameters: ParameterSchema,
}

impl GetCpuTempTool {
    const ACTION: &'static str = "read the CPU temperature";

    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::empty(),
        }
    }
}

impl Default for GetCpuTempTool {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_temperature(payload: &str) -> Option<f64> {
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
}

#[async_trait::async_trait]
impl Tool for GetCpuTempTool {
    fn name(&self) -> &'static str {
        "getCpuTemp"
    }

    fn description(&self) -> &'static str {
        "Get the current temperature of the CPU in degrees Celsius."
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        _arguments: ValidatedArguments,
    ) -> Result<String, HandlerError> {
        let result = ctx
            .send_command(GET_CPU_TEMP, "", Some(CPU_TEMP_TIMEOUT))
            .await
            .map_err(|e| HandlerError::remote(Self::ACTION, e))?;
        let result = ensure_acknowledged(Self::ACTION, result)?;

        let celsius =
            parse_temperature(&result.payload).ok_or_else(|| HandlerError::InvalidResponse {
                action: Self::ACTION,
                reason: "received invalid temperature value".to_string(),
            })?;
        tracing::debug!(celsius, "CPU temperature read");

        Ok(format!("The CPU temperature is {:.1} degrees Celsius.", celsius))
    }
}
