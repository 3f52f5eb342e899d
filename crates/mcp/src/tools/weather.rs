// Weather lookup

use crate::error::HandlerError;
use crate::session::ToolContext;
use crate::tools::Tool;
use voicectl_core::{ParamSpec, ParameterSchema, ValidatedArguments};

/// Answers weather questions. Forecasts are canned; every place is sunny.
pub struct GetWeatherTool {
    parameters: ParameterSchema,
}

impl GetWeatherTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::new(vec![ParamSpec::string(
                "location",
                "The location to get the weather for",
            )]),
        }
    }
}

impl Default for GetWeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &'static str {
        "getWeather"
    }

    fn description(&self) -> &'static str {
        "Called when the user asks about the weather."
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: ValidatedArguments,
    ) -> Result<String, HandlerError> {
        let location = arguments.text("location")?;
        Ok(format!("The weather in {} is sunny today.", location))
    }
}
