// LED control on the connected dev board

use crate::error::HandlerError;
use crate::session::ToolContext;
use crate::tools::{ensure_acknowledged, Tool};
use std::fmt;
use voicectl_core::{
    ChoiceParam, Constraint, ParamSpec, ParameterSchema, SchemaValidationError, ValidatedArguments,
};

/// RPC method that sets the RGB LED color
pub const SET_LED_COLOR: &str = "set_led_color";

/// RPC method that switches one discrete LED
pub const SET_LED_STATE: &str = "set_led_state";

/// An RGB color with 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Wire form understood by the board: `"R,G,B"` in decimal.
    pub fn to_payload(&self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        let mut parts = payload.split(',').map(|p| p.trim().parse::<u8>());
        let color = match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(r)), Some(Ok(g)), Some(Ok(b))) => Self::new(r, g, b),
            _ => return None,
        };
        parts.next().is_none().then_some(color)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

fn color_channel(arguments: &ValidatedArguments, name: &str) -> Result<u8, SchemaValidationError> {
    let value = arguments.integer(name)?;
    u8::try_from(value).map_err(|_| {
        SchemaValidationError::new(
            name,
            Constraint::OutOfRange {
                value: value as f64,
                min: Some(0.0),
                max: Some(255.0),
            },
        )
    })
}

/// Sets the color of the board's RGB LED.
pub struct SetLedStateTool {
    parameters: ParameterSchema,
}

impl SetLedStateTool {
    const ACTION: &'static str = "change the LED color";

    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::new(vec![
                ParamSpec::integer("colorR", "The red component of the LED color (0-255)")
                    .between(0, 255),
                ParamSpec::integer("colorG", "The green component of the LED color (0-255)")
                    .between(0, 255),
                ParamSpec::integer("colorB", "The blue component of the LED color (0-255)")
                    .between(0, 255),
            ]),
        }
    }
}

impl Default for SetLedStateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for SetLedStateTool {
    fn name(&self) -> &'static str {
        "setLedState"
    }

    fn description(&self) -> &'static str {
        "Called when the user asks to turn on or off the LED light."
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: ValidatedArguments,
    ) -> Result<String, HandlerError> {
        let color = Rgb::new(
            color_channel(&arguments, "colorR")?,
            color_channel(&arguments, "colorG")?,
            color_channel(&arguments, "colorB")?,
        );
        tracing::info!(session_id = %ctx.session_id(), color = %color, "Setting LED color");

        let result = ctx
            .send_command(SET_LED_COLOR, color.to_payload(), None)
            .await
            .map_err(|e| HandlerError::remote(Self::ACTION, e))?;
        ensure_acknowledged(Self::ACTION, result)?;

        Ok("The LED color has been changed.".to_string())
    }
}

/// One of the board's fixed-color discrete LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardLed {
    Red,
    Blue,
}

impl ChoiceParam for BoardLed {
    const VALUES: &'static [&'static str] = &["red", "blue"];

    fn from_choice(value: &str) -> Option<Self> {
        match value {
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }

    fn as_choice(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
        }
    }
}

/// Switches a discrete on-board LED on or off.
///
/// The board cannot report LED state back, so the result only echoes what
/// was requested.
pub struct SwitchLedTool {
    parameters: ParameterSchema,
}

impl SwitchLedTool {
    const ACTION: &'static str = "set the LED state";

    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::new(vec![
                ParamSpec::choice::<BoardLed>("led", "Which LED to set the state of."),
                ParamSpec::boolean("state", "The state to set the LED to (i.e. on or off)."),
            ]),
        }
    }
}

impl Default for SwitchLedTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for SwitchLedTool {
    fn name(&self) -> &'static str {
        "switchLed"
    }

    fn description(&self) -> &'static str {
        "Set the state of an on-board LED."
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: ValidatedArguments,
    ) -> Result<String, HandlerError> {
        let led: BoardLed = arguments.choice("led")?;
        let state = arguments.boolean("state")?;
        let payload = serde_json::json!({ "color": led.as_choice(), "state": state }).to_string();

        let result = ctx
            .send_command(SET_LED_STATE, payload, None)
            .await
            .map_err(|e| HandlerError::remote(Self::ACTION, e))?;
        ensure_acknowledged(Self::ACTION, result)?;

        let state = if state { "on" } else { "off" };
        Ok(format!("The {} LED is now {}.", led.as_choice(), state))
    }
}
