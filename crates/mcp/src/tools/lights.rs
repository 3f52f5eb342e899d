// Room lights

use crate::error::HandlerError;
use crate::session::ToolContext;
use crate::tools::Tool;
use std::fmt;
use voicectl_core::{ChoiceParam, ParamSpec, ParameterSchema, ValidatedArguments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Room {
    Bedroom,
    LivingRoom,
    Kitchen,
    Bathroom,
    Office,
}

impl ChoiceParam for Room {
    const VALUES: &'static [&'static str] =
        &["bedroom", "living room", "kitchen", "bathroom", "office"];

    fn from_choice(value: &str) -> Option<Self> {
        match value {
            "bedroom" => Some(Self::Bedroom),
            "living room" => Some(Self::LivingRoom),
            "kitchen" => Some(Self::Kitchen),
            "bathroom" => Some(Self::Bathroom),
            "office" => Some(Self::Office),
            _ => None,
        }
    }

    fn as_choice(&self) -> &'static str {
        match self {
            Self::Bedroom => "bedroom",
            Self::LivingRoom => "living room",
            Self::Kitchen => "kitchen",
            Self::Bathroom => "bathroom",
            Self::Office => "office",
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_choice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    On,
    Off,
}

impl ChoiceParam for SwitchState {
    const VALUES: &'static [&'static str] = &["on", "off"];

    fn from_choice(value: &str) -> Option<Self> {
        match value {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    fn as_choice(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_choice())
    }
}

/// Switches the light in one room. No device is attached; the switch is
/// acknowledged immediately.
pub struct ToggleLightTool {
    parameters: ParameterSchema,
}

impl ToggleLightTool {
    pub fn new() -> Self {
        Self {
            parameters: ParameterSchema::new(vec![
                ParamSpec::choice::<Room>("room", "The room to turn the light in"),
                ParamSpec::choice::<SwitchState>("switchTo", "The state to turn the light to"),
            ]),
        }
    }
}

impl Default for ToggleLightTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for ToggleLightTool {
    fn name(&self) -> &'static str {
        "toggleLight"
    }

    fn description(&self) -> &'static str {
        "Called when the user asks to turn on or off the light."
    }

    fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    async fn execute(
        &self,
        _ctx: &ToolContext,
        arguments: ValidatedArguments,
    ) -> Result<String, HandlerError> {
        let room: Room = arguments.choice("room")?;
        let switch_to: SwitchState = arguments.choice("switchTo")?;
        tracing::debug!(room = %room, state = %switch_to, "Switching light");
        Ok(format!("The light in the {} is now {}.", room, switch_to))
    }
}
