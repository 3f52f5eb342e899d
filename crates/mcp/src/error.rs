// Tool dispatch errors

use voicectl_core::SchemaValidationError;
use voicectl_rpc::RpcError;

/// Why a tool call produced no result
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("a tool named `{0}` is already registered")]
    DuplicateToolName(String),

    #[error("invalid arguments for `{tool}`: {source}")]
    SchemaValidation {
        tool: String,
        #[source]
        source: SchemaValidationError,
    },

    #[error("tool call limit of {limit} per turn reached")]
    CallBudgetExceeded { limit: u32 },

    #[error("`{tool}` failed: {source}")]
    Handler {
        tool: String,
        #[source]
        source: HandlerError,
    },

    #[error("`{tool}` was cancelled")]
    Cancelled { tool: String },
}

impl ToolError {
    /// Text handed back to the session loop in place of a tool result.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownTool(name) => format!("There is no tool called {}.", name),
            Self::DuplicateToolName(name) => format!("The tool {} is defined twice.", name),
            Self::SchemaValidation { tool, source } => {
                format!("The arguments for {} were invalid: {}.", tool, source)
            }
            Self::CallBudgetExceeded { limit } => format!(
                "I can only take {} actions per request, so I stopped here.",
                limit
            ),
            Self::Handler { source, .. } => source.to_string(),
            Self::Cancelled { tool } => format!("The {} request was cancelled.", tool),
        }
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::DuplicateToolName(_) => "duplicate_tool_name",
            Self::SchemaValidation { .. } => "schema_validation",
            Self::CallBudgetExceeded { .. } => "call_budget_exceeded",
            Self::Handler { .. } => "handler",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Failure inside a tool handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The command could not be relayed or was never answered.
    #[error("Unable to {action}: the action could not be completed ({source})")]
    Remote {
        action: &'static str,
        #[source]
        source: RpcError,
    },

    /// The peer answered but refused the command.
    #[error("Unable to {action}: the action could not be completed (the device reported: {reason})")]
    Rejected { action: &'static str, reason: String },

    /// The peer answered with something the tool cannot interpret.
    #[error("Unable to {action}: {reason}")]
    InvalidResponse { action: &'static str, reason: String },

    #[error("invalid arguments: {0}")]
    Arguments(#[from] SchemaValidationError),
}

impl HandlerError {
    pub fn remote(action: &'static str, source: RpcError) -> Self {
        Self::Remote { action, source }
    }

    pub fn is_remote_unreachable(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_unreachable())
    }

    pub fn is_remote_timeout(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_device_failures_say_action_not_completed() {
        let err = HandlerError::remote(
            "change the LED color",
            RpcError::unreachable(None, "no remote participant is connected"),
        );
        assert!(err.is_remote_unreachable());
        assert_eq!(
            err.to_string(),
            "Unable to change the LED color: the action could not be completed \
             (remote participant is unreachable: no remote participant is connected)"
        );

        let err = HandlerError::remote(
            "read the CPU temperature",
            RpcError::Timeout {
                method: "get_cpu_temp".into(),
                after: Duration::from_secs(10),
            },
        );
        assert!(err.is_remote_timeout());
        assert!(err.to_string().contains("could not be completed"));

        let err = HandlerError::Rejected {
            action: "switch the LED",
            reason: "LED driver busy".into(),
        };
        assert!(err.to_string().contains("could not be completed"));
    }

    #[test]
    fn test_user_message_for_budget() {
        let err = ToolError::CallBudgetExceeded { limit: 5 };
        assert_eq!(
            err.user_message(),
            "I can only take 5 actions per request, so I stopped here."
        );
        assert_eq!(err.kind(), "call_budget_exceeded");
    }

    #[test]
    fn test_user_message_for_handler_is_handler_text() {
        let err = ToolError::Handler {
            tool: "setLedState".into(),
            source: HandlerError::Rejected {
                action: "change the LED color",
                reason: "busy".into(),
            },
        };
        assert!(err.user_message().starts_with("Unable to change the LED color"));
    }
}
