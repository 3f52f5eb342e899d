// Core types for the voicectl tool-dispatch agent

pub mod budget;
pub mod config;
pub mod schema;
pub mod types;

pub use budget::{BudgetExhausted, SessionCallBudget, DEFAULT_MAX_TOOL_CALLS_PER_TURN};
pub use config::{PeerSelection, TransportKind, VoicectlConfig};
pub use schema::{
    ArgValue, ChoiceParam, Constraint, ParamKind, ParamSpec, ParameterSchema,
    SchemaValidationError, ValidatedArguments,
};
pub use types::*;
