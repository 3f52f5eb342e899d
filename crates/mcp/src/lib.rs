// Tool dispatch for the voicectl voice agent
// Exposes the tool catalog to the audio session loop over JSON-RPC

pub mod device;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use error::{HandlerError, ToolError};
pub use executor::{ToolCallRequest, ToolExecutor, ToolOutcome};
pub use server::McpServer;
pub use session::{SessionContext, ToolContext};
