//! Remote command channel for voicectl.
//!
//! Relays device-control commands from the agent to one remote participant
//! (typically a dev board) and correlates the replies.

pub mod channel;
pub mod command;
pub mod error;
pub mod peers;
pub mod protocol;
pub mod router;
pub mod transport;

pub use channel::{ChannelConfig, RemoteCommandChannel};
pub use command::{CommandState, RemoteCommand, RemoteCommandResult};
pub use error::{RpcError, RpcResult};
pub use peers::PeerDirectory;
pub use protocol::{RpcErrorBody, RpcReply, RpcRequest, RpcResponse, RpcResultCode};
pub use router::{RpcInvocation, RpcMethodRouter, RpcResponder};
pub use transport::{LoopbackTransport, PeerEvent, PeerTransport, WebSocketTransport};
