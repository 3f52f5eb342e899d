// voicectl: serves the tool catalog to the audio session loop over stdio

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use url::Url;
use voicectl_core::config::{TransportKind, VoicectlConfig};
use voicectl_core::ParticipantIdentity;
use voicectl_mcp::device::SimulatedBoard;
use voicectl_mcp::tools::ToolRegistry;
use voicectl_mcp::{McpServer, SessionContext, ToolExecutor};
use voicectl_rpc::{
    ChannelConfig, LoopbackTransport, PeerTransport, RemoteCommandChannel, WebSocketTransport,
};

#[derive(Parser, Debug)]
#[command(name = "voicectl")]
#[command(about = "Tool dispatch and remote device control for a voice agent", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "voicectl.toml")]
    config: PathBuf,

    /// Peer transport: simulated board or websocket relay
    #[arg(long, value_parser = ["simulated", "websocket"])]
    transport: Option<String>,

    /// Relay URL for the websocket transport
    #[arg(long, env = "VOICECTL_RELAY_URL")]
    url: Option<String>,

    /// Identity the agent joins the session with
    #[arg(long)]
    identity: Option<String>,

    /// Tool calls allowed per turn
    #[arg(long)]
    max_tool_calls: Option<u32>,
}

impl Args {
    fn apply(self, config: &mut VoicectlConfig) {
        match self.transport.as_deref() {
            Some("websocket") => config.transport.kind = TransportKind::WebSocket,
            Some("simulated") => config.transport.kind = TransportKind::Simulated,
            _ => {}
        }
        if let Some(url) = self.url {
            config.transport.url = Some(url);
        }
        if let Some(identity) = self.identity {
            config.transport.identity = identity;
        }
        if let Some(limit) = self.max_tool_calls {
            config.session.max_tool_calls_per_turn = limit;
        }
    }
}

/// How long to wait for the simulated board to show up
const BOARD_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(config: &VoicectlConfig) -> Result<RemoteCommandChannel> {
    let identity = ParticipantIdentity::new(config.transport.identity.clone());
    let channel_config = ChannelConfig::from(&config.rpc);

    match config.transport.kind {
        TransportKind::Simulated => {
            let (transport, events) = LoopbackTransport::new(identity);
            let transport = Arc::new(transport);
            let channel = RemoteCommandChannel::new(transport.clone(), events, channel_config);

            let board_id = ParticipantIdentity::new(config.transport.board_identity.clone());
            SimulatedBoard::new()
                .attach(&transport, board_id.clone())
                .await
                .context("Failed to start simulated board")?;
            channel
                .wait_for_participant(&board_id, BOARD_JOIN_TIMEOUT)
                .await
                .context("Simulated board did not join")?;
            tracing::info!(board = %board_id, "Simulated board attached");
            Ok(channel)
        }
        TransportKind::WebSocket => {
            let raw = config
                .transport
                .url
                .as_deref()
                .context("transport.url is required for the websocket transport")?;
            let url = Url::parse(raw).context("Invalid relay URL")?;
            let (transport, events) = WebSocketTransport::connect(&url, identity)
                .await
                .context("Failed to connect to relay")?;
            let transport: Arc<dyn PeerTransport> = Arc::new(transport);
            Ok(RemoteCommandChannel::new(transport, events, channel_config))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicectl=info,voicectl_mcp=info,voicectl_rpc=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!("Starting voicectl");

    let mut config = VoicectlConfig::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    let channel = Arc::new(connect(&config).await?);

    let registry = Arc::new(ToolRegistry::builtin()?);
    tracing::info!("Registered {} tools", registry.len());

    let cancel = CancellationToken::new();
    let destination = config.rpc.destination.clone().map(ParticipantIdentity::new);
    let mut session = SessionContext::new(channel, config.session.max_tool_calls_per_turn)
        .with_cancel_token(cancel.clone())
        .with_destination(destination);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, ending session");
            cancel.cancel();
        }
    });

    let server = McpServer::new(ToolExecutor::new(registry), config.agent.clone());
    server
        .serve(
            &mut session,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await?;

    tracing::info!("voicectl stopped");
    Ok(())
}
