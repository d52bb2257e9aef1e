use anyhow::Context;
use clap::Parser;
use peermesh_core::IceServerConfig;
use peermesh_relay::{RelayHub, router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "peermesh-relay")]
#[command(about = "Signaling relay for peermesh sessions", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,

    /// STUN server URL handed to clients (repeatable)
    #[arg(long = "stun", default_values_t = [
        "stun:stun.l.google.com:19302".to_string(),
        "stun:stun1.l.google.com:19302".to_string(),
    ])]
    stun: Vec<String>,

    /// TURN server URL
    #[arg(long)]
    turn: Option<String>,

    #[arg(long, requires = "turn")]
    turn_username: Option<String>,

    #[arg(long, requires = "turn")]
    turn_credential: Option<String>,
}

impl Args {
    fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers: Vec<IceServerConfig> =
            self.stun.iter().map(IceServerConfig::stun).collect();
        if let Some(turn) = &self.turn {
            servers.push(IceServerConfig {
                urls: vec![turn.clone()],
                username: self.turn_username.clone(),
                credential: self.turn_credential.clone(),
            });
        }
        servers
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let ice_servers = args.ice_servers();
    info!("Handing out {} ICE server(s)", ice_servers.len());

    let app = router(RelayHub::new(ice_servers));

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!("Relay listening on ws://{}/ws", args.addr);

    axum::serve(listener, app).await?;
    Ok(())
}
