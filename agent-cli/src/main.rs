//! # Tunnel CLI
//!
//! A single binary with three roles:
//! - `agent`  — runs inside the private network, dials out to the broker
//! - `proxy`  — short-lived operator client, bridges the broker to stdio
//! - `master` — the public rendezvous broker
//!
//! ## Modules
//!
//! - [`identity`] — agent identifier resolution (`--id` / `--id-file`)
//! - [`agent`]    — agent-side tunnel loop
//! - [`proxy`]    — operator proxy

mod agent;
mod identity;
mod proxy;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tunnel", about = "WebSocket tunnel relay: agent, proxy and broker roles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs inside the private network and registers with the broker.
    Agent {
        /// Agent identifier. Mutually resolved with --id-file.
        #[arg(long)]
        id: Option<String>,
        /// File holding the agent identifier (NUL bytes stripped, then trimmed).
        #[arg(long)]
        id_file: Option<PathBuf>,
        /// Broker base URL, e.g. ws://broker.example.com:7070.
        #[arg(long)]
        broker: String,
        /// Local target address to proxy each substream to.
        #[arg(long)]
        target: String,
        /// Optional pre-issued agent bearer token.
        #[arg(long)]
        token: Option<String>,
    },
    /// Short-lived operator client; bridges the broker to stdio.
    Proxy {
        /// Agent identifier to reach.
        #[arg(long)]
        id: String,
        /// Broker base URL.
        #[arg(long)]
        broker: String,
        /// Operator bearer token, as minted by `master`'s /token-v1.
        #[arg(long)]
        token: String,
    },
    /// Runs the public rendezvous broker.
    Master {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:7070")]
        listen: SocketAddr,
        /// Symmetric secret used to sign and verify bearer tokens.
        #[arg(long)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tunnel=info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Agent { id, id_file, broker, target, token } => {
            let id = identity::resolve(id, id_file)?;
            let cancel = CancellationToken::new();
            let agent_cancel = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                agent_cancel.cancel();
            });
            agent::run(agent::AgentArgs { id, broker, target, token }, cancel).await
        }
        Command::Proxy { id, broker, token } => {
            proxy::run(proxy::ProxyArgs { id, broker, token }).await
        }
        Command::Master { listen, secret } => {
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            tunnel_server::run(tunnel_server::MasterArgs { listen, secret }, shutdown).await
        }
    }
}
