//! # Agent Tunnel Loop
//!
//! Maintains a persistent outbound WebSocket to the broker. For every
//! substream the broker opens on this session, dials the configured
//! target and splices the two together. Reconnects on any failure after
//! a fixed delay; never gives up.

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tunnel_core::consts::{AGENT_BROKER_DIAL_TIMEOUT, AGENT_RETRY_DELAY, AGENT_TARGET_DIAL_TIMEOUT};
use tunnel_core::mux::MuxSession;
use tunnel_core::splice::splice;
use tunnel_core::ws_io::ClientWsIo;
use tunnel_protocol::{AGENT_WS_PATH, LOCAL_IPS_HEADER};
use yamux::Mode;

pub struct AgentArgs {
    pub id: String,
    pub broker: String,
    pub target: String,
    pub token: Option<String>,
}

/// Runs the agent loop until `cancel` fires. Never returns otherwise.
pub async fn run(args: AgentArgs, cancel: CancellationToken) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        match connect_once(&args).await {
            Ok(session) => {
                info!(id = %args.id, "connected to broker");
                accept_loop(&args, session, &cancel).await;
            }
            Err(err) => {
                warn!(id = %args.id, error = %err, "dial to broker failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(AGENT_RETRY_DELAY) => {}
        }
    }
}

async fn connect_once(args: &AgentArgs) -> Result<MuxSession> {
    let url = format!("{}{}?id={}", args.broker, AGENT_WS_PATH, args.id);
    let local_ips = local_ip_list();

    let mut request = url
        .into_client_request()
        .context("building agent websocket request")?;
    request
        .headers_mut()
        .insert(LOCAL_IPS_HEADER, local_ips.parse().context("encoding local ip header")?);
    if let Some(token) = &args.token {
        request.headers_mut().insert(
            http::header::AUTHORIZATION,
            token.parse().context("encoding authorization header")?,
        );
    }

    let (ws, _resp) = timeout(AGENT_BROKER_DIAL_TIMEOUT, connect_async(request))
        .await
        .context("dial to broker timed out")??;

    let io = ClientWsIo::new(ws);
    Ok(MuxSession::new(io, Mode::Client))
}

async fn accept_loop(args: &AgentArgs, session: MuxSession, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                session.close().await;
                return;
            }
            accepted = session.accept() => {
                match accepted {
                    Ok(stream) => {
                        let target = args.target.clone();
                        tokio::spawn(async move {
                            handle_substream(stream, target).await;
                        });
                    }
                    Err(err) => {
                        error!(id = %args.id, error = %err, "mux session ended");
                        session.close().await;
                        return;
                    }
                }
            }
        }
    }
}

async fn handle_substream(stream: yamux::Stream, target: String) {
    let dial = timeout(AGENT_TARGET_DIAL_TIMEOUT, TcpStream::connect(&target)).await;
    let tcp = match dial {
        Ok(Ok(tcp)) => tcp,
        Ok(Err(err)) => {
            warn!(target = %target, error = %err, "target dial failed");
            return;
        }
        Err(_) => {
            warn!(target = %target, "target dial timed out");
            return;
        }
    };
    splice(stream.compat(), tcp).await;
}

fn local_ip_list() -> String {
    if_addrs::get_if_addrs()
        .map(|ifaces| {
            ifaces
                .into_iter()
                .filter(|i| !i.is_loopback())
                .map(|i| i.ip().to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}
