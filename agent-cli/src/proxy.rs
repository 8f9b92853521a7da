//! # Operator Proxy
//!
//! Dials the broker, opens exactly one substream for the named agent, and
//! splices it with this process's standard input/output — the shape an
//! SSH `ProxyCommand` expects.

use anyhow::{Context, Result};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tunnel_core::consts::PROXY_BROKER_DIAL_TIMEOUT;
use tunnel_core::mux::MuxSession;
use tunnel_core::splice::{splice, StdioPair};
use tunnel_core::ws_io::ClientWsIo;
use tunnel_protocol::CONNECT_WS_PATH;
use yamux::Mode;

pub struct ProxyArgs {
    pub id: String,
    pub broker: String,
    pub token: String,
}

pub async fn run(args: ProxyArgs) -> Result<()> {
    let url = format!("{}{}?id={}", args.broker, CONNECT_WS_PATH, args.id);
    let mut request = url
        .into_client_request()
        .context("building operator websocket request")?;
    request.headers_mut().insert(
        http::header::AUTHORIZATION,
        args.token.parse().context("encoding authorization header")?,
    );

    let (ws, _resp) = timeout(PROXY_BROKER_DIAL_TIMEOUT, connect_async(request))
        .await
        .context("dial to broker timed out")??;

    let io = ClientWsIo::new(ws);
    let session = MuxSession::new(io, Mode::Client);
    let stream = session.open_stream().await.context("opening operator substream")?;

    splice(stream.compat(), StdioPair::new()).await;
    session.close().await;
    Ok(())
}
