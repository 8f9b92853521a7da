//! End-to-end happy path: an agent registers, an operator proxy asks for
//! it, and bytes round-trip through the broker to a local echo service and
//! back. Exercises real loopback sockets rather than mocking the
//! transport, since the transport wiring is the thing under test.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tunnel_core::auth::{CredentialService, IssueOptions};
use tunnel_core::mux::MuxSession;
use tunnel_core::ws_io::ClientWsIo;
use tunnel_protocol::{AGENT_WS_PATH, CONNECT_WS_PATH};
use yamux::Mode;

use tunnel_server::{router, AppState};

const SECRET: &[u8] = b"integration-test-secret";

async fn spawn_echo_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

async fn spawn_broker() -> SocketAddr {
    let state = AppState::new(SECRET.to_vec());
    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

#[tokio::test]
async fn agent_registers_and_operator_splices_to_target() {
    let echo_addr = spawn_echo_listener().await;
    let broker_addr = spawn_broker().await;

    // Agent connects and accepts one substream, bridging it to the echo
    // listener.
    let agent_url = format!(
        "ws://{broker_addr}{AGENT_WS_PATH}?id=a1",
        broker_addr = broker_addr
    );
    let (agent_ws, _) = connect_async(agent_url).await.expect("agent dial");
    let agent_session = MuxSession::new(ClientWsIo::new(agent_ws), Mode::Client);

    let agent_session_bg = agent_session.clone();
    tokio::spawn(async move {
        if let Ok(stream) = agent_session_bg.accept().await {
            let tcp = tokio::net::TcpStream::connect(echo_addr).await.unwrap();
            tunnel_core::splice::splice(stream.compat(), tcp).await;
        }
    });

    // Give the agent registration a moment to land before the operator
    // asks for it.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Operator dials, authenticated with a freshly issued token.
    let token = CredentialService::new(SECRET.to_vec())
        .issue(IssueOptions::default())
        .unwrap();
    let connect_url = format!("ws://{broker_addr}{CONNECT_WS_PATH}?id=a1");
    let mut request = connect_url.into_client_request().unwrap();
    request
        .headers_mut()
        .insert(http::header::AUTHORIZATION, token.parse().unwrap());
    let (operator_ws, _) = connect_async(request).await.expect("operator dial");
    let operator_session = MuxSession::new(ClientWsIo::new(operator_ws), Mode::Client);
    let mut stream = operator_session.open_stream().await.unwrap().compat();

    stream.write_all(b"hello\n").await.unwrap();
    let mut buf = [0u8; 6];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello\n");
}

#[tokio::test]
async fn operator_without_bearer_is_rejected() {
    let broker_addr = spawn_broker().await;
    let connect_url = format!("ws://{broker_addr}{CONNECT_WS_PATH}?id=ghost");
    let err = connect_async(connect_url).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(resp) => {
            assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
        }
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}
