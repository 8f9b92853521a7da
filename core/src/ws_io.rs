//! Adapts a WebSocket (either axum's server-side upgrade or
//! tokio-tungstenite's client-side stream) into a plain `futures`
//! `AsyncRead + AsyncWrite` byte stream, so a stream multiplexer can be
//! layered on top without knowing WebSockets exist underneath.

use std::io;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_util::{AsyncRead, AsyncWrite, Sink, Stream};

/// The two concrete message types this adapter is instantiated over. Kept
/// minimal on purpose: only binary-payload and close detection matter here,
/// the multiplexer never sees text frames.
pub trait WsFrame: Sized {
    fn into_binary(self) -> Option<Vec<u8>>;
    fn binary(data: Vec<u8>) -> Self;
    fn is_close(&self) -> bool;
}

impl WsFrame for axum::extract::ws::Message {
    fn into_binary(self) -> Option<Vec<u8>> {
        match self {
            axum::extract::ws::Message::Binary(data) => Some(data.to_vec()),
            _ => None,
        }
    }

    fn binary(data: Vec<u8>) -> Self {
        axum::extract::ws::Message::Binary(data.into())
    }

    fn is_close(&self) -> bool {
        matches!(self, axum::extract::ws::Message::Close(_))
    }
}

impl WsFrame for tokio_tungstenite::tungstenite::Message {
    fn into_binary(self) -> Option<Vec<u8>> {
        match self {
            tokio_tungstenite::tungstenite::Message::Binary(data) => Some(data.to_vec()),
            _ => None,
        }
    }

    fn binary(data: Vec<u8>) -> Self {
        tokio_tungstenite::tungstenite::Message::Binary(data.into())
    }

    fn is_close(&self) -> bool {
        matches!(self, tokio_tungstenite::tungstenite::Message::Close(_))
    }
}

/// Generic byte-stream adapter over any `Stream<Item = Result<M, E>>
/// + Sink<M, Error = E>`. Binary frames are concatenated into a read
/// buffer; non-binary frames are dropped; a close frame or stream end is
/// treated as EOF.
pub struct WsIo<S, M> {
    inner: S,
    read_buf: BytesMut,
    eof: bool,
    _msg: PhantomData<M>,
}

impl<S, M> WsIo<S, M> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            read_buf: BytesMut::new(),
            eof: false,
            _msg: PhantomData,
        }
    }
}

impl<S, M, E> AsyncRead for WsIo<S, M>
where
    S: Stream<Item = Result<M, E>> + Unpin,
    M: WsFrame + Unpin,
    E: std::fmt::Display,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            if !this.read_buf.is_empty() {
                let n = std::cmp::min(buf.len(), this.read_buf.len());
                buf[..n].copy_from_slice(&this.read_buf[..n]);
                let _ = this.read_buf.split_to(n);
                return Poll::Ready(Ok(n));
            }
            if this.eof {
                return Poll::Ready(Ok(0));
            }
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(msg))) => {
                    if msg.is_close() {
                        this.eof = true;
                        continue;
                    }
                    if let Some(data) = msg.into_binary() {
                        this.read_buf.extend_from_slice(&data);
                    }
                    continue;
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Err(io::Error::other(err.to_string())));
                }
                Poll::Ready(None) => {
                    this.eof = true;
                    continue;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S, M, E> AsyncWrite for WsIo<S, M>
where
    S: Sink<M, Error = E> + Unpin,
    M: WsFrame + Unpin,
    E: std::fmt::Display,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_ready(cx) {
            Poll::Ready(Ok(())) => {}
            Poll::Ready(Err(err)) => return Poll::Ready(Err(io::Error::other(err.to_string()))),
            Poll::Pending => return Poll::Pending,
        }
        let len = buf.len();
        match Pin::new(&mut this.inner).start_send(M::binary(buf.to_vec())) {
            Ok(()) => Poll::Ready(Ok(len)),
            Err(err) => Poll::Ready(Err(io::Error::other(err.to_string()))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_flush(cx)
            .map_err(|err| io::Error::other(err.to_string()))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_close(cx)
            .map_err(|err| io::Error::other(err.to_string()))
    }
}

/// Byte stream over an accepted broker-side WebSocket.
pub type ServerWsIo = WsIo<axum::extract::ws::WebSocket, axum::extract::ws::Message>;

/// Byte stream over a dialed client-side WebSocket.
pub type ClientWsIo<S> =
    WsIo<tokio_tungstenite::WebSocketStream<S>, tokio_tungstenite::tungstenite::Message>;
