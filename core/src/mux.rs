use std::sync::Arc;

use futures_util::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use yamux::{Config, Connection, Control, Mode};

use crate::error::{Result, TetherError};

/// A live multiplexed session over one WebSocket. Cheaply cloneable; every
/// clone shares the same underlying connection, control handle, and accept
/// queue. The registry stores one of these per agent; handlers hold their
/// own clone for the lifetime of a request.
#[derive(Clone)]
pub struct MuxSession {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    control: Mutex<Control>,
    accept_rx: Mutex<mpsc::Receiver<yamux::Stream>>,
    closed: CancellationToken,
    driver: JoinHandle<()>,
}

impl MuxSession {
    /// Wraps `io` in a yamux connection in the given mode and starts the
    /// background driver task that keeps the connection's frames flowing.
    /// Accepted inbound substreams are queued (capacity 1, approximating an
    /// unbuffered hand-off) for [`MuxSession::accept`].
    pub fn new<T>(io: T, mode: Mode) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = Uuid::new_v4();
        let mut conn = Connection::new(io, Config::default(), mode);
        let control = conn.control();
        let (tx, rx) = mpsc::channel(1);
        let closed = CancellationToken::new();

        let driver_closed = closed.clone();
        let driver_id = id;
        let driver = tokio::spawn(async move {
            loop {
                match conn.next_stream().await {
                    Ok(Some(stream)) => {
                        if tx.send(stream).await.is_err() {
                            debug!(session = %driver_id, "mux driver: accept queue dropped, discarding inbound stream");
                        }
                    }
                    Ok(None) => {
                        debug!(session = %driver_id, "mux driver: connection closed");
                        break;
                    }
                    Err(err) => {
                        warn!(session = %driver_id, error = %err, "mux driver: connection error");
                        break;
                    }
                }
            }
            driver_closed.cancel();
        });

        Self {
            inner: Arc::new(Inner {
                id,
                control: Mutex::new(control),
                accept_rx: Mutex::new(rx),
                closed,
                driver,
            }),
        }
    }

    /// The session's correlation id, used to tie together log lines across
    /// its accept loop, driver task, and owning handler.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Opens a fresh outbound substream.
    pub async fn open_stream(&self) -> Result<yamux::Stream> {
        let mut control = self.inner.control.lock().await;
        control.open_stream().await.map_err(TetherError::from)
    }

    /// Waits for the next inbound substream opened by the remote side.
    /// Only one accept loop per session makes sense; callers share a clone
    /// only to read [`MuxSession::closed`] concurrently, never to accept
    /// concurrently.
    pub async fn accept(&self) -> Result<yamux::Stream> {
        let mut rx = self.inner.accept_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| TetherError::Protocol("mux session closed".into()))
    }

    /// Resolves once the underlying connection has closed, for any reason.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    /// Initiates a graceful shutdown of the underlying connection and waits
    /// for the driver task to observe it. Idempotent.
    pub async fn close(&self) {
        {
            let mut control = self.inner.control.lock().await;
            let _ = control.close().await;
        }
        self.closed().await;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use tokio_util::compat::TokioAsyncReadCompatExt;

    /// A session with no live peer, for registry unit tests that only
    /// exercise insert/lookup/remove bookkeeping.
    pub fn dummy_session() -> MuxSession {
        let (a, _b) = tokio::io::duplex(4096);
        MuxSession::new(a.compat(), Mode::Client)
    }
}
