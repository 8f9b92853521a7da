use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::is_expected_close;

/// Bidirectionally copies bytes between `a` and `b` until either direction
/// ends, then forces the other closed. Unlike `tokio::io::copy_bidirectional`,
/// a half-close on one leg is promoted to a full close on both sides — a
/// deliberate simplification, not an oversight, since nothing here needs to
/// outlive a one-directional shutdown.
pub async fn splice<A, B>(a: A, b: B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ar, mut aw) = tokio::io::split(a);
    let (mut br, mut bw) = tokio::io::split(b);
    let cancel = CancellationToken::new();

    let c1 = cancel.clone();
    let forward = async {
        tokio::select! {
            res = tokio::io::copy(&mut ar, &mut bw) => log_copy_result("a->b", res),
            _ = c1.cancelled() => {}
        }
        let _ = bw.shutdown().await;
    };

    let c2 = cancel.clone();
    let backward = async {
        tokio::select! {
            res = tokio::io::copy(&mut br, &mut aw) => log_copy_result("b->a", res),
            _ = c2.cancelled() => {}
        }
        let _ = aw.shutdown().await;
    };

    tokio::pin!(forward);
    tokio::pin!(backward);

    tokio::select! {
        _ = &mut forward => {
            cancel.cancel();
            backward.await;
        }
        _ = &mut backward => {
            cancel.cancel();
            forward.await;
        }
    }
}

fn log_copy_result(direction: &str, result: io::Result<u64>) {
    match result {
        Ok(_) => {}
        Err(err) if is_expected_close(&err) => {}
        Err(err) => warn!(direction, error = %err, "splice copy error"),
    }
}

/// Combines process standard input and standard output into a single
/// `AsyncRead + AsyncWrite` endpoint for the operator proxy's splice.
pub struct StdioPair {
    stdin: tokio::io::Stdin,
    stdout: tokio::io::Stdout,
}

impl StdioPair {
    pub fn new() -> Self {
        Self {
            stdin: tokio::io::stdin(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdioPair {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncRead for StdioPair {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_read(cx, buf)
    }
}

impl AsyncWrite for StdioPair {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stdout).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn splice_carries_bytes_both_ways_and_closes_once() {
        let (a1, a2) = duplex(64);
        let (b1, b2) = duplex(64);

        let spliced = tokio::spawn(splice(a2, b2));

        let mut a1 = a1;
        let mut b1 = b1;

        a1.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        b1.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        b1.write_all(b"world").await.unwrap();
        let mut buf = [0u8; 5];
        a1.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        drop(a1);
        drop(b1);
        spliced.await.unwrap();
    }
}
