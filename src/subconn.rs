//! Shared, closeable handle to one broker sub-connection.
//!
//! A hijack hands the same sub-connection to two owners: the connection
//! handle (which must be able to close it) and the buffered stream (which
//! does the I/O). [`SubConn`] clones share one underlying connection; the
//! first `close()` shuts it down and releases it, every later one is a no-op.
//!
//! After close, reads and writes fail with `NotConnected`, and any task
//! parked on the connection is woken so it observes the close.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

struct State<C> {
    conn: Option<C>,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

/// One dialed sub-connection, shareable between owners.
pub struct SubConn<C> {
    id: u32,
    state: Arc<Mutex<State<C>>>,
}

impl<C> Clone for SubConn<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: self.state.clone(),
        }
    }
}

impl<C> std::fmt::Debug for SubConn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubConn")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn closed_error(id: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("sub-connection {id} is closed"),
    )
}

impl<C> SubConn<C> {
    pub fn new(id: u32, conn: C) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(State {
                conn: Some(conn),
                read_waker: None,
                write_waker: None,
            })),
        }
    }

    /// Broker id this connection was dialed with.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.lock().conn.is_none()
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        // A panic while holding the lock cannot leave State inconsistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C> SubConn<C>
where
    C: AsyncWrite + Unpin,
{
    /// Shut down and release the connection. Idempotent.
    ///
    /// The connection is released even when shutdown fails; the shutdown
    /// error is returned for the caller to log.
    pub async fn close(&self) -> io::Result<()> {
        let (conn, wakers) = {
            let mut state = self.lock();
            let wakers = [state.read_waker.take(), state.write_waker.take()];
            (state.conn.take(), wakers)
        };

        for waker in wakers.into_iter().flatten() {
            waker.wake();
        }

        match conn {
            Some(mut conn) => conn.shutdown().await,
            None => Ok(()),
        }
    }
}

impl<C> AsyncRead for SubConn<C>
where
    C: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        let state = &mut *state;
        let Some(conn) = state.conn.as_mut() else {
            return Poll::Ready(Err(closed_error(self.id)));
        };

        let poll = Pin::new(conn).poll_read(cx, buf);
        if poll.is_pending() {
            state.read_waker = Some(cx.waker().clone());
        }
        poll
    }
}

impl<C> AsyncWrite for SubConn<C>
where
    C: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        let state = &mut *state;
        let Some(conn) = state.conn.as_mut() else {
            return Poll::Ready(Err(closed_error(self.id)));
        };

        let poll = Pin::new(conn).poll_write(cx, buf);
        if poll.is_pending() {
            state.write_waker = Some(cx.waker().clone());
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        let state = &mut *state;
        let Some(conn) = state.conn.as_mut() else {
            return Poll::Ready(Err(closed_error(self.id)));
        };

        let poll = Pin::new(conn).poll_flush(cx);
        if poll.is_pending() {
            state.write_waker = Some(cx.waker().clone());
        }
        poll
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        let state = &mut *state;
        // Shutting down a closed connection is already done
        let Some(conn) = state.conn.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let poll = Pin::new(conn).poll_shutdown(cx);
        if poll.is_pending() {
            state.write_waker = Some(cx.waker().clone());
        }
        poll
    }
}
