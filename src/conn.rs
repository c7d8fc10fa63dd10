//! The connection handed to the plugin after a hijack.
//!
//! [`HijackedConn`] owns the three sub-connections and the endpoint
//! descriptions; [`BufferedDuplex`] is the buffered read/write view over the
//! reader and writer sub-connections. Closing the handle closes all three.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader, BufWriter, ReadBuf};

use crate::addr::Addr;
use crate::subconn::SubConn;

/// Connection handle of a hijacked response.
///
/// Raw reads and writes go to the raw sub-connection. Endpoint addresses
/// come from the hijack reply and are never re-queried.
pub struct HijackedConn<C> {
    raw: SubConn<C>,
    reader: SubConn<C>,
    writer: SubConn<C>,
    local: Addr,
    remote: Addr,
}

impl<C> HijackedConn<C> {
    pub(crate) fn new(
        raw: SubConn<C>,
        local: Addr,
        remote: Addr,
        reader: SubConn<C>,
        writer: SubConn<C>,
    ) -> Self {
        Self {
            raw,
            reader,
            writer,
            local,
            remote,
        }
    }

    pub fn local_addr(&self) -> &Addr {
        &self.local
    }

    pub fn remote_addr(&self) -> &Addr {
        &self.remote
    }

    /// True once every sub-connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.raw.is_closed() && self.reader.is_closed() && self.writer.is_closed()
    }

    /// Broker ids of the raw, reader and writer sub-connections.
    pub fn sub_connection_ids(&self) -> [u32; 3] {
        [self.raw.id(), self.reader.id(), self.writer.id()]
    }
}

impl<C> HijackedConn<C>
where
    C: AsyncWrite + Unpin,
{
    /// Close the raw, reader and writer sub-connections.
    ///
    /// All three are released even if one fails to shut down; the first
    /// failure is returned. Closing an already closed handle returns `Ok`.
    pub async fn close(&self) -> io::Result<()> {
        let mut first_err = None;
        for conn in [&self.raw, &self.reader, &self.writer] {
            if let Err(e) = conn.close().await {
                tracing::debug!("Sub-connection {} shutdown failed: {}", conn.id(), e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<C> std::fmt::Debug for HijackedConn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HijackedConn")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .field("sub_connections", &self.sub_connection_ids())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<C> AsyncRead for HijackedConn<C>
where
    C: AsyncRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.raw).poll_read(cx, buf)
    }
}

impl<C> AsyncWrite for HijackedConn<C>
where
    C: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.raw).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.raw).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.raw).poll_shutdown(cx)
    }
}

/// Buffered reads from the reader sub-connection, buffered writes to the
/// writer sub-connection.
///
/// Written bytes sit in the buffer until `flush()`. Not meant for concurrent
/// use; it needs `&mut self` for every operation.
pub struct BufferedDuplex<C> {
    reader: BufReader<SubConn<C>>,
    writer: BufWriter<SubConn<C>>,
}

impl<C> BufferedDuplex<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(reader: SubConn<C>, writer: SubConn<C>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }

    pub fn reader_mut(&mut self) -> &mut BufReader<SubConn<C>> {
        &mut self.reader
    }

    pub fn writer_mut(&mut self) -> &mut BufWriter<SubConn<C>> {
        &mut self.writer
    }

    /// Split into the buffered halves.
    pub fn into_parts(self) -> (BufReader<SubConn<C>>, BufWriter<SubConn<C>>) {
        (self.reader, self.writer)
    }
}

impl<C> std::fmt::Debug for BufferedDuplex<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedDuplex")
            .field("reader", self.reader.get_ref())
            .field("writer", self.writer.get_ref())
            .field("buffered_in", &self.reader.buffer().len())
            .field("buffered_out", &self.writer.buffer().len())
            .finish()
    }
}

impl<C> AsyncRead for BufferedDuplex<C>
where
    C: AsyncRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl<C> AsyncBufRead for BufferedDuplex<C>
where
    C: AsyncRead + Unpin,
{
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().reader).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.reader).consume(amt)
    }
}

impl<C> AsyncWrite for BufferedDuplex<C>
where
    C: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}
