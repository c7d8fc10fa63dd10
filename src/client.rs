//! Plugin-side response writer.
//!
//! [`ResponseWriterClient`] mirrors an HTTP response writer whose real
//! counterpart lives in the host process. Header mutations stay local until
//! the next forwarded call, which carries a snapshot of them. A hijack turns
//! the response into a raw connection built from three broker
//! sub-connections.
//!
//! # Example
//!
//! ```ignore
//! use procwire_responsewriter::{PipeBroker, ResponseWriterClient, RpcChannel};
//!
//! let channel = RpcChannel::builder().connect(&writer_path).await?;
//! let mut rw = ResponseWriterClient::new(channel, PipeBroker::new(broker_prefix));
//!
//! rw.header_mut().set("Content-Type", "text/plain");
//! rw.write_header(200).await;
//! let n = rw.write(b"hello").await?;
//! rw.flush().await;
//! ```

use crate::addr::Addr;
use crate::broker::Broker;
use crate::conn::{BufferedDuplex, HijackedConn};
use crate::error::{ResponseWriterError, Result};
use crate::header::HeaderMap;
use crate::message::{FlushRequest, HijackRequest, WriteHeaderRequest, WriteRequest};
use crate::service::WriterService;
use crate::subconn::SubConn;

/// Response writer that forwards every operation to the host.
///
/// Calls are forwarded in the order they are awaited; nothing is batched or
/// reordered. Forwarding calls take `&self`, header mutation takes
/// `&mut self`, so the header snapshot taken by a call can never race with a
/// mutation.
pub struct ResponseWriterClient<S, B> {
    service: S,
    header: HeaderMap,
    broker: B,
}

impl<S, B> ResponseWriterClient<S, B>
where
    S: WriterService,
    B: Broker,
{
    pub fn new(service: S, broker: B) -> Self {
        Self {
            service,
            header: HeaderMap::new(),
            broker,
        }
    }

    /// Headers sent with the next `write` or `write_header`.
    pub fn header(&self) -> &HeaderMap {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut HeaderMap {
        &mut self.header
    }

    /// Forward body bytes with the current headers.
    ///
    /// Returns the number of bytes the host reports as written. On failure
    /// nothing is considered written and the call is not retried.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        let request = WriteRequest::new(&self.header, payload);
        let response = self.service.write(request).await?;
        Ok(response.written as usize)
    }

    /// Forward the status code with the current headers, reporting failure.
    pub async fn try_write_header(&self, status_code: u16) -> Result<()> {
        let request = WriteHeaderRequest::new(&self.header, status_code);
        self.service.write_header(request).await
    }

    /// Forward the status code with the current headers.
    ///
    /// Fire-and-forget: a transport failure is logged and then discarded,
    /// matching the one-way `WriteHeader` contract this mirrors. Use
    /// [`try_write_header`](Self::try_write_header) to observe it.
    pub async fn write_header(&self, status_code: u16) {
        if let Err(e) = self.try_write_header(status_code).await {
            tracing::warn!("write_header({}) was not delivered: {}", status_code, e);
        }
    }

    /// Ask the host to flush buffered body bytes, reporting failure.
    pub async fn try_flush(&self) -> Result<()> {
        self.service.flush(FlushRequest {}).await
    }

    /// Ask the host to flush buffered body bytes.
    ///
    /// Fire-and-forget like [`write_header`](Self::write_header); use
    /// [`try_flush`](Self::try_flush) to observe failures.
    pub async fn flush(&self) {
        if let Err(e) = self.try_flush().await {
            tracing::warn!("flush was not delivered: {}", e);
        }
    }

    /// Take over the underlying connection.
    ///
    /// Issues one hijack call, then dials the raw, reader and writer
    /// sub-connections in that order. If any dial fails, every
    /// sub-connection opened so far is closed before the error is returned,
    /// so a failed hijack leaves nothing open.
    ///
    /// On success the handle is used for endpoint introspection, raw I/O and
    /// closing; the buffered stream for the hijacked byte exchange (writes
    /// need `flush()` to be delivered).
    pub async fn hijack(&self) -> Result<(HijackedConn<B::Conn>, BufferedDuplex<B::Conn>)> {
        let resp = self.service.hijack(HijackRequest {}).await?;
        tracing::debug!(
            "Hijack granted: conn={} reader={} writer={}",
            resp.conn_server,
            resp.reader_server,
            resp.writer_server
        );

        let mut opened = OpenedConns::new();
        let raw = opened.dial(&self.broker, resp.conn_server).await?;
        let reader = opened.dial(&self.broker, resp.reader_server).await?;
        let writer = opened.dial(&self.broker, resp.writer_server).await?;

        let local = Addr::new(resp.local_network, resp.local_string);
        let remote = Addr::new(resp.remote_network, resp.remote_string);

        let conn = HijackedConn::new(raw, local, remote, reader.clone(), writer.clone());
        let stream = BufferedDuplex::new(reader, writer);

        Ok((conn, stream))
    }

    /// The service calls are forwarded to.
    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }
}

/// Sub-connections dialed so far by one hijack attempt.
///
/// A failed dial closes everything already opened, newest first, before the
/// error is returned. If the attempt is dropped midway, the connections are
/// released with it.
struct OpenedConns<C> {
    conns: Vec<SubConn<C>>,
}

impl<C> OpenedConns<C>
where
    C: tokio::io::AsyncWrite + Unpin,
{
    fn new() -> Self {
        Self {
            conns: Vec::with_capacity(3),
        }
    }

    async fn dial<B>(&mut self, broker: &B, id: u32) -> Result<SubConn<C>>
    where
        B: Broker<Conn = C>,
    {
        match broker.dial(id).await {
            Ok(conn) => {
                let conn = SubConn::new(id, conn);
                self.conns.push(conn.clone());
                Ok(conn)
            }
            Err(source) => {
                tracing::debug!(
                    "Dial of sub-connection {} failed, closing {} opened",
                    id,
                    self.conns.len()
                );
                self.release().await;
                Err(ResponseWriterError::Dial { id, source })
            }
        }
    }

    async fn release(&mut self) {
        while let Some(conn) = self.conns.pop() {
            if let Err(e) = conn.close().await {
                tracing::debug!("Closing sub-connection {} failed: {}", conn.id(), e);
            }
        }
    }
}
