//! Framed RPC channel to the host's response writer.
//!
//! One pipe carries every call. Outbound calls go through the dedicated
//! writer task; a read task reassembles replies and hands each one to the
//! caller waiting on its request id.
//!
//! ```text
//! caller ──► call() ──► WriterHandle ──► writer task ──► pipe ──► host
//!   ▲                                                              │
//!   └──── oneshot ◄── pending[request_id] ◄── read task ◄── pipe ◄─┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use procwire_responsewriter::rpc::RpcChannel;
//!
//! let channel = RpcChannel::builder()
//!     .channel_capacity(256)
//!     .connect("/tmp/host-writer.sock")
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::codec::MsgPackCodec;
use crate::error::{ResponseWriterError, Result};
use crate::message::{
    method, FlushRequest, HijackRequest, HijackResponse, WriteHeaderRequest, WriteRequest,
    WriteResponse,
};
use crate::protocol::{Frame, FrameBuffer, Header, DEFAULT_MAX_PAYLOAD_SIZE, RESERVED_REQUEST_ID};
use crate::service::{BoxFuture, WriterService};
use crate::transport::PipeStream;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Size of the read buffer used by the reply loop.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring an [`RpcChannel`].
#[derive(Debug, Clone)]
pub struct RpcChannelBuilder {
    writer_config: WriterConfig,
    max_payload_size: u32,
}

impl RpcChannelBuilder {
    pub fn new() -> Self {
        Self {
            writer_config: WriterConfig::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Set how many calls may be queued before callers wait.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Bound how long a caller waits for room in the outbound queue.
    ///
    /// Default: no bound. Past the bound a call fails with
    /// [`ResponseWriterError::BackpressureTimeout`].
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.writer_config.backpressure_timeout = Some(timeout);
        self
    }

    /// Set the largest reply payload accepted from the host.
    ///
    /// Default: 1 GB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Connect to the host's pipe and start the channel.
    pub async fn connect(self, path: &str) -> Result<RpcChannel> {
        let stream = PipeStream::connect(path).await?;
        Ok(self.build(stream))
    }

    /// Start the channel over an already connected stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build<S>(self, stream: S) -> RpcChannel
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        RpcChannel::start(stream, self.writer_config, self.max_payload_size)
    }
}

impl Default for RpcChannelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls awaiting a reply, keyed by request id.
///
/// `None` once the read loop has ended; no new call can register then.
struct PendingCalls {
    calls: Mutex<Option<HashMap<u32, oneshot::Sender<Frame>>>>,
}

impl PendingCalls {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Some(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<HashMap<u32, oneshot::Sender<Frame>>>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn register(&self, request_id: u32) -> Result<oneshot::Receiver<Frame>> {
        let (tx, rx) = oneshot::channel();
        match self.lock().as_mut() {
            Some(calls) => {
                calls.insert(request_id, tx);
                Ok(rx)
            }
            None => Err(ResponseWriterError::ConnectionClosed),
        }
    }

    fn take(&self, request_id: u32) -> Option<oneshot::Sender<Frame>> {
        self.lock().as_mut().and_then(|calls| calls.remove(&request_id))
    }

    /// Fail every outstanding call and refuse new ones.
    fn close(&self) -> usize {
        self.lock().take().map_or(0, |calls| calls.len())
    }

    fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, HashMap::len)
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// Removes a call's pending entry if the caller stops waiting.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    request_id: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.take(self.request_id);
    }
}

/// A running RPC channel to the host's response writer.
pub struct RpcChannel {
    writer: WriterHandle,
    pending: Arc<PendingCalls>,
    next_request_id: AtomicU32,
    read_task: JoinHandle<()>,
    _writer_task: JoinHandle<()>,
}

impl RpcChannel {
    pub fn builder() -> RpcChannelBuilder {
        RpcChannelBuilder::new()
    }

    fn start<S>(stream: S, writer_config: WriterConfig, max_payload_size: u32) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, writer_config);

        let pending = Arc::new(PendingCalls::new());

        let read_pending = pending.clone();
        let read_task = tokio::spawn(async move {
            match Self::read_loop(reader, &read_pending, max_payload_size).await {
                Ok(()) => tracing::debug!("Host closed the response writer channel"),
                Err(e) => tracing::error!("Read loop error: {}", e),
            }
            Self::fail_pending(&read_pending);
        });

        // A dead writer means no call can reach the host any more
        let write_pending = pending.clone();
        let writer_task = tokio::spawn(async move {
            match writer_task.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => tracing::error!("Writer task error: {}", e),
                Err(e) => tracing::error!("Writer task failed: {}", e),
            }
            Self::fail_pending(&write_pending);
        });

        Self {
            writer,
            pending,
            next_request_id: AtomicU32::new(1),
            read_task,
            _writer_task: writer_task,
        }
    }

    fn fail_pending(pending: &PendingCalls) {
        let dropped = pending.close();
        if dropped > 0 {
            tracing::debug!("Failing {} outstanding calls", dropped);
        }
    }

    /// Reads replies and completes the matching pending calls.
    async fn read_loop<R: AsyncRead + Unpin>(
        mut reader: R,
        pending: &PendingCalls,
        max_payload_size: u32,
    ) -> Result<()> {
        let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }

            for frame in frame_buffer.push(&buf[..n])? {
                if !frame.is_response() {
                    tracing::warn!(
                        "Ignoring non-response frame for method {}",
                        frame.method_id()
                    );
                    continue;
                }

                match pending.take(frame.request_id()) {
                    Some(tx) => {
                        let _ = tx.send(frame);
                    }
                    None => tracing::warn!(
                        "Reply for unknown request {} (method {})",
                        frame.request_id(),
                        method::name(frame.method_id())
                    ),
                }
            }
        }
    }

    fn next_request_id(&self) -> u32 {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != RESERVED_REQUEST_ID {
                return id;
            }
        }
    }

    /// Issue one call and wait for its reply payload.
    ///
    /// An error reply from the host becomes [`ResponseWriterError::Remote`].
    pub async fn call(&self, method_id: u16, payload: Bytes) -> Result<Bytes> {
        let payload_length = u32::try_from(payload.len()).map_err(|_| {
            ResponseWriterError::Protocol(format!("Payload of {} bytes is too large", payload.len()))
        })?;

        let request_id = self.next_request_id();
        let rx = self.pending.register(request_id)?;
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id,
        };

        let header = Header::request(method_id, request_id, payload_length);
        self.writer.send(OutboundFrame::new(&header, payload)).await?;

        let frame = rx.await.map_err(|_| ResponseWriterError::ConnectionClosed)?;
        if frame.is_error() {
            return Err(ResponseWriterError::Remote(error_message(frame.payload())));
        }
        Ok(frame.payload)
    }

    async fn call_msg<T: Serialize>(&self, method_id: u16, request: &T) -> Result<Bytes> {
        let payload = MsgPackCodec::encode(request)?;
        self.call(method_id, Bytes::from(payload)).await
    }

    async fn call_decode<T: Serialize, R: DeserializeOwned>(
        &self,
        method_id: u16,
        request: &T,
    ) -> Result<R> {
        let reply = self.call_msg(method_id, request).await?;
        MsgPackCodec::decode(&reply)
    }

    /// Number of calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// True once the channel can no longer carry calls.
    pub fn is_closed(&self) -> bool {
        self.pending.is_closed()
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

/// Error replies carry a MsgPack string; anything else is shown as text.
fn error_message(payload: &[u8]) -> String {
    MsgPackCodec::decode::<String>(payload)
        .unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned())
}

impl WriterService for RpcChannel {
    fn write(&self, request: WriteRequest) -> BoxFuture<'_, Result<WriteResponse>> {
        Box::pin(async move { self.call_decode(method::WRITE, &request).await })
    }

    fn write_header(&self, request: WriteHeaderRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.call_msg(method::WRITE_HEADER, &request).await?;
            Ok(())
        })
    }

    fn flush(&self, request: FlushRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.call_msg(method::FLUSH, &request).await?;
            Ok(())
        })
    }

    fn hijack(&self, request: HijackRequest) -> BoxFuture<'_, Result<HijackResponse>> {
        Box::pin(async move { self.call_decode(method::HIJACK, &request).await })
    }
}
