//! Dedicated writer task for outbound calls.
//!
//! Every call to the host is queued on an mpsc channel and written by one
//! task, so concurrent callers never interleave bytes of different frames.
//!
//! ```text
//! write()        ─┐
//! write_header() ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Pipe
//! hijack()       ─┘
//! ```
//!
//! Frames that are ready together are coalesced into one buffer and written
//! with a single `write_all` + `flush`.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ResponseWriterError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames coalesced into a single write.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the pipe.
#[derive(Debug)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frames queued before senders wait for the writer task.
    pub channel_capacity: usize,
    /// Upper bound on that wait. `None` waits as long as it takes.
    pub backpressure_timeout: Option<Duration>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: None,
        }
    }
}

/// Handle for sending frames to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    timeout: Option<Duration>,
}

impl WriterHandle {
    /// Queue a frame, waiting for room while the queue is full.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        let sent = match self.timeout {
            None => self.tx.send(frame).await,
            Some(timeout) => tokio::time::timeout(timeout, self.tx.send(frame))
                .await
                .map_err(|_| ResponseWriterError::BackpressureTimeout)?,
        };
        sent.map_err(|_| ResponseWriterError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends cleanly once every handle is dropped, or with an error if
/// the pipe fails.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = WriterHandle {
        tx,
        timeout: config.backpressure_timeout,
    };
    let task = tokio::spawn(writer_loop(rx, writer));

    (handle, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
        batch.clear();
    }

    Ok(())
}

async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut buf = BytesMut::with_capacity(total_size);
    for frame in batch {
        buf.extend_from_slice(&frame.header);
        buf.extend_from_slice(&frame.payload);
    }

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_outbound_frame_size() {
        let header = Header::request(1, 42, 5);
        let frame = OutboundFrame::new(&header, Bytes::from_static(b"hello"));

        assert_eq!(frame.size(), HEADER_SIZE + 5);
        assert_eq!(Header::decode(&frame.header), Some(header));
    }

    #[test]
    fn test_default_waits_without_timeout() {
        let config = WriterConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.backpressure_timeout, None);
    }

    #[tokio::test]
    async fn test_frames_arrive_in_send_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for i in 1..=10u32 {
            let header = Header::request(1, i, 4);
            handle
                .send(OutboundFrame::new(&header, Bytes::copy_from_slice(&i.to_be_bytes())))
                .await
                .unwrap();
        }

        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();
        let mut buf = vec![0u8; 1024];
        while frames.len() < 10 {
            let n = server.read(&mut buf).await.unwrap();
            frames.extend(buffer.push(&buf[..n]).unwrap());
        }

        let ids: Vec<u32> = frames.iter().map(|f| f.request_id()).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_send_after_task_exit_is_connection_closed() {
        let (client, server) = duplex(64);
        drop(server);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        // Accepted into the queue; the write then fails and the task exits
        let header = Header::request(1, 1, 0);
        handle.send(OutboundFrame::new(&header, Bytes::new())).await.unwrap();
        assert!(task.await.unwrap().is_err());

        let err = handle
            .send(OutboundFrame::new(&header, Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResponseWriterError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_configured_backpressure_timeout() {
        let (client, _server) = duplex(16);
        let config = WriterConfig {
            channel_capacity: 1,
            backpressure_timeout: Some(Duration::from_millis(20)),
        };
        let (handle, _task) = spawn_writer_task(client, config);

        // A 4KB frame never drains into a 16-byte pipe nobody reads, so the
        // queue fills up behind it
        let mut first_err = None;
        for i in 1..=4u32 {
            let header = Header::request(1, i, 4096);
            let frame = OutboundFrame::new(&header, Bytes::from(vec![0u8; 4096]));
            if let Err(e) = handle.send(frame).await {
                first_err = Some(e);
                break;
            }
        }

        assert!(matches!(first_err, Some(ResponseWriterError::BackpressureTimeout)));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }
}
