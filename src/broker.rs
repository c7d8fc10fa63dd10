//! Connection broker: turns a sub-connection id into a live connection.
//!
//! Ids are issued by the host in its hijack reply and are good for exactly
//! one dial. [`PipeBroker`] reaches each sub-connection through its own
//! local pipe named after the id.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::service::BoxFuture;
use crate::transport::PipeStream;

/// Dials sub-connections by id.
pub trait Broker: Send + Sync {
    /// Live connection produced by a dial.
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self, id: u32) -> BoxFuture<'_, io::Result<Self::Conn>>;
}

impl<B: Broker + ?Sized> Broker for Arc<B> {
    type Conn = B::Conn;

    fn dial(&self, id: u32) -> BoxFuture<'_, io::Result<Self::Conn>> {
        (**self).dial(id)
    }
}

/// Broker whose sub-connections are served on per-id local pipes.
///
/// Sub-connection `id` lives at `{prefix}-{id}.sock` on Unix and at
/// `{prefix}-{id}` on Windows.
#[derive(Debug, Clone)]
pub struct PipeBroker {
    prefix: String,
}

impl PipeBroker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Pipe path serving sub-connection `id`.
    pub fn path_for(&self, id: u32) -> String {
        #[cfg(unix)]
        {
            format!("{}-{}.sock", self.prefix, id)
        }

        #[cfg(windows)]
        {
            format!("{}-{}", self.prefix, id)
        }
    }
}

impl Broker for PipeBroker {
    type Conn = PipeStream;

    fn dial(&self, id: u32) -> BoxFuture<'_, io::Result<PipeStream>> {
        let path = self.path_for(id);
        Box::pin(async move {
            tracing::debug!("Dialing sub-connection {} at {}", id, path);
            PipeStream::connect(&path).await
        })
    }
}
