//! # procwire-responsewriter
//!
//! Plugin-side proxy for an HTTP response writer that lives in a host
//! process.
//!
//! The plugin handles a request, but the real response writer belongs to
//! the host. [`ResponseWriterClient`] forwards every writer operation to
//! the host over a framed RPC pipe and supports hijacking the underlying
//! connection through three sub-connections obtained from a [`Broker`].
//!
//! ## Architecture
//!
//! - **RPC pipe** ([`RpcChannel`]): binary frames with MsgPack payloads for
//!   `Write`, `WriteHeader`, `Flush` and `Hijack`
//! - **Broker** ([`PipeBroker`]): dials numbered sub-connections once a
//!   hijack has been granted
//!
//! ## Example
//!
//! ```ignore
//! use procwire_responsewriter::{PipeBroker, ResponseWriterClient, RpcChannel};
//! use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
//!
//! #[tokio::main]
//! async fn main() -> procwire_responsewriter::Result<()> {
//!     let channel = RpcChannel::builder().connect("/tmp/host-writer.sock").await?;
//!     let rw = ResponseWriterClient::new(channel, PipeBroker::new("/tmp/host-broker"));
//!
//!     let (conn, mut stream) = rw.hijack().await?;
//!     println!("hijacked {} -> {}", conn.local_addr(), conn.remote_addr());
//!
//!     stream.write_all(b"HTTP/1.1 101 Switching Protocols\r\n\r\n").await?;
//!     stream.flush().await?;
//!
//!     let mut line = String::new();
//!     stream.read_line(&mut line).await?;
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

pub mod addr;
pub mod broker;
pub mod codec;
pub mod conn;
pub mod error;
pub mod header;
pub mod message;
pub mod protocol;
pub mod rpc;
pub mod service;
pub mod subconn;
pub mod transport;

mod client;
mod writer;

pub use addr::{Addr, NetAddr};
pub use broker::{Broker, PipeBroker};
pub use client::ResponseWriterClient;
pub use conn::{BufferedDuplex, HijackedConn};
pub use error::{ErrorKind, ResponseWriterError, Result};
pub use header::HeaderMap;
pub use rpc::{RpcChannel, RpcChannelBuilder};
pub use service::WriterService;
