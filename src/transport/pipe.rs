//! Platform-specific pipe/socket implementation.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! The plugin side only ever connects ([`PipeStream::connect`]); the host
//! serves pipes through [`PipeListener`].
//!
//! # Example
//!
//! ```ignore
//! use procwire_responsewriter::transport::{generate_pipe_path, PipeListener, PipeStream};
//!
//! let path = generate_pipe_path();
//! let listener = PipeListener::bind(&path).await?;
//! let client = PipeStream::connect(&path).await?;
//! let server = listener.accept().await?;
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Generate a unique pipe path for this process.
///
/// Format:
/// - Unix: `/tmp/procwire-rw-{pid}-{random}.sock`
/// - Windows: `\\.\pipe\procwire-rw-{pid}-{random}`
pub fn generate_pipe_path() -> String {
    let pid = std::process::id();
    let rand = rand_u64();

    #[cfg(unix)]
    {
        format!("/tmp/procwire-rw-{}-{:x}.sock", pid, rand)
    }

    #[cfg(windows)]
    {
        format!(r"\\.\pipe\procwire-rw-{}-{:x}", pid, rand)
    }
}

/// Time, pid and a process-wide counter mixed into one value.
fn rand_u64() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id() as u64;

    nanos.wrapping_mul(0x517cc1b727220a95) ^ pid ^ seq.rotate_left(32)
}

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::path::Path;
    use tokio::net::{UnixListener, UnixStream};

    /// Unix Domain Socket listener. Removes its socket file on drop.
    pub struct PipeListener {
        listener: UnixListener,
        path: String,
    }

    /// Connected Unix Domain Socket.
    pub struct PipeStream {
        stream: UnixStream,
    }

    impl PipeListener {
        /// Bind to a Unix socket path, replacing a stale socket file.
        pub async fn bind(path: &str) -> io::Result<Self> {
            if Path::new(path).exists() {
                std::fs::remove_file(path)?;
            }

            let listener = UnixListener::bind(path)?;

            Ok(Self {
                listener,
                path: path.to_string(),
            })
        }

        pub async fn accept(&self) -> io::Result<PipeStream> {
            let (stream, _addr) = self.listener.accept().await?;
            Ok(PipeStream { stream })
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    impl PipeStream {
        /// Connect to a listening socket.
        pub async fn connect(path: &str) -> io::Result<Self> {
            let stream = UnixStream::connect(path).await?;
            Ok(Self { stream })
        }
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.stream).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.stream).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.stream).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.stream).poll_shutdown(cx)
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};

    /// Windows Named Pipe listener.
    pub struct PipeListener {
        path: String,
        next: std::sync::Mutex<Option<NamedPipeServer>>,
    }

    enum Pipe {
        Server(NamedPipeServer),
        Client(NamedPipeClient),
    }

    /// Connected Named Pipe, either end.
    pub struct PipeStream {
        pipe: Pipe,
    }

    impl PipeListener {
        /// Create the first pipe instance so clients can connect right away.
        pub async fn bind(path: &str) -> io::Result<Self> {
            let first = ServerOptions::new().first_pipe_instance(true).create(path)?;
            Ok(Self {
                path: path.to_string(),
                next: std::sync::Mutex::new(Some(first)),
            })
        }

        pub async fn accept(&self) -> io::Result<PipeStream> {
            let server = self
                .next
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            let server = match server {
                Some(server) => server,
                None => ServerOptions::new().create(&self.path)?,
            };

            server.connect().await?;

            Ok(PipeStream {
                pipe: Pipe::Server(server),
            })
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl PipeStream {
        /// Connect to a listening named pipe.
        pub async fn connect(path: &str) -> io::Result<Self> {
            let client = ClientOptions::new().open(path)?;
            Ok(Self {
                pipe: Pipe::Client(client),
            })
        }
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match &mut self.pipe {
                Pipe::Server(p) => Pin::new(p).poll_read(cx, buf),
                Pipe::Client(p) => Pin::new(p).poll_read(cx, buf),
            }
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match &mut self.pipe {
                Pipe::Server(p) => Pin::new(p).poll_write(cx, buf),
                Pipe::Client(p) => Pin::new(p).poll_write(cx, buf),
            }
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match &mut self.pipe {
                Pipe::Server(p) => Pin::new(p).poll_flush(cx),
                Pipe::Client(p) => Pin::new(p).poll_flush(cx),
            }
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match &mut self.pipe {
                Pipe::Server(p) => Pin::new(p).poll_shutdown(cx),
                Pipe::Client(p) => Pin::new(p).poll_shutdown(cx),
            }
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::{PipeListener, PipeStream};

#[cfg(windows)]
pub use windows_impl::{PipeListener, PipeStream};
