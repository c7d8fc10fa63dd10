//! Transport module - local pipes between plugin and host.
//!
//! Provides abstraction over:
//! - Unix Domain Sockets (Linux/macOS)
//! - Named Pipes (Windows)

mod pipe;

pub use pipe::{generate_pipe_path, PipeListener, PipeStream};
