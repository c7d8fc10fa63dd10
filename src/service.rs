//! The response writer service as seen from the plugin.
//!
//! [`WriterService`] is the seam between the response writer and whatever
//! carries its calls to the host. [`RpcChannel`](crate::rpc::RpcChannel)
//! is the framed-pipe implementation; tests substitute their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::message::{
    FlushRequest, HijackRequest, HijackResponse, WriteHeaderRequest, WriteRequest, WriteResponse,
};

/// Boxed future returned by service and broker calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Call/reply contract of the host's response writer.
///
/// Each method issues one remote call and resolves with the reply or the
/// transport failure. Implementations must not retry.
pub trait WriterService: Send + Sync {
    fn write(&self, request: WriteRequest) -> BoxFuture<'_, Result<WriteResponse>>;

    fn write_header(&self, request: WriteHeaderRequest) -> BoxFuture<'_, Result<()>>;

    fn flush(&self, request: FlushRequest) -> BoxFuture<'_, Result<()>>;

    fn hijack(&self, request: HijackRequest) -> BoxFuture<'_, Result<HijackResponse>>;
}

impl<S: WriterService + ?Sized> WriterService for Arc<S> {
    fn write(&self, request: WriteRequest) -> BoxFuture<'_, Result<WriteResponse>> {
        (**self).write(request)
    }

    fn write_header(&self, request: WriteHeaderRequest) -> BoxFuture<'_, Result<()>> {
        (**self).write_header(request)
    }

    fn flush(&self, request: FlushRequest) -> BoxFuture<'_, Result<()>> {
        (**self).flush(request)
    }

    fn hijack(&self, request: HijackRequest) -> BoxFuture<'_, Result<HijackResponse>> {
        (**self).hijack(request)
    }
}
