//! Integration tests for procwire-responsewriter.
//!
//! A fake host answers the RPC pipe and serves broker sub-connections on
//! real pipes, so every call goes through the full frame and transport path.

use std::time::Duration;

use procwire_responsewriter::codec::MsgPackCodec;
use procwire_responsewriter::message::{
    method, HijackResponse, WriteHeaderRequest, WriteRequest, WriteResponse,
};
use procwire_responsewriter::protocol::{build_frame, flags, Frame, FrameBuffer, Header};
use procwire_responsewriter::transport::{generate_pipe_path, PipeListener, PipeStream};
use procwire_responsewriter::{
    ErrorKind, NetAddr, PipeBroker, ResponseWriterClient, ResponseWriterError, RpcChannel,
};
use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

const CONN_ID: u32 = 101;
const READER_ID: u32 = 102;
const WRITER_ID: u32 = 103;

/// Requests as the host decoded them.
#[derive(Debug)]
enum HostCall {
    Write(WriteRequest),
    WriteHeader(WriteHeaderRequest),
    Flush,
    Hijack,
}

fn hijack_reply() -> HijackResponse {
    HijackResponse {
        conn_server: CONN_ID,
        reader_server: READER_ID,
        writer_server: WRITER_ID,
        local_network: "tcp".to_string(),
        local_string: "127.0.0.1:8080".to_string(),
        remote_network: "tcp".to_string(),
        remote_string: "192.0.2.7:51234".to_string(),
    }
}

fn reply(frame: &Frame, calls: &mpsc::UnboundedSender<HostCall>) -> (u8, Vec<u8>) {
    let ok = |payload: Vec<u8>| (flags::RESPONSE, payload);
    match frame.method_id() {
        method::WRITE => {
            let req: WriteRequest = MsgPackCodec::decode(frame.payload()).unwrap();
            let written = req.payload.len() as u32;
            calls.send(HostCall::Write(req)).unwrap();
            ok(MsgPackCodec::encode(&WriteResponse { written }).unwrap())
        }
        method::WRITE_HEADER => {
            let req: WriteHeaderRequest = MsgPackCodec::decode(frame.payload()).unwrap();
            calls.send(HostCall::WriteHeader(req)).unwrap();
            ok(Vec::new())
        }
        method::FLUSH => {
            calls.send(HostCall::Flush).unwrap();
            ok(Vec::new())
        }
        method::HIJACK => {
            calls.send(HostCall::Hijack).unwrap();
            ok(MsgPackCodec::encode(&hijack_reply()).unwrap())
        }
        other => (
            flags::ERROR_RESPONSE,
            MsgPackCodec::encode(&format!("unknown method {other}")).unwrap(),
        ),
    }
}

/// Serve the response writer side of the pipe until the plugin hangs up.
fn spawn_host(mut stream: DuplexStream) -> mpsc::UnboundedReceiver<HostCall> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut frames = FrameBuffer::new();
        let mut buf = vec![0u8; 8192];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for frame in frames.push(&buf[..n]).unwrap() {
                let (flags, payload) = reply(&frame, &tx);
                let header =
                    Header::new(frame.method_id(), flags, frame.request_id(), payload.len() as u32);
                if stream.write_all(&build_frame(&header, &payload)).await.is_err() {
                    return;
                }
            }
        }
    });
    rx
}

fn client() -> (
    ResponseWriterClient<RpcChannel, PipeBroker>,
    mpsc::UnboundedReceiver<HostCall>,
) {
    let (plugin, host) = duplex(64 * 1024);
    let calls = spawn_host(host);
    let channel = RpcChannel::builder().build(plugin);
    let broker = PipeBroker::new(generate_pipe_path());
    (ResponseWriterClient::new(channel, broker), calls)
}

async fn bind(broker: &PipeBroker, ids: &[u32]) -> Vec<PipeListener> {
    let mut listeners = Vec::new();
    for &id in ids {
        listeners.push(PipeListener::bind(&broker.path_for(id)).await.unwrap());
    }
    listeners
}

/// Accept one connection on every listener, in order.
fn accept_all(listeners: Vec<PipeListener>) -> tokio::task::JoinHandle<Vec<PipeStream>> {
    tokio::spawn(async move {
        let mut accepted = Vec::new();
        for listener in &listeners {
            accepted.push(listener.accept().await.unwrap());
        }
        // Keep the listeners (and their socket files) until every dial landed
        drop(listeners);
        accepted
    })
}

#[tokio::test]
async fn test_write_forwards_headers_and_payload() {
    let (mut rw, mut calls) = client();
    rw.header_mut().set("Content-Type", "text/plain");

    let n = rw.write(b"hello").await.unwrap();
    assert_eq!(n, 5);

    match calls.recv().await.unwrap() {
        HostCall::Write(req) => {
            assert_eq!(req.payload, b"hello");
            assert_eq!(req.headers.len(), 1);
            assert_eq!(req.headers[0].key, "Content-Type");
            assert_eq!(req.headers[0].values, vec!["text/plain"]);
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn test_calls_reach_host_in_order() {
    let (mut rw, mut calls) = client();
    rw.header_mut().add("Set-Cookie", "a=1");
    rw.header_mut().add("Set-Cookie", "b=2");

    rw.write_header(201).await;
    rw.write(b"body").await.unwrap();
    rw.flush().await;

    match calls.recv().await.unwrap() {
        HostCall::WriteHeader(req) => {
            assert_eq!(req.status_code, 201);
            assert_eq!(req.headers[0].values, vec!["a=1", "b=2"]);
        }
        other => panic!("unexpected call: {other:?}"),
    }
    assert!(matches!(calls.recv().await.unwrap(), HostCall::Write(_)));
    assert!(matches!(calls.recv().await.unwrap(), HostCall::Flush));
}

#[tokio::test]
async fn test_hijack_round_trip() {
    let (rw, mut calls) = client();
    let listeners = bind(rw.broker(), &[CONN_ID, READER_ID, WRITER_ID]).await;
    let host_side = accept_all(listeners);

    let (conn, mut stream) = rw.hijack().await.unwrap();
    assert!(matches!(calls.recv().await.unwrap(), HostCall::Hijack));

    assert_eq!(conn.local_addr().network(), "tcp");
    assert_eq!(conn.local_addr().to_string(), "127.0.0.1:8080");
    assert_eq!(conn.remote_addr().network(), "tcp");
    assert_eq!(conn.remote_addr().to_string(), "192.0.2.7:51234");

    let mut accepted = host_side.await.unwrap();
    let mut host_writer = accepted.pop().unwrap();
    let mut host_reader = accepted.pop().unwrap();

    // Host feeds the plugin through the reader sub-connection
    host_reader.write_all(b"GET /ws HTTP/1.1\r\n").await.unwrap();
    let mut line = String::new();
    stream.read_line(&mut line).await.unwrap();
    assert_eq!(line, "GET /ws HTTP/1.1\r\n");

    // Plugin output reaches the host through the writer sub-connection
    stream.write_all(b"HTTP/1.1 101 Switching Protocols\r\n").await.unwrap();
    stream.flush().await.unwrap();
    let mut buf = vec![0u8; 34];
    host_writer.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"HTTP/1.1 101 Switching Protocols\r\n");

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());

    // Closed sub-connections show up as EOF on the host side
    let mut rest = Vec::new();
    host_writer.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_hijack_with_missing_writer_releases_opened() {
    let (rw, _calls) = client();
    let listeners = bind(rw.broker(), &[CONN_ID, READER_ID]).await;
    let host_side = accept_all(listeners);

    let err = rw.hijack().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dial);
    assert!(matches!(
        err,
        ResponseWriterError::Dial { id: WRITER_ID, .. }
    ));

    // Both sub-connections that did open were closed again
    let accepted = tokio::time::timeout(Duration::from_secs(5), host_side)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(accepted.len(), 2);
    for mut host_end in accepted {
        let mut rest = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(5), host_end.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}

#[tokio::test]
async fn test_hijack_with_no_broker_listeners() {
    let (rw, _calls) = client();

    let err = rw.hijack().await.unwrap_err();
    assert!(matches!(err, ResponseWriterError::Dial { id: CONN_ID, .. }));
}
