//! Stub render server for exercising the client over real TCP.
//!
//! Binds `127.0.0.1` on an ephemeral port and serves every connection with a
//! fixed behavior. Requests are recorded byte-for-byte before any reply is
//! written, so they can be inspected as soon as the client call returns.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use katex_filter_core::RenderClient;
use katex_filter_core::protocol::{RenderStatus, decode_request, encode_response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Handler = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

enum Behavior {
    /// Read the request to EOF, answer with the handler's bytes, close.
    Reply(Box<Handler>),
    /// Close the connection as soon as it is accepted.
    HangUp,
    /// Read the request to EOF, then hold the connection open forever.
    Stall,
}

/// A render server double listening on loopback.
///
/// The accept loop is aborted when the value is dropped.
pub struct StubRenderServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StubRenderServer {
    /// Answer every request with whatever `handler` returns for its raw bytes.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self::start(Behavior::Reply(Box::new(handler))).await
    }

    /// Answer every request with the same raw response bytes.
    pub async fn replying(response: Vec<u8>) -> Self {
        Self::with_handler(move |_| response.clone()).await
    }

    /// Answer every request with status `0x00` and `html`.
    pub async fn success(html: &str) -> Self {
        Self::replying(encode_response(RenderStatus::Success, html)).await
    }

    /// Answer every request with status `code` and `message`.
    pub async fn failure(code: u8, message: &str) -> Self {
        Self::replying(encode_response(RenderStatus::Failure(code), message)).await
    }

    /// Read the request, then close without sending a single byte.
    pub async fn empty_reply() -> Self {
        Self::replying(Vec::new()).await
    }

    /// Close every connection immediately after accepting it.
    pub async fn hang_up() -> Self {
        Self::start(Behavior::HangUp).await
    }

    /// Read the request and never answer.
    pub async fn stalled() -> Self {
        Self::start(Behavior::Stall).await
    }

    /// Render every request as `<span class="MODE">TEX</span>`, where MODE
    /// is `inline` or `display`. Undecodable requests get status `0x01`.
    pub async fn echo() -> Self {
        Self::with_handler(|bytes| match decode_request(bytes) {
            Ok(req) => {
                let class = if req.mode.is_display() { "display" } else { "inline" };
                let html = format!("<span class=\"{class}\">{}</span>", req.tex);
                encode_response(RenderStatus::Success, &html)
            }
            Err(e) => encode_response(RenderStatus::Failure(1), &e.to_string()),
        })
        .await
    }

    async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub render server");
        let addr = listener.local_addr().expect("stub server has no address");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let behavior = Arc::new(behavior);

        let task = tokio::spawn({
            let requests = Arc::clone(&requests);
            let connections = Arc::clone(&connections);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&behavior),
                        Arc::clone(&requests),
                    ));
                }
            }
        });

        Self {
            addr,
            requests,
            connections,
            task,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// A client pointed at this server with default settings.
    pub fn client(&self) -> RenderClient {
        RenderClient::new(self.host(), self.port())
    }

    /// Raw request bytes received so far, one entry per connection.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for StubRenderServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    behavior: Arc<Behavior>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    if let Behavior::HangUp = *behavior {
        return;
    }

    let mut request = Vec::new();
    if stream.read_to_end(&mut request).await.is_err() {
        return;
    }
    let response = match &*behavior {
        Behavior::Reply(handler) => handler(&request),
        _ => Vec::new(),
    };
    requests
        .lock()
        .expect("request log poisoned")
        .push(request);

    match &*behavior {
        Behavior::Stall => std::future::pending::<()>().await,
        _ => {
            let _ = stream.write_all(&response).await;
            let _ = stream.shutdown().await;
        }
    }
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind throwaway listener");
    listener
        .local_addr()
        .expect("throwaway listener has no address")
        .port()
}
