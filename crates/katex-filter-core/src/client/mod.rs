//! Render client — one TCP exchange with the render server per expression.
//!
//! Each call connects, writes the request frame, half-closes the write side,
//! drains the response until the server closes, and decodes it. The
//! connection is owned by the call and dropped (closed) on every path.
//!
//! Failures are reported through a [`RenderLog`] and surface as `Ok(None)`,
//! so the caller leaves the expression unrendered. The one exception is a
//! connection failure under [`ConnectFailurePolicy::Abort`], which is
//! returned as [`ClientError::Connect`].

pub mod log;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use katex_filter_config::{AppConfig, ConnectFailurePolicy};

pub use log::{RenderLog, TracingRenderLog};

use crate::BoxFuture;
use crate::protocol::{MathMode, ProtocolError, RenderRequest, RenderResponse, RenderStatus};

/// Default render server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default render server port.
pub const DEFAULT_PORT: u16 = 7000;

/// Errors from a single exchange with the render server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to render server at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render server did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("malformed response: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Outcome of opening a connection to the render server.
#[derive(Debug)]
pub enum ConnectResult {
    Connected(TcpStream),
    Failed(std::io::Error),
}

impl From<std::io::Result<TcpStream>> for ConnectResult {
    fn from(result: std::io::Result<TcpStream>) -> Self {
        match result {
            Ok(stream) => Self::Connected(stream),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Anything that can turn a TeX expression into an HTML fragment.
///
/// `Ok(None)` means the expression stays unrendered; `Err` means the whole
/// run should stop.
pub trait MathRenderer: Send + Sync {
    fn render_math<'a>(
        &'a self,
        tex: &'a str,
        mode: MathMode,
    ) -> BoxFuture<'a, Result<Option<String>, ClientError>>;
}

/// Client for the render server.
#[derive(Clone)]
pub struct RenderClient {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    on_connect_failure: ConnectFailurePolicy,
    log: Arc<dyn RenderLog>,
}

impl RenderClient {
    /// Create a client for `host:port` that logs through `tracing`, skips
    /// expressions when the server is unreachable, and waits indefinitely.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
            on_connect_failure: ConnectFailurePolicy::Skip,
            log: Arc::new(TracingRenderLog),
        }
    }

    /// Create a client from the `[server]` and `[render]` config sections.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: config.server.timeout(),
            on_connect_failure: config.render.on_connect_failure,
            ..Self::new(config.server.host.clone(), config.server.port)
        }
    }

    /// Bound the connect and the exchange by `timeout` each.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_failure_policy(mut self, policy: ConnectFailurePolicy) -> Self {
        self.on_connect_failure = policy;
        self
    }

    /// Report failures through `log` instead of `tracing`.
    pub fn with_log(mut self, log: Arc<dyn RenderLog>) -> Self {
        self.log = log;
        self
    }

    /// `host:port` of the render server.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_failure_policy(&self) -> ConnectFailurePolicy {
        self.on_connect_failure
    }

    /// Open a fresh connection to the render server.
    pub async fn connect(&self) -> ConnectResult {
        let attempt = TcpStream::connect((self.host.as_str(), self.port));
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or_else(|_| {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("connect timed out after {limit:?}"),
                    ))
                }),
            None => attempt.await,
        };
        ConnectResult::from(result)
    }

    /// Run one request/response exchange over `stream`, consuming it.
    ///
    /// The write side is shut down right after the request so the server
    /// knows the TeX is complete; the response is read until end-of-stream.
    pub async fn exchange(
        &self,
        mut stream: TcpStream,
        request: &RenderRequest,
    ) -> Result<RenderResponse, ClientError> {
        let io = async {
            let frame = request.encode();
            stream.write_all(&frame).await?;
            stream.shutdown().await?;

            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await?;
            debug!(sent = frame.len(), received = buf.len(), "Render exchange complete");

            Ok::<_, ClientError>(crate::protocol::decode_response(&buf)?)
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, io)
                .await
                .map_err(|_| ClientError::TimedOut(limit))?,
            None => io.await,
        }
    }

    /// Render `tex` in `mode`.
    ///
    /// Returns `Ok(Some(html))` on success and `Ok(None)` when the
    /// expression could not be rendered. Returns `Err` only for an
    /// unreachable server under [`ConnectFailurePolicy::Abort`].
    pub async fn render(&self, tex: &str, mode: MathMode) -> Result<Option<String>, ClientError> {
        debug!(endpoint = %self.endpoint(), ?mode, "Rendering TeX");

        let stream = match self.connect().await {
            ConnectResult::Connected(stream) => stream,
            ConnectResult::Failed(source) => {
                let endpoint = self.endpoint();
                self.log.log_connection_error(&endpoint, &source);
                return match self.on_connect_failure {
                    ConnectFailurePolicy::Skip => Ok(None),
                    ConnectFailurePolicy::Abort => Err(ClientError::Connect { endpoint, source }),
                };
            }
        };

        let request = RenderRequest::new(mode, tex);
        match self.exchange(stream, &request).await {
            Ok(RenderResponse {
                status: RenderStatus::Success,
                payload,
            }) => Ok(Some(payload)),
            Ok(RenderResponse {
                status: RenderStatus::Failure(code),
                payload,
            }) => {
                debug!(status = code, "Render server reported failure");
                self.log.log_render_error(tex, &payload);
                Ok(None)
            }
            Err(e) => {
                self.log.log_render_error(tex, &e.to_string());
                Ok(None)
            }
        }
    }
}

impl MathRenderer for RenderClient {
    fn render_math<'a>(
        &'a self,
        tex: &'a str,
        mode: MathMode,
    ) -> BoxFuture<'a, Result<Option<String>, ClientError>> {
        Box::pin(self.render(tex, mode))
    }
}

/// Render `tex` against the server at `host:port` with default settings.
///
/// Every failure, including an unreachable server, yields `None`.
pub async fn render(tex: &str, display: bool, host: &str, port: u16) -> Option<String> {
    RenderClient::new(host, port)
        .render(tex, MathMode::from_display(display))
        .await
        .ok()
        .flatten()
}
