//! Failure reporting for the render client.
//!
//! The client never raises a render failure to its caller; it reports it
//! through a [`RenderLog`] and returns no HTML. The log is injected so that
//! tests can observe exactly what was reported.

use tracing::error;

/// Sink for render failures.
pub trait RenderLog: Send + Sync {
    /// The render server at `endpoint` could not be reached.
    fn log_connection_error(&self, endpoint: &str, error: &std::io::Error);

    /// The server rejected `tex`, or its answer could not be used.
    fn log_render_error(&self, tex: &str, message: &str);
}

/// [`RenderLog`] that emits `tracing` events at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderLog;

impl RenderLog for TracingRenderLog {
    fn log_connection_error(&self, endpoint: &str, error: &std::io::Error) {
        error!(endpoint, error = %error, "Could not connect to render server");
    }

    fn log_render_error(&self, tex: &str, message: &str) {
        error!(tex, error = message, "TeX render failed");
    }
}
