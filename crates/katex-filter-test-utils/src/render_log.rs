//! A [`RenderLog`] that remembers what it was told.

use std::sync::{Arc, Mutex};

use katex_filter_core::RenderLog;

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggedFailure {
    Connection { endpoint: String, error: String },
    Render { tex: String, message: String },
}

/// Records failures in memory. Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderLog {
    failures: Arc<Mutex<Vec<LoggedFailure>>>,
}

impl RecordingRenderLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn failures(&self) -> Vec<LoggedFailure> {
        self.failures.lock().expect("render log poisoned").clone()
    }

    fn push(&self, failure: LoggedFailure) {
        self.failures.lock().expect("render log poisoned").push(failure);
    }
}

impl RenderLog for RecordingRenderLog {
    fn log_connection_error(&self, endpoint: &str, error: &std::io::Error) {
        self.push(LoggedFailure::Connection {
            endpoint: endpoint.to_string(),
            error: error.to_string(),
        });
    }

    fn log_render_error(&self, tex: &str, message: &str) {
        self.push(LoggedFailure::Render {
            tex: tex.to_string(),
            message: message.to_string(),
        });
    }
}
