//! In-memory capture of `tracing` events.
//!
//! [`LogCollector`] is a `tracing_subscriber` layer that records events,
//! structured fields included, into a bounded ring buffer. [`LogReader`]
//! reads them back. Attach it next to the regular formatter to inspect
//! render failures after a run.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A single captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    pub level: Level,
    /// Target module path.
    pub target: String,
    /// The formatted message.
    pub message: String,
    /// Structured fields other than `message`, in recording order.
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Value of the named field, if the event recorded it.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether `needle` appears in the message or any field value.
    pub fn contains(&self, needle: &str) -> bool {
        self.message.contains(needle) || self.fields.iter().any(|(_, v)| v.contains(needle))
    }
}

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    start_time: Instant,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            start_time: Instant::now(),
        }
    }

    fn push(&mut self, level: Level, target: String, visitor: FieldVisitor) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// A `tracing` layer that captures events into a shared ring buffer.
#[derive(Debug, Clone)]
pub struct LogCollector {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogCollector {
    /// Create a new collector holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(LogBuffer::new(capacity))),
        }
    }

    /// Get a reader handle for the captured entries.
    pub fn reader(&self) -> LogReader {
        LogReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        let target = metadata.target().to_string();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(level, target, visitor);
        }
    }
}

/// A read handle for the log buffer.
#[derive(Debug, Clone)]
pub struct LogReader {
    buffer: Arc<Mutex<LogBuffer>>,
}

impl LogReader {
    /// Snapshot of all captured entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the entries at `level`.
    pub fn at_level(&self, level: Level) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn test_log_collector_captures_events() {
        let collector = LogCollector::new(100);
        let reader = collector.reader();

        let _guard = tracing_subscriber::registry().with(collector).set_default();

        tracing::info!("hello from test");
        tracing::warn!("a warning");

        let entries = reader.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, Level::INFO);
        assert_eq!(entries[0].message, "hello from test");
        assert_eq!(entries[1].level, Level::WARN);
    }

    #[test]
    fn test_log_collector_records_fields() {
        let collector = LogCollector::new(10);
        let reader = collector.reader();

        let _guard = tracing_subscriber::registry().with(collector).set_default();

        tracing::error!(tex = "x^", error = "unexpected end", "TeX render failed");

        let entries = reader.at_level(Level::ERROR);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("tex"), Some("x^"));
        assert_eq!(entries[0].field("error"), Some("unexpected end"));
        assert!(entries[0].contains("unexpected end"));
        assert!(!entries[0].contains("\\frac"));
    }

    #[test]
    fn test_log_collector_ring_buffer() {
        let collector = LogCollector::new(3);
        let reader = collector.reader();

        let _guard = tracing_subscriber::registry().with(collector).set_default();

        tracing::info!("one");
        tracing::info!("two");
        tracing::info!("three");
        tracing::info!("four");

        let entries = reader.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "two");
    }

    #[test]
    fn test_log_reader_is_empty() {
        let collector = LogCollector::new(10);
        let reader = collector.reader();
        assert!(reader.is_empty());
        assert_eq!(reader.len(), 0);
    }
}
