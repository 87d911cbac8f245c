//! Concrete sinks.
//!
//! [`WriterSink`] renders events to any `io::Write`. [`CaptureSink`] keeps
//! them in memory for inspection.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::SinkError;
use crate::event::LogEvent;
use crate::logging::LogFormat;
use crate::topology::Sink;

/// Render an event as one human-readable line (no trailing newline).
pub fn render_human(event: &LogEvent) -> String {
    let mut line = format!(
        "{} {:>5} [{}] {}: {}",
        event.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        event.level.to_string().to_uppercase(),
        event.thread_name,
        event.logger_name,
        event.formatted_message()
    );
    for (key, value) in &event.context {
        let _ = write!(line, " {}={}", key, value);
    }
    if let Some(ref thrown) = event.thrown {
        let _ = write!(line, " error=\"{}\"", thrown);
    }
    line
}

/// Sink writing one line per event.
pub struct WriterSink<W = io::Stderr> {
    name: String,
    format: LogFormat,
    writer: Mutex<W>,
}

impl WriterSink<io::Stderr> {
    pub fn stderr(name: impl Into<String>, format: LogFormat) -> Self {
        WriterSink::new(name, format, io::stderr())
    }
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(name: impl Into<String>, format: LogFormat, writer: W) -> Self {
        WriterSink {
            name: name.into(),
            format,
            writer: Mutex::new(writer),
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, event: &LogEvent) -> Result<(), SinkError> {
        let line = match self.format {
            LogFormat::Human => render_human(event),
            LogFormat::Jsonl => event.to_jsonl(),
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Rejected(format!("writer lock poisoned: {}", self.name)))?;
        writeln!(writer, "{}", line)?;
        Ok(())
    }
}

/// In-memory sink that records every event it receives.
pub struct CaptureSink {
    name: String,
    started: AtomicBool,
    events: Mutex<Vec<LogEvent>>,
}

impl CaptureSink {
    pub fn new(name: impl Into<String>) -> Self {
        CaptureSink {
            name: name.into(),
            started: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        }
    }

    /// A sink that reports itself as not started.
    pub fn unstarted(name: impl Into<String>) -> Self {
        let sink = CaptureSink::new(name);
        sink.started.store(false, Ordering::Release);
        sink
    }

    /// Mark the sink stopped; later appends fail.
    pub fn stop(&self) {
        self.started.store(false, Ordering::Release);
    }

    /// Copies of all recorded events, in arrival order.
    pub fn events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Formatted messages of all recorded events.
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.formatted_message().into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(events) => events.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for CaptureSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<(), SinkError> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn append(&self, event: &LogEvent) -> Result<(), SinkError> {
        if !self.is_started() {
            return Err(SinkError::NotStarted(self.name.clone()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| SinkError::Rejected(format!("capture lock poisoned: {}", self.name)))?;
        events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_human_line() {
        let buffer = Buffer::default();
        let sink = WriterSink::new("console", LogFormat::Human, buffer.clone());
        let event = LogEvent::new("net", Level::Warn, "link down").with_context("iface", "eth0");
        sink.append(&event).unwrap();

        let text = buffer.text();
        assert!(text.ends_with('\n'));
        assert!(text.contains(" WARN "));
        assert!(text.contains("net: link down"));
        assert!(text.contains("iface=eth0"));
    }

    #[test]
    fn test_jsonl_line() {
        let buffer = Buffer::default();
        let sink = WriterSink::new("json", LogFormat::Jsonl, buffer.clone());
        sink.append(&LogEvent::new("app", Level::Error, "boom")).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(buffer.text().trim()).unwrap();
        assert_eq!(parsed["level"], "error");
        assert_eq!(parsed["message"], "boom");
    }

    #[test]
    fn test_capture_records_in_order() {
        let sink = CaptureSink::new("mem");
        sink.append(&LogEvent::new("a", Level::Info, "one")).unwrap();
        sink.append(&LogEvent::new("a", Level::Info, "two")).unwrap();
        assert_eq!(sink.messages(), vec!["one", "two"]);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_unstarted_capture_rejects() {
        let sink = CaptureSink::unstarted("mem");
        assert!(!sink.is_started());
        let err = sink.append(&LogEvent::new("a", Level::Info, "x")).unwrap_err();
        assert_eq!(err.code(), 40);
        assert!(sink.is_empty());
    }
}
