//! Log event model.
//!
//! A [`LogEvent`] is what flows from producers through the root route into
//! sinks. Sinks only ever see `&LogEvent`; a redacted event is a separate,
//! complete copy with its own context map.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Origin for high-resolution event timestamps.
static MONOTONIC_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Severity levels, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(format!("unknown level: {}", s)),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        };
        write!(f, "{}", s)
    }
}

/// Something that produces its message text on demand.
pub trait FormatMessage: Send + Sync + fmt::Debug {
    fn formatted(&self) -> String;
}

/// Closure-backed [`FormatMessage`].
struct FnMessage<F>(F);

impl<F> fmt::Debug for FnMessage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMessage(..)")
    }
}

impl<F> FormatMessage for FnMessage<F>
where
    F: Fn() -> String + Send + Sync,
{
    fn formatted(&self) -> String {
        (self.0)()
    }
}

/// Event message: pre-formatted text or a lazily formatted object.
#[derive(Debug, Clone)]
pub enum Message {
    Text(String),
    Lazy(Arc<dyn FormatMessage>),
}

impl Message {
    /// Message formatted by `f` each time it is rendered.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Message::Lazy(Arc::new(FnMessage(f)))
    }

    pub fn formatted(&self) -> Cow<'_, str> {
        match self {
            Message::Text(s) => Cow::Borrowed(s),
            Message::Lazy(m) => Cow::Owned(m.formatted()),
        }
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

/// Attached error, shared read-only between an event and its copies.
pub type Thrown = Arc<dyn std::error::Error + Send + Sync>;

/// A single log record.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Name of the logger (tracing target) that produced the event.
    pub logger_name: String,

    /// Fully-qualified scope the event originated from.
    pub fqcn: Option<String>,

    pub level: Level,

    /// Optional marker/tag.
    pub marker: Option<String>,

    pub thrown: Option<Thrown>,

    /// Context key-value map (keys unique, order irrelevant).
    pub context: BTreeMap<String, String>,

    /// Ordered call-context stack, outermost first.
    pub context_stack: Vec<String>,

    pub thread_name: String,

    /// Wall-clock time.
    pub timestamp: DateTime<Utc>,

    /// Nanoseconds since the process-wide monotonic origin.
    pub nano_time: u64,

    pub message: Message,
}

impl LogEvent {
    /// Create an event stamped with the current time and thread.
    pub fn new(logger_name: impl Into<String>, level: Level, message: impl Into<Message>) -> Self {
        let thread = std::thread::current();
        let thread_name = thread
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", thread.id()));

        LogEvent {
            logger_name: logger_name.into(),
            fqcn: None,
            level,
            marker: None,
            thrown: None,
            context: BTreeMap::new(),
            context_stack: Vec::new(),
            thread_name,
            timestamp: Utc::now(),
            nano_time: MONOTONIC_ORIGIN.elapsed().as_nanos() as u64,
            message: message.into(),
        }
    }

    pub fn with_fqcn(mut self, fqcn: impl Into<String>) -> Self {
        self.fqcn = Some(fqcn.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn with_thrown(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.thrown = Some(Arc::new(err));
        self
    }

    /// Add a context entry, replacing any previous value for `key`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Push a frame onto the context stack.
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.context_stack.push(frame.into());
        self
    }

    /// The message rendered as text.
    pub fn formatted_message(&self) -> Cow<'_, str> {
        self.message.formatted()
    }

    /// Copy of this event with `text` as its message.
    ///
    /// Every other field is copied; the context map and stack are cloned, the
    /// attached error is shared.
    pub fn with_message_text(&self, text: String) -> LogEvent {
        LogEvent {
            logger_name: self.logger_name.clone(),
            fqcn: self.fqcn.clone(),
            level: self.level,
            marker: self.marker.clone(),
            thrown: self.thrown.clone(),
            context: self.context.clone(),
            context_stack: self.context_stack.clone(),
            thread_name: self.thread_name.clone(),
            timestamp: self.timestamp,
            nano_time: self.nano_time,
            message: Message::Text(text),
        }
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert("ts".to_string(), serde_json::json!(self.timestamp.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(self.level));
        obj.insert("logger".to_string(), serde_json::json!(self.logger_name));
        obj.insert("thread".to_string(), serde_json::json!(self.thread_name));
        if let Some(ref fqcn) = self.fqcn {
            obj.insert("fqcn".to_string(), serde_json::json!(fqcn));
        }
        if let Some(ref marker) = self.marker {
            obj.insert("marker".to_string(), serde_json::json!(marker));
        }
        obj.insert(
            "message".to_string(),
            serde_json::json!(self.formatted_message()),
        );
        if !self.context.is_empty() {
            obj.insert("context".to_string(), serde_json::json!(self.context));
        }
        if !self.context_stack.is_empty() {
            obj.insert("stack".to_string(), serde_json::json!(self.context_stack));
        }
        if let Some(ref thrown) = self.thrown {
            obj.insert("error".to_string(), serde_json::json!(thrown.to_string()));
        }

        serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","logger":"{}"}}"#,
                self.logger_name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("WARNING".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
        assert!("loud".parse::<Level>().is_err());
        assert_eq!(Level::Info.to_string(), "info");
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }

    #[test]
    fn test_lazy_message_formats_on_demand() {
        let msg = Message::from_fn(|| format!("value={}", 40 + 2));
        assert_eq!(msg.formatted(), "value=42");
    }

    #[test]
    fn test_with_message_text_copies_fields() {
        let source = LogEvent::new("net.session", Level::Warn, "from 10.0.0.1")
            .with_fqcn("net::session::accept")
            .with_marker("SECURITY")
            .with_thrown(Boom)
            .with_context("user", "alice")
            .with_frame("request");

        let copy = source.with_message_text("from [REDACTED_IP]".to_string());

        assert_eq!(copy.formatted_message(), "from [REDACTED_IP]");
        assert_eq!(source.formatted_message(), "from 10.0.0.1");
        assert_eq!(copy.logger_name, source.logger_name);
        assert_eq!(copy.fqcn, source.fqcn);
        assert_eq!(copy.level, source.level);
        assert_eq!(copy.marker, source.marker);
        assert_eq!(copy.context, source.context);
        assert_eq!(copy.context_stack, source.context_stack);
        assert_eq!(copy.thread_name, source.thread_name);
        assert_eq!(copy.timestamp, source.timestamp);
        assert_eq!(copy.nano_time, source.nano_time);
        assert!(Arc::ptr_eq(
            copy.thrown.as_ref().unwrap(),
            source.thrown.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_jsonl_shape() {
        let event = LogEvent::new("app", Level::Info, "hello").with_context("k", "v");
        let parsed: serde_json::Value = serde_json::from_str(&event.to_jsonl()).unwrap();
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["logger"], "app");
        assert_eq!(parsed["message"], "hello");
        assert_eq!(parsed["context"]["k"], "v");
    }
}
