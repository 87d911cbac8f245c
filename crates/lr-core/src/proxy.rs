//! Redacting proxy sink.
//!
//! A [`RedactingSink`] sits where an original sink used to be attached. For
//! every event it receives it runs the message through the redaction engine
//! and forwards the result to exactly one delegate: the original sink.
//!
//! Redaction never blocks delivery. A panic while formatting or redacting is
//! caught here and the original event goes through unchanged, whatever the
//! [`ErrorPolicy`]. The policy only decides whether delegate errors reach the
//! routing layer.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lr_redact::Redactor;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::event::{LogEvent, Message};
use crate::topology::Sink;

/// Default proxy name prefix.
pub const DEFAULT_PROXY_PREFIX: &str = "LogRedact";

/// What the proxy does with delegate errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Swallow delegate errors.
    #[default]
    Ignore,
    /// Return delegate errors to the routing layer.
    Propagate,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(ErrorPolicy::Ignore),
            "propagate" => Ok(ErrorPolicy::Propagate),
            _ => Err(format!("unknown error policy: {}", s)),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Ignore => write!(f, "ignore"),
            ErrorPolicy::Propagate => write!(f, "propagate"),
        }
    }
}

/// Name of the proxy standing in for `original`.
pub fn proxy_name(prefix: &str, original: &str) -> String {
    format!("{}-{}", prefix, original)
}

/// Sink that redacts messages before handing events to its delegate.
pub struct RedactingSink {
    name: String,
    delegate: Arc<dyn Sink>,
    redactor: Arc<Redactor>,
    policy: ErrorPolicy,
    started: AtomicBool,
}

impl RedactingSink {
    pub fn new(prefix: &str, delegate: Arc<dyn Sink>, redactor: Arc<Redactor>) -> Self {
        RedactingSink {
            name: proxy_name(prefix, delegate.name()),
            delegate,
            redactor,
            policy: ErrorPolicy::default(),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn delegate_name(&self) -> &str {
        self.delegate.name()
    }

    pub fn delegate(&self) -> &Arc<dyn Sink> {
        &self.delegate
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// The event as the delegate should see it.
    ///
    /// Borrowed only for a plain-text message that redaction left alone. A
    /// lazy message is formatted exactly once here and always forwarded as
    /// text, so the delegate never formats it again.
    pub fn rewrite<'e>(&self, event: &'e LogEvent) -> Cow<'e, LogEvent> {
        match &event.message {
            Message::Text(text) => match self.redactor.redact(text) {
                Cow::Borrowed(_) => Cow::Borrowed(event),
                Cow::Owned(clean) => Cow::Owned(event.with_message_text(clean)),
            },
            Message::Lazy(_) => {
                let text = event.formatted_message();
                let clean = self.redactor.redact(&text).into_owned();
                Cow::Owned(event.with_message_text(clean))
            }
        }
    }
}

impl Sink for RedactingSink {
    fn name(&self) -> &str {
        &self.name
    }

    /// Starts regardless of the delegate. A delegate that is not started
    /// yet keeps rejecting events on its own until the host starts it.
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

        let delivered = match panic::catch_unwind(AssertUnwindSafe(|| self.rewrite(event))) {
            Ok(rewritten) => self.delegate.append(&rewritten),
            Err(_) => self.delegate.append(event),
        };

        match self.policy {
            ErrorPolicy::Ignore => Ok(()),
            ErrorPolicy::Propagate => delivered,
        }
    }
}
