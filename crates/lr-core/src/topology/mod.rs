//! Abstract logging topology.
//!
//! The installer only talks to a host's logging framework through these
//! traits: it opens a [`ConfigTransaction`], reads the root route, registers
//! and attaches sinks, and commits once.
//!
//! # Design Notes
//!
//! - A transaction holds the host's configuration lock from `begin` until it
//!   is committed or dropped. Dropping without commit discards the changes.
//! - Commit publishes the new root route atomically; events in flight see
//!   either the old attachment set or the new one.
//! - Filters are shared by `Arc`. `Filter::decide` takes `&self`, so a filter
//!   with matching state must synchronize internally.

pub mod memory;

pub use memory::{MemoryTopology, TopologyBuilder};

use std::fmt;
use std::sync::Arc;

use crate::error::{SinkError, TopologyError};
use crate::event::{Level, LogEvent};

/// An output endpoint, unique by name within a topology.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn is_started(&self) -> bool {
        true
    }

    /// Deliver one event.
    fn append(&self, event: &LogEvent) -> Result<(), SinkError>;
}

/// Outcome of a per-attachment filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Neutral,
    Deny,
}

/// Per-attachment event filter.
pub trait Filter: Send + Sync + fmt::Debug {
    fn decide(&self, event: &LogEvent) -> FilterDecision;
}

/// Filter on the event marker.
#[derive(Debug, Clone)]
pub struct MarkerFilter {
    marker: String,
    on_match: FilterDecision,
    on_mismatch: FilterDecision,
}

impl MarkerFilter {
    pub fn new(marker: impl Into<String>, on_match: FilterDecision, on_mismatch: FilterDecision) -> Self {
        Self {
            marker: marker.into(),
            on_match,
            on_mismatch,
        }
    }

    /// Drop events carrying `marker`, let everything else through.
    pub fn deny(marker: impl Into<String>) -> Self {
        Self::new(marker, FilterDecision::Deny, FilterDecision::Neutral)
    }
}

impl Filter for MarkerFilter {
    fn decide(&self, event: &LogEvent) -> FilterDecision {
        if event.marker.as_deref() == Some(self.marker.as_str()) {
            self.on_match
        } else {
            self.on_mismatch
        }
    }
}

/// A sink's attachment to the root route.
#[derive(Debug, Clone)]
pub struct RouteAttachment {
    pub sink_name: String,
    /// Minimum level delivered; `None` delivers everything.
    pub threshold: Option<Level>,
    pub filter: Option<Arc<dyn Filter>>,
}

impl RouteAttachment {
    pub fn new(sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            threshold: None,
            filter: None,
        }
    }

    pub fn with_threshold(mut self, level: Level) -> Self {
        self.threshold = Some(level);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Same threshold and filter, different sink.
    pub fn retarget(&self, sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            threshold: self.threshold,
            filter: self.filter.clone(),
        }
    }

    /// Whether `event` passes the threshold and the filter.
    pub fn admits(&self, event: &LogEvent) -> bool {
        if let Some(threshold) = self.threshold {
            if event.level < threshold {
                return false;
            }
        }
        match self.filter {
            Some(ref filter) => filter.decide(event) != FilterDecision::Deny,
            None => true,
        }
    }

    /// Same threshold and the very same filter instance.
    pub fn same_routing(&self, other: &RouteAttachment) -> bool {
        let same_filter = match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        self.threshold == other.threshold && same_filter
    }
}

/// Pending mutation of a topology's configuration.
///
/// Holds the configuration lock until committed or dropped.
pub trait ConfigTransaction {
    /// Root route attachments, in routing order.
    fn root_attachments(&self) -> Vec<RouteAttachment>;

    /// Resolve a registered sink by name.
    fn sink(&self, name: &str) -> Option<Arc<dyn Sink>>;

    /// Register a sink.
    fn add_sink(&mut self, sink: Arc<dyn Sink>) -> Result<(), TopologyError>;

    /// Unregister a sink that has no root attachment.
    fn remove_sink(&mut self, name: &str) -> Result<Arc<dyn Sink>, TopologyError>;

    /// Remove the root attachment for `sink_name` and return it.
    fn detach(&mut self, sink_name: &str) -> Result<RouteAttachment, TopologyError>;

    /// Add a root attachment.
    fn attach(&mut self, attachment: RouteAttachment) -> Result<(), TopologyError>;

    /// Apply all pending changes atomically and release the lock.
    fn commit(self: Box<Self>) -> Result<(), TopologyError>;
}

/// A host logging framework whose root route can be rewired.
pub trait LoggingTopology: Send + Sync {
    /// Acquire the configuration lock and start a transaction.
    fn begin(&self) -> Result<Box<dyn ConfigTransaction + '_>, TopologyError>;
}
